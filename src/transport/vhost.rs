//! virtio devices over vhost-user

use crate::domain::model::{ScsiController, VirtioBlk};
use crate::domain::ports::VirtioTransport;
use crate::engine::protocol::{
    CreateBlkControllerParams, CreateScsiControllerParams, DeleteControllerParams,
};
use crate::error::{Error, Result};
use crate::transport::check_local_function;

/// vhost-user strategy; the engine controller is named after the resource id
#[derive(Debug, Clone, Copy, Default)]
pub struct VhostUserTransport;

impl VirtioTransport for VhostUserTransport {
    fn label(&self) -> &'static str {
        "vhost-user"
    }

    fn blk_create_params(&self, id: &str, device: &VirtioBlk) -> Result<CreateBlkControllerParams> {
        check_local_function(&device.pcie_id)?;
        if device.volume_name_ref.is_empty() {
            return Err(Error::invalid(format!("virtio-blk {} has no volume", id)));
        }

        Ok(CreateBlkControllerParams {
            ctrlr: id.to_string(),
            dev_name: device.volume_name_ref.clone(),
        })
    }

    fn scsi_create_params(
        &self,
        id: &str,
        controller: &ScsiController,
    ) -> Result<CreateScsiControllerParams> {
        check_local_function(&controller.pcie_id)?;
        Ok(CreateScsiControllerParams {
            ctrlr: id.to_string(),
        })
    }

    fn delete_params(&self, id: &str) -> Result<DeleteControllerParams> {
        Ok(DeleteControllerParams {
            ctrlr: id.to_string(),
        })
    }
}
