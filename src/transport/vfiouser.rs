//! NVMe emulated on a local PCIe function through vfio-user

use crate::config::VfioUserConfig;
use crate::domain::model::{ControllerEndpoint, NvmeController, NvmeSubsystem};
use crate::domain::ports::NvmeTransport;
use crate::engine::protocol::{ListenAddress, ListenerParams};
use crate::error::{Error, Result};
use crate::naming;
use crate::transport::check_local_function;
use std::path::Path;

pub const VFIOUSER_TRTYPE: &str = "vfiouser";

/// Listener strategy for vfio-user. The listener address is the
/// controller's socket directory; the engine creates the socket in it.
#[derive(Debug, Clone)]
pub struct VfioUserTransport {
    config: VfioUserConfig,
}

impl VfioUserTransport {
    pub fn new(config: VfioUserConfig) -> Self {
        Self { config }
    }

    /// Socket directory for one controller id
    pub fn controller_dir(&self, id: &str) -> String {
        Path::new(&self.config.ctrlr_dir).join(id).display().to_string()
    }
}

impl NvmeTransport for VfioUserTransport {
    fn label(&self) -> &'static str {
        VFIOUSER_TRTYPE
    }

    fn create_params(
        &self,
        controller: &NvmeController,
        subsystem: &NvmeSubsystem,
    ) -> Result<ListenerParams> {
        match &controller.spec.endpoint {
            Some(ControllerEndpoint::Pcie(pcie)) => check_local_function(pcie)?,
            Some(ControllerEndpoint::Fabrics(_)) => {
                return Err(Error::invalid(format!(
                    "controller {} has a fabrics endpoint but uses PCIe transport",
                    controller.name
                )))
            }
            None => {}
        }

        let id = naming::resource_id(&controller.name);
        if id.is_empty() {
            return Err(Error::invalid("controller name has no id"));
        }

        Ok(ListenerParams {
            nqn: subsystem.spec.nqn.clone(),
            listen_address: ListenAddress {
                trtype: VFIOUSER_TRTYPE.to_string(),
                traddr: self.controller_dir(id),
                trsvcid: String::new(),
                adrfam: String::new(),
            },
            secure_channel: None,
        })
    }
}
