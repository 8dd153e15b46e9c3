//! virtio-blk devices
//!
//! Optional QoS limits are applied to the backing volume before the vhost
//! controller is created, and cleared again if that create fails.

use super::manager::{
    cached, cached_for_delete, confirmed, resolve_id, update_cached, ResourceManager,
};
use crate::domain::model::{
    DeleteRequest, ListRequest, ListResponse, QosLimits, StatsResponse, UpdateRequest, VirtioBlk,
};
use crate::domain::validation;
use crate::engine::protocol::{method, GetControllersParams, VhostController};
use crate::error::{Error, Result};
use crate::naming::{self, ResourceKind};
use std::collections::BTreeMap;
use tracing::{info, warn};

fn limits_of(device: &VirtioBlk) -> Option<&QosLimits> {
    device.max_limit.as_ref().filter(|limits| !limits.is_unlimited())
}

impl ResourceManager {
    /// vhost rows, optionally narrowed to one controller id
    pub(crate) async fn vhost_controllers(
        &self,
        ctrlr: Option<&str>,
    ) -> Result<Vec<VhostController>> {
        let params = GetControllersParams {
            name: ctrlr.map(String::from),
        };
        self.call(method::VHOST_GET_CONTROLLERS, &params).await
    }

    pub async fn create_virtio_blk(&self, device: VirtioBlk, id: &str) -> Result<VirtioBlk> {
        validation::required("volumeNameRef", &device.volume_name_ref)?;
        let id = resolve_id(id)?;
        let name = naming::compose_name(ResourceKind::VirtioBlk, "", &id);

        let mut store = self.virtio_blks.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("virtio-blk {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }

        let params = self.transports.virtio().blk_create_params(&id, &device)?;

        let limits = limits_of(&device);
        if let Some(limits) = limits {
            self.qos.apply_limits(&device.volume_name_ref, limits).await?;
        }

        let outcome = match self
            .call::<_, bool>(method::VHOST_CREATE_BLK_CONTROLLER, &params)
            .await
        {
            Ok(created) => confirmed(created, || format!("Could not create virtio-blk: {}", name)),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            if limits.is_some() {
                if let Err(undo) = self.qos.clear_limits(&device.volume_name_ref).await {
                    warn!(
                        "Could not clear QoS on {} after failed create: {}",
                        device.volume_name_ref, undo
                    );
                }
            }
            return Err(e);
        }

        let mut response = device;
        response.name = name.clone();
        store.insert(name.clone(), response.clone());

        info!("Created virtio-blk {} on volume {}", name, response.volume_name_ref);
        Ok(response)
    }

    pub async fn get_virtio_blk(&self, name: &str) -> Result<VirtioBlk> {
        let store = self.virtio_blks.lock().await;
        let mut device = cached(&store, name)?;
        let id = naming::resource_id(name);

        let rows = self.vhost_controllers(Some(id)).await?;
        let bdev = rows
            .into_iter()
            .find(|row| row.ctrlr == id)
            .and_then(|row| row.backend_specific.block)
            .map(|block| block.bdev)
            .ok_or_else(|| Error::invalid(format!("Could not find virtio-blk: {}", name)))?;

        device.volume_name_ref = bdev;
        Ok(device)
    }

    /// Every block-backed vhost controller the engine reports
    pub async fn list_virtio_blks(&self, request: ListRequest) -> Result<ListResponse<VirtioBlk>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let rows = self.vhost_controllers(None).await?;

        let known: BTreeMap<String, VirtioBlk> = self.virtio_blks.lock().await.clone();
        let items = rows
            .into_iter()
            .filter_map(|row| {
                let block = row.backend_specific.block?;
                let name = naming::compose_name(ResourceKind::VirtioBlk, "", &row.ctrlr);
                let mut device = known.get(&name).cloned().unwrap_or_default();
                device.name = name;
                device.volume_name_ref = block.bdev;
                Some(device)
            })
            .collect();

        Ok(self.page(items, window))
    }

    pub async fn update_virtio_blk(&self, request: UpdateRequest<VirtioBlk>) -> Result<VirtioBlk> {
        let updated = {
            let mut store = self.virtio_blks.lock().await;
            update_cached(&mut store, &request)?
        };
        match updated {
            Some(device) => Ok(device),
            None => {
                let id = naming::resource_id(&request.resource.name).to_string();
                info!("virtio-blk {} missing on update, creating it", request.resource.name);
                self.create_virtio_blk(request.resource, &id).await
            }
        }
    }

    /// Remove the vhost controller, then drop any limits it carried
    pub async fn delete_virtio_blk(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.virtio_blks.lock().await;
        let Some(device) = cached_for_delete(&store, &request.name, request.allow_missing)? else {
            return Ok(());
        };

        let params = self
            .transports
            .virtio()
            .delete_params(naming::resource_id(&request.name))?;
        let deleted: bool = self.call(method::VHOST_DELETE_CONTROLLER, &params).await?;
        confirmed(deleted, || format!("Could not delete virtio-blk: {}", request.name))?;
        store.remove(&request.name);

        if limits_of(&device).is_some() {
            if let Err(e) = self.qos.clear_limits(&device.volume_name_ref).await {
                warn!("Could not clear QoS on {}: {}", device.volume_name_ref, e);
            }
        }

        info!("Deleted virtio-blk {}", request.name);
        Ok(())
    }

    pub async fn stats_virtio_blk(&self, name: &str) -> Result<StatsResponse> {
        let store = self.virtio_blks.lock().await;
        let device = cached(&store, name)?;
        let stats = self.volume_stats(&device.volume_name_ref).await?;
        Ok(StatsResponse {
            name: name.to_string(),
            stats,
        })
    }
}
