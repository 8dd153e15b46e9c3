//! NVMe controllers
//!
//! A controller is a listener on its parent subsystem. The listener address
//! comes from the transport strategy picked by the controller's `trtype`.

use super::manager::{
    cached, cached_for_delete, confirmed, parent_record, resolve_id, resolve_parent,
    update_cached, ResourceManager,
};
use crate::domain::model::{
    DeleteRequest, ListRequest, ListResponse, NvmeController, NvmeControllerStatus,
    NvmeSubsystem, StatsResponse, UpdateRequest, VolumeStats,
};
use crate::engine::protocol::{method, ListenAddress, Subsystem};
use crate::error::{Error, Result};
use crate::naming::{self, ResourceKind};
use tracing::{debug, info};

impl ResourceManager {
    fn listen_address(
        &self,
        controller: &NvmeController,
        subsystem: &NvmeSubsystem,
    ) -> Result<ListenAddress> {
        let transport = self.transports.nvme(controller.spec.trtype)?;
        Ok(transport.create_params(controller, subsystem)?.listen_address)
    }

    /// Engine row of a subsystem, if the engine still knows its qualifier
    async fn subsystem_row(&self, nqn: &str) -> Result<Option<Subsystem>> {
        let rows: Vec<Subsystem> = self.call_bare(method::NVMF_GET_SUBSYSTEMS).await?;
        Ok(rows.into_iter().find(|row| row.nqn == nqn))
    }

    /// Add a listener for `controller` to the subsystem named by `parent`
    pub async fn create_nvme_controller(
        &self,
        parent: &str,
        controller: NvmeController,
        id: &str,
    ) -> Result<NvmeController> {
        let parent = resolve_parent(
            ResourceKind::Subsystem,
            parent,
            &controller.spec.subsystem_name_ref,
        )?;
        let id = resolve_id(id)?;
        let name = naming::compose_name(ResourceKind::Controller, &naming::parent_id(&parent), &id);

        let mut store = self.controllers.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("Controller {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }

        let subsystem = parent_record(&self.subsystems, &parent).await?;
        let transport = self.transports.nvme(controller.spec.trtype)?;

        let mut response = controller;
        response.name = name.clone();
        response.spec.subsystem_name_ref = parent;

        let params = transport.create_params(&response, &subsystem)?;
        debug!("Adding {} listener {:?}", transport.label(), params.listen_address);
        let added: bool = self.call(method::NVMF_SUBSYSTEM_ADD_LISTENER, &params).await?;
        confirmed(added, || format!("Could not create CTRL: {}", name))?;

        response.status = Some(NvmeControllerStatus { active: true });
        store.insert(name.clone(), response.clone());

        info!("Created controller {} on {}", name, subsystem.spec.nqn);
        Ok(response)
    }

    /// Cached controller, confirmed against the engine's listener table
    pub async fn get_nvme_controller(&self, name: &str) -> Result<NvmeController> {
        let store = self.controllers.lock().await;
        let mut controller = cached(&store, name)?;
        let subsystem = parent_record(&self.subsystems, &controller.spec.subsystem_name_ref).await?;

        let address = self.listen_address(&controller, &subsystem)?;
        let found = self
            .subsystem_row(&subsystem.spec.nqn)
            .await?
            .map(|row| row.listen_addresses.iter().any(|l| l.same_endpoint(&address)))
            .unwrap_or(false);
        if !found {
            return Err(Error::invalid(format!("Could not find CTRL: {}", name)));
        }

        controller.status = Some(NvmeControllerStatus { active: true });
        Ok(controller)
    }

    /// Controllers of one subsystem; `active` reflects the engine's listeners
    pub async fn list_nvme_controllers(
        &self,
        request: ListRequest,
    ) -> Result<ListResponse<NvmeController>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let parent = resolve_parent(ResourceKind::Subsystem, &request.parent, "")?;
        let subsystem = parent_record(&self.subsystems, &parent).await?;

        let row = self.subsystem_row(&subsystem.spec.nqn).await?.ok_or_else(|| {
            Error::invalid(format!(
                "Could not find any controllers for NQN: {}",
                subsystem.spec.nqn
            ))
        })?;

        let children: Vec<NvmeController> = self
            .controllers
            .lock()
            .await
            .values()
            .filter(|c| c.spec.subsystem_name_ref == parent)
            .cloned()
            .collect();

        let mut items = Vec::with_capacity(children.len());
        for mut controller in children {
            let address = self.listen_address(&controller, &subsystem)?;
            let active = row.listen_addresses.iter().any(|l| l.same_endpoint(&address));
            controller.status = Some(NvmeControllerStatus { active });
            items.push(controller);
        }

        Ok(self.page(items, window))
    }

    pub async fn update_nvme_controller(
        &self,
        request: UpdateRequest<NvmeController>,
    ) -> Result<NvmeController> {
        let updated = {
            let mut store = self.controllers.lock().await;
            update_cached(&mut store, &request)?
        };
        match updated {
            Some(controller) => Ok(controller),
            None => {
                let name = request.resource.name.clone();
                let parent =
                    naming::parent_name(ResourceKind::Controller, &name).unwrap_or_default();
                info!("Controller {} missing on update, creating it", name);
                self.create_nvme_controller(&parent, request.resource, naming::resource_id(&name))
                    .await
            }
        }
    }

    /// Remove the listener; the parent subsystem must still exist
    pub async fn delete_nvme_controller(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.controllers.lock().await;
        let Some(controller) =
            cached_for_delete(&store, &request.name, request.allow_missing)?
        else {
            return Ok(());
        };

        let subsystem = parent_record(&self.subsystems, &controller.spec.subsystem_name_ref).await?;
        let transport = self.transports.nvme(controller.spec.trtype)?;
        let params = transport.delete_params(&controller, &subsystem)?;

        let removed: bool = self.call(method::NVMF_SUBSYSTEM_REMOVE_LISTENER, &params).await?;
        confirmed(removed, || format!("Could not delete CTRL: {}", request.name))?;

        store.remove(&request.name);
        info!("Deleted controller {}", request.name);
        Ok(())
    }

    pub async fn stats_nvme_controller(&self, name: &str) -> Result<StatsResponse> {
        let store = self.controllers.lock().await;
        cached(&store, name)?;
        Ok(StatsResponse {
            name: name.to_string(),
            stats: VolumeStats::unavailable(),
        })
    }
}
