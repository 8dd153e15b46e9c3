//! virtio-scsi controllers and their LUNs
//!
//! A LUN is a target on its parent vhost-scsi controller; the engine picks
//! the target number when none is requested.

use super::manager::{
    cached, cached_for_delete, confirmed, parent_record, resolve_id, resolve_parent,
    update_cached, ResourceManager,
};
use crate::domain::model::{
    DeleteRequest, ListRequest, ListResponse, ScsiController, ScsiLun, StatsResponse,
    UpdateRequest,
};
use crate::domain::validation;
use crate::engine::protocol::{method, AddTargetParams, RemoveTargetParams, ScsiTargetInfo};
use crate::error::{Error, Result};
use crate::naming::{self, ResourceKind, SCSI_CONTROLLERS};
use std::collections::BTreeMap;
use tracing::info;

impl ResourceManager {
    // =========================================================================
    // Controllers
    // =========================================================================

    pub async fn create_scsi_controller(
        &self,
        controller: ScsiController,
        id: &str,
    ) -> Result<ScsiController> {
        if controller.max_luns < 0 {
            return Err(Error::invalid(format!("negative maxLuns: {}", controller.max_luns)));
        }
        let id = resolve_id(id)?;
        let name = naming::compose_name(ResourceKind::ScsiController, "", &id);

        let mut store = self.scsi_controllers.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("SCSI controller {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }

        let params = self.transports.virtio().scsi_create_params(&id, &controller)?;
        let created: bool = self.call(method::VHOST_CREATE_SCSI_CONTROLLER, &params).await?;
        confirmed(created, || format!("Could not create SCSI controller: {}", name))?;

        let mut response = controller;
        response.name = name.clone();
        store.insert(name.clone(), response.clone());

        info!("Created SCSI controller {}", name);
        Ok(response)
    }

    /// Targets of one scsi-backed vhost controller
    async fn scsi_targets(&self, ctrlr: &str) -> Result<Option<Vec<ScsiTargetInfo>>> {
        let rows = self.vhost_controllers(Some(ctrlr)).await?;
        Ok(rows
            .into_iter()
            .find(|row| row.ctrlr == ctrlr)
            .and_then(|row| row.backend_specific.scsi))
    }

    pub async fn get_scsi_controller(&self, name: &str) -> Result<ScsiController> {
        let store = self.scsi_controllers.lock().await;
        let controller = cached(&store, name)?;

        if self.scsi_targets(naming::resource_id(name)).await?.is_none() {
            return Err(Error::invalid(format!("Could not find SCSI controller: {}", name)));
        }
        Ok(controller)
    }

    pub async fn list_scsi_controllers(
        &self,
        request: ListRequest,
    ) -> Result<ListResponse<ScsiController>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let rows = self.vhost_controllers(None).await?;

        let known: BTreeMap<String, ScsiController> = self.scsi_controllers.lock().await.clone();
        let items = rows
            .into_iter()
            .filter(|row| row.backend_specific.scsi.is_some())
            .map(|row| {
                let name = naming::compose_name(ResourceKind::ScsiController, "", &row.ctrlr);
                let mut controller = known.get(&name).cloned().unwrap_or_default();
                controller.name = name;
                controller
            })
            .collect();

        Ok(self.page(items, window))
    }

    pub async fn update_scsi_controller(
        &self,
        request: UpdateRequest<ScsiController>,
    ) -> Result<ScsiController> {
        let updated = {
            let mut store = self.scsi_controllers.lock().await;
            update_cached(&mut store, &request)?
        };
        match updated {
            Some(controller) => Ok(controller),
            None => {
                let id = naming::resource_id(&request.resource.name).to_string();
                info!("SCSI controller {} missing on update, creating it", request.resource.name);
                self.create_scsi_controller(request.resource, &id).await
            }
        }
    }

    pub async fn delete_scsi_controller(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.scsi_controllers.lock().await;
        if cached_for_delete(&store, &request.name, request.allow_missing)?.is_none() {
            return Ok(());
        }

        let params = self
            .transports
            .virtio()
            .delete_params(naming::resource_id(&request.name))?;
        let deleted: bool = self.call(method::VHOST_DELETE_CONTROLLER, &params).await?;
        confirmed(deleted, || format!("Could not delete SCSI controller: {}", request.name))?;

        store.remove(&request.name);
        info!("Deleted SCSI controller {}", request.name);
        Ok(())
    }

    pub async fn stats_scsi_controller(&self, name: &str) -> Result<StatsResponse> {
        Err(Error::NotImplemented(format!("stats for SCSI controller {}", name)))
    }

    // =========================================================================
    // LUNs
    // =========================================================================

    pub async fn create_scsi_lun(&self, parent: &str, lun: ScsiLun, id: &str) -> Result<ScsiLun> {
        let parent =
            resolve_parent(ResourceKind::ScsiController, parent, &lun.controller_name_ref)?;
        validation::required("volumeNameRef", &lun.volume_name_ref)?;
        let id = resolve_id(id)?;
        let name = naming::compose_name(
            ResourceKind::ScsiLun,
            &naming::parent_id_in(&parent, SCSI_CONTROLLERS),
            &id,
        );

        let mut store = self.scsi_luns.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("SCSI LUN {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }

        parent_record(&self.scsi_controllers, &parent).await?;
        let params = AddTargetParams {
            ctrlr: naming::resource_id(&parent).to_string(),
            scsi_target_num: lun.target_num,
            bdev_name: lun.volume_name_ref.clone(),
        };
        let target: i32 = self.call(method::VHOST_SCSI_CONTROLLER_ADD_TARGET, &params).await?;
        confirmed(target >= 0, || format!("Could not create SCSI LUN: {}", name))?;

        let mut response = lun;
        response.name = name.clone();
        response.controller_name_ref = parent;
        response.target_num = target;
        store.insert(name.clone(), response.clone());

        info!("Created SCSI LUN {} as target {}", name, target);
        Ok(response)
    }

    pub async fn get_scsi_lun(&self, name: &str) -> Result<ScsiLun> {
        let store = self.scsi_luns.lock().await;
        let mut lun = cached(&store, name)?;
        parent_record(&self.scsi_controllers, &lun.controller_name_ref).await?;

        let ctrlr = naming::resource_id(&lun.controller_name_ref).to_string();
        let target = self
            .scsi_targets(&ctrlr)
            .await?
            .and_then(|targets| targets.into_iter().find(|t| t.scsi_dev_num == lun.target_num))
            .ok_or_else(|| Error::invalid(format!("Could not find SCSI LUN: {}", name)))?;

        if let Some(first) = target.luns.into_iter().next() {
            lun.volume_name_ref = first.bdev_name;
        }
        Ok(lun)
    }

    /// Targets of one controller, as the engine reports them
    pub async fn list_scsi_luns(&self, request: ListRequest) -> Result<ListResponse<ScsiLun>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let parent = resolve_parent(ResourceKind::ScsiController, &request.parent, "")?;
        parent_record(&self.scsi_controllers, &parent).await?;

        let ctrlr = naming::resource_id(&parent).to_string();
        let targets = self.scsi_targets(&ctrlr).await?.ok_or_else(|| {
            Error::invalid(format!("Could not find any LUNs for controller: {}", parent))
        })?;

        let known: Vec<ScsiLun> = self
            .scsi_luns
            .lock()
            .await
            .values()
            .filter(|lun| lun.controller_name_ref == parent)
            .cloned()
            .collect();

        let items = targets
            .into_iter()
            .map(|target| {
                let base = known.iter().find(|k| k.target_num == target.scsi_dev_num);
                ScsiLun {
                    name: base.map(|k| k.name.clone()).unwrap_or_else(|| {
                        naming::compose_name(
                            ResourceKind::ScsiLun,
                            &ctrlr,
                            &target.scsi_dev_num.to_string(),
                        )
                    }),
                    controller_name_ref: parent.clone(),
                    volume_name_ref: target
                        .luns
                        .into_iter()
                        .next()
                        .map(|l| l.bdev_name)
                        .unwrap_or_default(),
                    target_num: target.scsi_dev_num,
                }
            })
            .collect();

        Ok(self.page(items, window))
    }

    pub async fn update_scsi_lun(&self, request: UpdateRequest<ScsiLun>) -> Result<ScsiLun> {
        Err(Error::NotImplemented(format!(
            "update of SCSI LUN {}",
            request.resource.name
        )))
    }

    pub async fn delete_scsi_lun(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.scsi_luns.lock().await;
        let Some(lun) = cached_for_delete(&store, &request.name, request.allow_missing)? else {
            return Ok(());
        };

        parent_record(&self.scsi_controllers, &lun.controller_name_ref).await?;
        let params = RemoveTargetParams {
            ctrlr: naming::resource_id(&lun.controller_name_ref).to_string(),
            scsi_target_num: lun.target_num,
        };
        let removed: bool = self
            .call(method::VHOST_SCSI_CONTROLLER_REMOVE_TARGET, &params)
            .await?;
        confirmed(removed, || format!("Could not delete SCSI LUN: {}", request.name))?;

        store.remove(&request.name);
        info!("Deleted SCSI LUN {}", request.name);
        Ok(())
    }

    pub async fn stats_scsi_lun(&self, name: &str) -> Result<StatsResponse> {
        Err(Error::NotImplemented(format!("stats for SCSI LUN {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::manager::testing;
    use super::*;
    use crate::domain::model::{PciEndpoint, UNASSIGNED_TARGET_NUM};
    use crate::engine::simulated::{Injected, SimulatedEngine};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    const CONTROLLER: &str = "//storage.bridge.dev/scsiControllers/scsi0";

    fn lun(volume: &str) -> ScsiLun {
        ScsiLun {
            name: String::new(),
            controller_name_ref: String::new(),
            volume_name_ref: volume.into(),
            target_num: UNASSIGNED_TARGET_NUM,
        }
    }

    async fn with_controller() -> (Arc<SimulatedEngine>, ResourceManager) {
        let (engine, manager) = testing::manager();
        manager
            .create_scsi_controller(ScsiController::default(), "scsi0")
            .await
            .unwrap();
        (engine, manager)
    }

    #[tokio::test]
    async fn test_controller_lifecycle() {
        let (engine, manager) = with_controller().await;
        assert!(engine.vhost_controller("scsi0").unwrap().backend_specific.scsi.is_some());

        let again = manager
            .create_scsi_controller(ScsiController::default(), "scsi0")
            .await
            .unwrap();
        assert_eq!(again.name, CONTROLLER);
        assert_eq!(engine.calls_to(method::VHOST_CREATE_SCSI_CONTROLLER), 1);

        assert_eq!(manager.get_scsi_controller(CONTROLLER).await.unwrap().name, CONTROLLER);
        let listed = manager.list_scsi_controllers(ListRequest::new("", 0)).await.unwrap();
        assert_eq!(listed.items.len(), 1);

        manager.delete_scsi_controller(DeleteRequest::new(CONTROLLER)).await.unwrap();
        assert!(engine.vhost_controller("scsi0").is_none());
        assert_matches!(
            manager.delete_scsi_controller(DeleteRequest::new(CONTROLLER)).await,
            Err(Error::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_controller_rejects_virtual_function() {
        let (engine, manager) = testing::manager();
        let controller = ScsiController {
            pcie_id: PciEndpoint {
                virtual_function: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        assert_matches!(
            manager.create_scsi_controller(controller, "scsi0").await,
            Err(Error::InvalidArgument(_))
        );
        assert_eq!(engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_lun_target_assigned_by_engine() {
        let (engine, manager) = with_controller().await;

        let first = manager.create_scsi_lun(CONTROLLER, lun("Malloc0"), "lun0").await.unwrap();
        let second = manager.create_scsi_lun(CONTROLLER, lun("Malloc1"), "lun1").await.unwrap();
        assert_eq!(first.target_num, 0);
        assert_eq!(second.target_num, 1);
        assert_eq!(first.name, format!("{}/scsiLuns/lun0", CONTROLLER));
        assert_eq!(first.controller_name_ref, CONTROLLER);

        let fetched = manager.get_scsi_lun(&second.name).await.unwrap();
        assert_eq!(fetched.volume_name_ref, "Malloc1");

        let listed = manager
            .list_scsi_luns(ListRequest::new(CONTROLLER, 1))
            .await
            .unwrap();
        assert_eq!(listed.items[0].name, first.name);
        assert!(!listed.next_page_token.is_empty());

        manager.delete_scsi_lun(DeleteRequest::new(first.name.clone())).await.unwrap();
        let targets = engine.vhost_controller("scsi0").unwrap().backend_specific.scsi.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].scsi_dev_num, 1);
    }

    #[tokio::test]
    async fn test_lun_needs_parent() {
        let (engine, manager) = testing::manager();

        assert_matches!(
            manager.create_scsi_lun(CONTROLLER, lun("Malloc0"), "lun0").await,
            Err(Error::NotFound(name)) if name == CONTROLLER
        );
        assert_matches!(
            manager.create_scsi_lun("", lun("Malloc0"), "lun0").await,
            Err(Error::InvalidArgument(_))
        );
        assert_eq!(engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_lun_negative_target_is_failure() {
        let (engine, manager) = with_controller().await;
        engine.inject(method::VHOST_SCSI_CONTROLLER_ADD_TARGET, Injected::Result(json!(-1)));

        assert_matches!(
            manager.create_scsi_lun(CONTROLLER, lun("Malloc0"), "lun0").await,
            Err(Error::InvalidArgument(_))
        );
    }

    #[tokio::test]
    async fn test_unimplemented_operations() {
        let (_engine, manager) = with_controller().await;
        let created = manager.create_scsi_lun(CONTROLLER, lun("Malloc0"), "lun0").await.unwrap();

        assert_matches!(
            manager.update_scsi_lun(UpdateRequest::new(created.clone())).await,
            Err(Error::NotImplemented(_))
        );
        assert_matches!(
            manager.stats_scsi_lun(&created.name).await,
            Err(Error::NotImplemented(_))
        );
        assert_matches!(
            manager.stats_scsi_controller(CONTROLLER).await,
            Err(Error::NotImplemented(_))
        );
    }

    #[tokio::test]
    async fn test_lun_list_with_lost_controller() {
        let (engine, manager) = with_controller().await;
        engine.inject(
            method::VHOST_GET_CONTROLLERS,
            Injected::Engine(-19, "No such device".into()),
        );

        assert_matches!(
            manager.list_scsi_luns(ListRequest::new(CONTROLLER, 0)).await,
            Err(Error::Engine { code: -19, .. })
        );

        engine.inject(method::VHOST_GET_CONTROLLERS, Injected::Result(json!([])));
        assert_matches!(
            manager.list_scsi_luns(ListRequest::new(CONTROLLER, 0)).await,
            Err(Error::InvalidArgument(_))
        );
    }
}
