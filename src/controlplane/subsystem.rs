//! NVMe subsystems

use super::manager::{
    cached, cached_for_delete, confirmed, resolve_id, update_cached, ResourceManager,
};
use crate::domain::model::{
    DeleteRequest, ListRequest, ListResponse, NvmeSubsystem, NvmeSubsystemSpec,
    NvmeSubsystemStatus, StatsResponse, UpdateRequest, VolumeStats,
};
use crate::domain::validation;
use crate::engine::protocol::{
    method, AddHostParams, CreateSubsystemParams, NvmfStats, Subsystem, SubsystemParams,
    VersionResult,
};
use crate::error::{Error, Result};
use crate::naming::{self, ResourceKind};
use std::collections::HashMap;
use tracing::{debug, info, warn};

impl ResourceManager {
    /// Create a subsystem, or return the cached one for a replayed id
    pub async fn create_nvme_subsystem(
        &self,
        subsystem: NvmeSubsystem,
        id: &str,
    ) -> Result<NvmeSubsystem> {
        let nqn = subsystem.spec.nqn.clone();
        validation::nqn(&nqn)?;
        if let Some(host) = &subsystem.spec.hostnqn {
            validation::nqn(host)?;
        }

        let id = resolve_id(id)?;
        let name = naming::compose_name(ResourceKind::Subsystem, "", &id);

        let mut store = self.subsystems.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("Subsystem {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }
        if let Some(owner) = store.values().find(|s| s.spec.nqn == nqn) {
            return Err(Error::invalid(format!(
                "NQN {} is already used by {}",
                nqn, owner.name
            )));
        }

        let params = CreateSubsystemParams {
            nqn: nqn.clone(),
            serial_number: subsystem.spec.serial_number.clone(),
            model_number: subsystem.spec.model_number.clone(),
            allow_any_host: subsystem.spec.hostnqn.is_none(),
            max_namespaces: subsystem.spec.max_namespaces,
        };
        let created: bool = self.call(method::NVMF_CREATE_SUBSYSTEM, &params).await?;
        confirmed(created, || format!("Could not create NQN: {}", nqn))?;

        let version = match self.finish_subsystem(&subsystem.spec).await {
            Ok(version) => version,
            Err(e) => {
                self.discard_subsystem(&nqn).await;
                return Err(e);
            }
        };

        let mut response = subsystem;
        response.name = name.clone();
        response.status = Some(NvmeSubsystemStatus {
            firmware_revision: version.version,
        });
        store.insert(name.clone(), response.clone());

        info!("Created subsystem {} ({})", name, nqn);
        Ok(response)
    }

    /// Steps after the engine created the subsystem: host registration and
    /// the version request whose answer becomes the firmware revision
    async fn finish_subsystem(&self, spec: &NvmeSubsystemSpec) -> Result<VersionResult> {
        if let Some(host) = &spec.hostnqn {
            let params = AddHostParams {
                nqn: spec.nqn.clone(),
                host: host.clone(),
                psk: spec.psk.clone(),
            };
            let added: bool = self.call(method::NVMF_SUBSYSTEM_ADD_HOST, &params).await?;
            confirmed(added, || format!("Could not add host {} to NQN: {}", host, spec.nqn))?;
        }

        self.call_bare(method::SPDK_GET_VERSION).await
    }

    async fn discard_subsystem(&self, nqn: &str) {
        let params = SubsystemParams { nqn: nqn.to_string() };
        match self.call::<_, bool>(method::NVMF_DELETE_SUBSYSTEM, &params).await {
            Ok(true) => info!("Rolled back subsystem {}", nqn),
            Ok(false) => warn!("Rollback of subsystem {} had no effect", nqn),
            Err(e) => warn!("Rollback of subsystem {} failed: {}", nqn, e),
        }
    }

    /// Cached subsystem refreshed from the engine's listing
    pub async fn get_nvme_subsystem(&self, name: &str) -> Result<NvmeSubsystem> {
        let store = self.subsystems.lock().await;
        let mut subsystem = cached(&store, name)?;

        let rows: Vec<Subsystem> = self.call_bare(method::NVMF_GET_SUBSYSTEMS).await?;
        let row = rows
            .into_iter()
            .find(|row| row.nqn == subsystem.spec.nqn)
            .ok_or_else(|| Error::invalid(format!("Could not find NQN: {}", subsystem.spec.nqn)))?;

        subsystem.spec.serial_number = row.serial_number;
        subsystem.spec.model_number = row.model_number;
        subsystem.spec.max_namespaces = row.max_namespaces;
        debug!("Fetched subsystem {}", name);
        Ok(subsystem)
    }

    /// Every non-discovery subsystem the engine reports
    pub async fn list_nvme_subsystems(
        &self,
        request: ListRequest,
    ) -> Result<ListResponse<NvmeSubsystem>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let rows: Vec<Subsystem> = self.call_bare(method::NVMF_GET_SUBSYSTEMS).await?;

        let known: HashMap<String, NvmeSubsystem> = self
            .subsystems
            .lock()
            .await
            .values()
            .map(|s| (s.spec.nqn.clone(), s.clone()))
            .collect();

        let items = rows
            .into_iter()
            .filter(|row| !row.is_discovery())
            .map(|row| {
                let base = known.get(&row.nqn);
                NvmeSubsystem {
                    name: base.map(|s| s.name.clone()).unwrap_or_else(|| {
                        naming::compose_name(ResourceKind::Subsystem, "", &row.nqn)
                    }),
                    spec: NvmeSubsystemSpec {
                        serial_number: row.serial_number,
                        model_number: row.model_number,
                        max_namespaces: row.max_namespaces,
                        hostnqn: base.and_then(|s| s.spec.hostnqn.clone()),
                        psk: base.and_then(|s| s.spec.psk.clone()),
                        nqn: row.nqn,
                    },
                    status: base.and_then(|s| s.status.clone()),
                }
            })
            .collect();

        Ok(self.page(items, window))
    }

    pub async fn update_nvme_subsystem(
        &self,
        request: UpdateRequest<NvmeSubsystem>,
    ) -> Result<NvmeSubsystem> {
        let updated = {
            let mut store = self.subsystems.lock().await;
            update_cached(&mut store, &request)?
        };
        match updated {
            Some(subsystem) => Ok(subsystem),
            None => {
                let id = naming::resource_id(&request.resource.name).to_string();
                info!("Subsystem {} missing on update, creating it", request.resource.name);
                self.create_nvme_subsystem(request.resource, &id).await
            }
        }
    }

    pub async fn delete_nvme_subsystem(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.subsystems.lock().await;
        let Some(subsystem) =
            cached_for_delete(&store, &request.name, request.allow_missing)?
        else {
            return Ok(());
        };

        let params = SubsystemParams {
            nqn: subsystem.spec.nqn.clone(),
        };
        let deleted: bool = self.call(method::NVMF_DELETE_SUBSYSTEM, &params).await?;
        confirmed(deleted, || format!("Could not delete NQN: {}", subsystem.spec.nqn))?;

        store.remove(&request.name);
        info!("Deleted subsystem {}", request.name);
        Ok(())
    }

    /// Target stats are queried but carry no per-subsystem counters
    pub async fn stats_nvme_subsystem(&self, name: &str) -> Result<StatsResponse> {
        let store = self.subsystems.lock().await;
        cached(&store, name)?;

        let stats: NvmfStats = self.call_bare(method::NVMF_GET_STATS).await?;
        debug!(
            "Target reports {} poll groups at tick rate {}",
            stats.poll_groups.len(),
            stats.tick_rate
        );

        Ok(StatsResponse {
            name: name.to_string(),
            stats: VolumeStats::unavailable(),
        })
    }
}
