//! NVMe namespaces
//!
//! The host-visible nsid is whatever the engine assigns; a requested value is
//! only a hint until `nvmf_subsystem_add_ns` answers.

use super::manager::{
    cached, cached_for_delete, confirmed, parent_record, resolve_id, resolve_parent,
    update_cached, ResourceManager,
};
use crate::domain::model::{
    DeleteRequest, ListRequest, ListResponse, NvmeNamespace, NvmeNamespaceSpec,
    NvmeNamespaceStatus, OperState, StatsResponse, UpdateRequest, VolumeStats,
};
use crate::domain::validation;
use crate::engine::protocol::{
    method, AddNamespaceParams, BdevIoStat, BdevNameParams, IoStatResult, NamespaceParams,
    RemoveNamespaceParams, Subsystem,
};
use crate::error::{Error, Result};
use crate::naming::{self, ResourceKind};
use tracing::info;

impl From<BdevIoStat> for VolumeStats {
    fn from(stat: BdevIoStat) -> Self {
        Self {
            read_bytes_count: stat.bytes_read,
            read_ops_count: stat.num_read_ops,
            write_bytes_count: stat.bytes_written,
            write_ops_count: stat.num_write_ops,
            read_latency_ticks: stat.read_latency_ticks,
            write_latency_ticks: stat.write_latency_ticks,
        }
    }
}

impl ResourceManager {
    /// I/O counters of one backing volume
    pub(crate) async fn volume_stats(&self, volume: &str) -> Result<VolumeStats> {
        let params = BdevNameParams {
            name: volume.to_string(),
        };
        let result: IoStatResult = self.call(method::BDEV_GET_IOSTAT, &params).await?;
        result
            .bdevs
            .into_iter()
            .find(|bdev| bdev.name == volume)
            .map(VolumeStats::from)
            .ok_or_else(|| Error::invalid(format!("Could not find stats for volume: {}", volume)))
    }

    /// Attach a volume to the subsystem named by `parent`
    pub async fn create_nvme_namespace(
        &self,
        parent: &str,
        namespace: NvmeNamespace,
        id: &str,
    ) -> Result<NvmeNamespace> {
        let parent = resolve_parent(
            ResourceKind::Subsystem,
            parent,
            &namespace.spec.subsystem_name_ref,
        )?;
        validation::required("spec.volumeNameRef", &namespace.spec.volume_name_ref)?;
        if namespace.spec.host_nsid < 0 {
            return Err(Error::invalid(format!(
                "negative host nsid: {}",
                namespace.spec.host_nsid
            )));
        }

        let id = resolve_id(id)?;
        let name = naming::compose_name(ResourceKind::Namespace, &naming::parent_id(&parent), &id);

        let mut store = self.namespaces.lock().await;
        if let Some(existing) = store.get(&name) {
            info!("Namespace {} already exists, returning cached copy", name);
            return Ok(existing.clone());
        }

        let subsystem = parent_record(&self.subsystems, &parent).await?;
        let spec = &namespace.spec;
        let params = AddNamespaceParams {
            nqn: subsystem.spec.nqn.clone(),
            namespace: NamespaceParams {
                nsid: (spec.host_nsid > 0).then_some(spec.host_nsid),
                bdev_name: spec.volume_name_ref.clone(),
                uuid: spec.uuid.clone(),
                nguid: spec.nguid.clone(),
                eui64: spec.eui64.clone(),
            },
        };
        let nsid: i32 = self.call(method::NVMF_SUBSYSTEM_ADD_NS, &params).await?;
        confirmed(nsid > 0, || format!("Could not create NS: {}", name))?;

        let mut response = namespace;
        response.name = name.clone();
        response.spec.subsystem_name_ref = parent;
        response.spec.host_nsid = nsid;
        response.status = Some(NvmeNamespaceStatus {
            oper_state: OperState::Enabled,
        });
        store.insert(name.clone(), response.clone());

        info!("Created namespace {} as nsid {} on {}", name, nsid, subsystem.spec.nqn);
        Ok(response)
    }

    /// Cached namespace cross-referenced by qualifier and nsid
    pub async fn get_nvme_namespace(&self, name: &str) -> Result<NvmeNamespace> {
        let store = self.namespaces.lock().await;
        let mut namespace = cached(&store, name)?;
        let subsystem = parent_record(&self.subsystems, &namespace.spec.subsystem_name_ref).await?;

        let rows: Vec<Subsystem> = self.call_bare(method::NVMF_GET_SUBSYSTEMS).await?;
        let row = rows
            .into_iter()
            .find(|row| row.nqn == subsystem.spec.nqn)
            .ok_or_else(|| Error::invalid(format!("Could not find NQN: {}", subsystem.spec.nqn)))?;
        let found = row
            .namespaces
            .into_iter()
            .find(|ns| ns.nsid == namespace.spec.host_nsid)
            .ok_or_else(|| {
                Error::invalid(format!("Could not find NSID: {}", namespace.spec.host_nsid))
            })?;

        namespace.spec.volume_name_ref = found.bdev_name;
        namespace.spec.uuid = found.uuid.or(namespace.spec.uuid);
        namespace.spec.nguid = found.nguid.or(namespace.spec.nguid);
        namespace.spec.eui64 = found.eui64.or(namespace.spec.eui64);
        namespace.status = Some(NvmeNamespaceStatus {
            oper_state: OperState::Enabled,
        });
        Ok(namespace)
    }

    /// Namespaces of one subsystem, as the engine reports them
    pub async fn list_nvme_namespaces(
        &self,
        request: ListRequest,
    ) -> Result<ListResponse<NvmeNamespace>> {
        let window = self.cursors.extract(request.page_size, &request.page_token)?;
        let parent = resolve_parent(ResourceKind::Subsystem, &request.parent, "")?;
        let subsystem = parent_record(&self.subsystems, &parent).await?;

        let rows: Vec<Subsystem> = self.call_bare(method::NVMF_GET_SUBSYSTEMS).await?;
        let row = rows
            .into_iter()
            .find(|row| row.nqn == subsystem.spec.nqn)
            .ok_or_else(|| {
                Error::invalid(format!(
                    "Could not find any namespaces for NQN: {}",
                    subsystem.spec.nqn
                ))
            })?;

        let known: Vec<NvmeNamespace> = self
            .namespaces
            .lock()
            .await
            .values()
            .filter(|ns| ns.spec.subsystem_name_ref == parent)
            .cloned()
            .collect();
        let parent_id = naming::parent_id(&parent);

        let items = row
            .namespaces
            .into_iter()
            .map(|ns| {
                let base = known.iter().find(|k| k.spec.host_nsid == ns.nsid);
                NvmeNamespace {
                    name: base.map(|k| k.name.clone()).unwrap_or_else(|| {
                        let id = ns.nsid.to_string();
                        naming::compose_name(ResourceKind::Namespace, &parent_id, &id)
                    }),
                    spec: NvmeNamespaceSpec {
                        subsystem_name_ref: parent.clone(),
                        host_nsid: ns.nsid,
                        volume_name_ref: ns.bdev_name,
                        uuid: ns.uuid,
                        nguid: ns.nguid,
                        eui64: ns.eui64,
                    },
                    status: Some(NvmeNamespaceStatus {
                        oper_state: OperState::Enabled,
                    }),
                }
            })
            .collect();

        Ok(self.page(items, window))
    }

    pub async fn update_nvme_namespace(
        &self,
        request: UpdateRequest<NvmeNamespace>,
    ) -> Result<NvmeNamespace> {
        let updated = {
            let mut store = self.namespaces.lock().await;
            update_cached(&mut store, &request)?
        };
        match updated {
            Some(namespace) => Ok(namespace),
            None => {
                let name = request.resource.name.clone();
                let parent =
                    naming::parent_name(ResourceKind::Namespace, &name).unwrap_or_default();
                info!("Namespace {} missing on update, creating it", name);
                self.create_nvme_namespace(&parent, request.resource, naming::resource_id(&name))
                    .await
            }
        }
    }

    pub async fn delete_nvme_namespace(&self, request: DeleteRequest) -> Result<()> {
        let mut store = self.namespaces.lock().await;
        let Some(namespace) =
            cached_for_delete(&store, &request.name, request.allow_missing)?
        else {
            return Ok(());
        };

        let subsystem = parent_record(&self.subsystems, &namespace.spec.subsystem_name_ref).await?;
        let params = RemoveNamespaceParams {
            nqn: subsystem.spec.nqn.clone(),
            nsid: namespace.spec.host_nsid,
        };
        let removed: bool = self.call(method::NVMF_SUBSYSTEM_REMOVE_NS, &params).await?;
        confirmed(removed, || format!("Could not delete NS: {}", request.name))?;

        store.remove(&request.name);
        info!("Deleted namespace {}", request.name);
        Ok(())
    }

    /// Counters of the backing volume
    pub async fn stats_nvme_namespace(&self, name: &str) -> Result<StatsResponse> {
        let store = self.namespaces.lock().await;
        let namespace = cached(&store, name)?;
        let stats = self.volume_stats(&namespace.spec.volume_name_ref).await?;
        Ok(StatsResponse {
            name: name.to_string(),
            stats,
        })
    }
}
