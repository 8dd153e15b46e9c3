//! Resource Manager
//!
//! Owns one cache per resource family and runs every operation as
//! validate → name → idempotency check → transport params → engine call →
//! result check → cache mutation.
//!
//! Each family's cache sits behind its own async mutex, held across the whole
//! sequence so two concurrent Creates of one name cannot both reach the
//! engine. Child families lock themselves first and copy the parent record
//! under a brief parent lock; parents never lock children.

use crate::config::TransportConfig;
use crate::domain::fieldmask;
use crate::domain::model::{
    ListResponse, NvmeController, NvmeNamespace, NvmeSubsystem, Resource, ScsiController, ScsiLun,
    UpdateRequest, VirtioBlk,
};
use crate::domain::ports::{EngineClientRef, QosProviderRef};
use crate::domain::validation;
use crate::engine::protocol::{method, VersionResult};
use crate::engine::{invoke, invoke_bare, EngineQos};
use crate::error::{Error, Result};
use crate::naming::ResourceKind;
use crate::pagination::{CursorStore, PageWindow};
use crate::transport::TransportRegistry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One family's cache
pub(crate) type Store<T> = Mutex<BTreeMap<String, T>>;

// =============================================================================
// Resource Manager
// =============================================================================

/// Front door for every resource operation
pub struct ResourceManager {
    pub(crate) engine: EngineClientRef,
    pub(crate) transports: TransportRegistry,
    pub(crate) qos: QosProviderRef,
    pub(crate) cursors: CursorStore,

    pub(crate) subsystems: Store<NvmeSubsystem>,
    pub(crate) controllers: Store<NvmeController>,
    pub(crate) namespaces: Store<NvmeNamespace>,
    pub(crate) virtio_blks: Store<VirtioBlk>,
    pub(crate) scsi_controllers: Store<ScsiController>,
    pub(crate) scsi_luns: Store<ScsiLun>,
}

impl ResourceManager {
    /// Create a manager with explicit collaborators
    pub fn new(
        engine: EngineClientRef,
        transports: TransportRegistry,
        qos: QosProviderRef,
    ) -> Self {
        Self {
            engine,
            transports,
            qos,
            cursors: CursorStore::new(),
            subsystems: Mutex::new(BTreeMap::new()),
            controllers: Mutex::new(BTreeMap::new()),
            namespaces: Mutex::new(BTreeMap::new()),
            virtio_blks: Mutex::new(BTreeMap::new()),
            scsi_controllers: Mutex::new(BTreeMap::new()),
            scsi_luns: Mutex::new(BTreeMap::new()),
        }
    }

    /// Every transport from `config`, QoS applied through the same engine
    pub fn with_engine(engine: EngineClientRef, config: &TransportConfig) -> Self {
        let qos: QosProviderRef = Arc::new(EngineQos::new(engine.clone()));
        Self::new(engine, TransportRegistry::new(config), qos)
    }

    /// Ask the engine for its version; used by readiness checks
    pub async fn engine_version(&self) -> Result<VersionResult> {
        invoke_bare(self.engine.as_ref(), method::SPDK_GET_VERSION).await
    }

    // =========================================================================
    // Shared Steps
    // =========================================================================

    pub(crate) async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        invoke(self.engine.as_ref(), method, params).await
    }

    pub(crate) async fn call_bare<R: DeserializeOwned>(&self, method: &str) -> Result<R> {
        invoke_bare(self.engine.as_ref(), method).await
    }

    /// Sort by name, then cut one page and mint the follow-up token
    pub(crate) fn page<T: Resource>(
        &self,
        mut items: Vec<T>,
        window: PageWindow,
    ) -> ListResponse<T> {
        items.sort_by(|a, b| a.name().cmp(b.name()));
        let total = items.len();
        let (items, next_page_token) = self.cursors.paginate(items, window);
        debug!(
            "Listed {} of {} {} resources from offset {}",
            items.len(),
            total,
            T::KIND,
            window.offset
        );
        ListResponse {
            items,
            next_page_token,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Caller-supplied id, or a fresh one when empty
pub(crate) fn resolve_id(requested: &str) -> Result<String> {
    if requested.is_empty() {
        let id = uuid::Uuid::new_v4().to_string();
        debug!("Generated resource id {}", id);
        return Ok(id);
    }
    validation::resource_id(requested)?;
    Ok(requested.to_string())
}

/// Explicit parent, else the record's own reference, checked against `kind`
pub(crate) fn resolve_parent(
    kind: ResourceKind,
    explicit: &str,
    reference: &str,
) -> Result<String> {
    let parent = if explicit.is_empty() { reference } else { explicit };
    validation::required("parent", parent)?;
    validation::name_of_kind(parent, kind)?;
    Ok(parent.to_string())
}

/// Copy a parent record out from under its family lock
pub(crate) async fn parent_record<T: Clone>(store: &Store<T>, name: &str) -> Result<T> {
    store
        .lock()
        .await
        .get(name)
        .cloned()
        .ok_or_else(|| Error::NotFound(name.to_string()))
}

pub(crate) fn cached<T: Clone>(store: &BTreeMap<String, T>, name: &str) -> Result<T> {
    validation::required("name", name)?;
    store
        .get(name)
        .cloned()
        .ok_or_else(|| Error::NotFound(name.to_string()))
}

/// Record to delete; `None` when absent and the caller allowed that
pub(crate) fn cached_for_delete<T: Clone>(
    store: &BTreeMap<String, T>,
    name: &str,
    allow_missing: bool,
) -> Result<Option<T>> {
    validation::required("name", name)?;
    match store.get(name) {
        Some(record) => Ok(Some(record.clone())),
        None if allow_missing => {
            debug!("Delete of absent {} ignored", name);
            Ok(None)
        }
        None => Err(Error::NotFound(name.to_string())),
    }
}

/// An engine call that answered "false" did nothing
pub(crate) fn confirmed(ok: bool, failure: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidArgument(failure()))
    }
}

/// Local-only Update.
///
/// Fields naming engine objects (qualifier, parent, nsid, volume, limits)
/// keep their stored values; an update that names different ones is
/// rejected. Returns `None` when the record is absent and `allow_missing` is
/// set; the caller then creates it through the normal Create path.
pub(crate) fn update_cached<T: Resource>(
    store: &mut BTreeMap<String, T>,
    request: &UpdateRequest<T>,
) -> Result<Option<T>> {
    let name = request.resource.name();
    validation::name_of_kind(name, T::KIND)?;

    let existing = match store.get(name) {
        Some(existing) => existing,
        None if request.allow_missing => return Ok(None),
        None => return Err(Error::NotFound(name.to_string())),
    };

    let mut merged =
        fieldmask::merge(existing, &request.resource, request.update_mask.as_ref())?;
    merged.pin_identity(existing).map_err(|field| {
        Error::invalid(format!("{} of {} cannot be changed by an update", field, name))
    })?;
    store.insert(name.to_string(), merged.clone());
    info!("Updated {} {}", T::KIND, name);
    Ok(Some(merged))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::domain::model::{NvmeSubsystemSpec, PciEndpoint};
    use crate::engine::simulated::SimulatedEngine;

    pub const NQN: &str = "nqn.2022-09.io.spdk:opi3";

    pub fn manager() -> (Arc<SimulatedEngine>, ResourceManager) {
        with_engine(SimulatedEngine::new())
    }

    pub fn with_engine(engine: SimulatedEngine) -> (Arc<SimulatedEngine>, ResourceManager) {
        let engine = Arc::new(engine);
        let manager = ResourceManager::with_engine(engine.clone(), &TransportConfig::default());
        (engine, manager)
    }

    pub fn subsystem(nqn: &str) -> NvmeSubsystem {
        NvmeSubsystem {
            name: String::new(),
            spec: NvmeSubsystemSpec {
                nqn: nqn.to_string(),
                serial_number: "OpiSerialNumber".into(),
                model_number: "OpiModelNumber".into(),
                max_namespaces: 11,
                ..Default::default()
            },
            status: None,
        }
    }

    pub fn virtio_blk(volume: &str) -> VirtioBlk {
        VirtioBlk {
            name: String::new(),
            pcie_id: PciEndpoint::new(0),
            volume_name_ref: volume.to_string(),
            max_io_qps: 1,
            max_limit: None,
        }
    }

    /// A subsystem created through the manager, returned with its name
    pub async fn seeded_subsystem(manager: &ResourceManager, id: &str, nqn: &str) -> NvmeSubsystem {
        manager.create_nvme_subsystem(subsystem(nqn), id).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NvmeSubsystemSpec, UpdateRequest};
    use crate::domain::FieldMask;
    use assert_matches::assert_matches;

    fn record(name: &str, serial: &str) -> NvmeSubsystem {
        NvmeSubsystem {
            name: name.into(),
            spec: NvmeSubsystemSpec {
                nqn: "nqn.2022-09.io.spdk:opi1".into(),
                serial_number: serial.into(),
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn test_resolve_id() {
        assert_eq!(resolve_id("subsys0").unwrap(), "subsys0");
        assert_matches!(resolve_id("Bad_Id"), Err(Error::InvalidArgument(_)));

        let generated = resolve_id("").unwrap();
        assert!(validation::resource_id(&generated).is_ok());
        assert_ne!(generated, resolve_id("").unwrap());
    }

    #[test]
    fn test_resolve_parent_prefers_explicit() {
        let explicit = "//storage.bridge.dev/subsystems/a";
        let reference = "//storage.bridge.dev/subsystems/b";
        assert_eq!(
            resolve_parent(ResourceKind::Subsystem, explicit, reference).unwrap(),
            explicit
        );
        assert_eq!(
            resolve_parent(ResourceKind::Subsystem, "", reference).unwrap(),
            reference
        );
        assert_matches!(
            resolve_parent(ResourceKind::Subsystem, "", ""),
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            resolve_parent(ResourceKind::Subsystem, "//storage.bridge.dev/virtioBlks/x", ""),
            Err(Error::InvalidArgument(_))
        );
    }

    #[test]
    fn test_update_cached() {
        let name = "//storage.bridge.dev/subsystems/s1";
        let mut store = BTreeMap::new();

        let missing = UpdateRequest::new(record(name, "new"));
        assert_matches!(update_cached(&mut store, &missing), Err(Error::NotFound(_)));

        let mut allowed = UpdateRequest::new(record(name, "new"));
        allowed.allow_missing = true;
        assert_matches!(update_cached(&mut store, &allowed), Ok(None));

        store.insert(name.to_string(), record(name, "old"));
        let mut masked = UpdateRequest::new(record(name, "new"));
        masked.update_mask = Some(FieldMask::new(["spec.serial_number"]));
        let updated = update_cached(&mut store, &masked).unwrap().unwrap();
        assert_eq!(updated.spec.serial_number, "new");
        assert_eq!(store[name].spec.serial_number, "new");
    }

    #[test]
    fn test_update_cached_pins_identity() {
        let name = "//storage.bridge.dev/subsystems/s1";
        let mut store = BTreeMap::new();
        store.insert(name.to_string(), record(name, "old"));

        let mut renamed = record(name, "new");
        renamed.spec.nqn = "nqn.2022-09.io.spdk:other".into();
        assert_matches!(
            update_cached(&mut store, &UpdateRequest::new(renamed.clone())),
            Err(Error::InvalidArgument(msg)) if msg.contains("spec.nqn")
        );
        let mut masked = UpdateRequest::new(renamed);
        masked.update_mask = Some(FieldMask::new(["spec.nqn"]));
        assert_matches!(update_cached(&mut store, &masked), Err(Error::InvalidArgument(_)));
        assert_eq!(store[name].spec.serial_number, "old");

        // A full replace that leaves the qualifier out keeps the stored one
        let mut unset = record(name, "new");
        unset.spec.nqn.clear();
        let updated = update_cached(&mut store, &UpdateRequest::new(unset)).unwrap().unwrap();
        assert_eq!(updated.spec.nqn, "nqn.2022-09.io.spdk:opi1");
        assert_eq!(updated.spec.serial_number, "new");
    }

    #[test]
    fn test_cached_for_delete() {
        let mut store = BTreeMap::new();
        store.insert("a".to_string(), 1);

        assert_eq!(cached_for_delete(&store, "a", false).unwrap(), Some(1));
        assert_eq!(cached_for_delete(&store, "b", true).unwrap(), None);
        assert_matches!(cached_for_delete(&store, "b", false), Err(Error::NotFound(_)));
        assert_matches!(cached_for_delete(&store, "", true), Err(Error::InvalidArgument(_)));
    }
}
