//! Resource records and request/response shapes
//!
//! These are plain data records: the bridge never interprets them beyond the
//! fields each operation needs. Everything serializes in camelCase so the
//! same types travel over the REST surface and through field-mask merges.

use crate::domain::fieldmask::FieldMask;
use crate::naming::ResourceKind;
use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Trait
// =============================================================================

/// Common surface of every cached resource
pub trait Resource: Clone + Send + Sync + Serialize + serde::de::DeserializeOwned + 'static {
    const KIND: ResourceKind;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    /// Hold the fields that tie this record to engine state to their stored
    /// values. Unset fields take the stored value; a field that names
    /// something else is returned as `Err(path)`.
    fn pin_identity(&mut self, stored: &Self) -> std::result::Result<(), &'static str>;
}

macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl_resource!($ty, $kind, |_updated, _stored| Ok(()));
    };
    ($ty:ty, $kind:expr, |$updated:ident, $stored:ident| $pin:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn pin_identity(&mut self, stored: &Self) -> std::result::Result<(), &'static str> {
                let $updated = self;
                let $stored = stored;
                $pin
            }
        }
    };
}

/// Unset keeps `stored`; any other differing value is rejected as `field`
fn pinned<T>(
    updated: &mut T,
    stored: &T,
    field: &'static str,
) -> std::result::Result<(), &'static str>
where
    T: PartialEq + Default + Clone,
{
    if *updated == T::default() {
        *updated = stored.clone();
    }
    if updated == stored {
        Ok(())
    } else {
        Err(field)
    }
}

/// No unset form: must equal `stored`
fn fixed<T: PartialEq>(
    updated: &T,
    stored: &T,
    field: &'static str,
) -> std::result::Result<(), &'static str> {
    if updated == stored {
        Ok(())
    } else {
        Err(field)
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// PCI function locator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PciEndpoint {
    pub physical_function: i32,
    #[serde(default)]
    pub virtual_function: i32,
    #[serde(default)]
    pub port_id: i32,
}

impl PciEndpoint {
    pub fn new(physical_function: i32) -> Self {
        Self {
            physical_function,
            ..Default::default()
        }
    }
}

/// Network address family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    #[default]
    #[serde(rename = "IPv4", alias = "ipv4")]
    Ipv4,
    #[serde(rename = "IPv6", alias = "ipv6")]
    Ipv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Network fabric endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricsEndpoint {
    pub traddr: String,
    pub trsvcid: String,
    #[serde(default)]
    pub adrfam: AddressFamily,
}

/// Transport-specific controller endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerEndpoint {
    Pcie(PciEndpoint),
    Fabrics(FabricsEndpoint),
}

/// Attachment class of an NVMe controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NvmeTransportType {
    #[default]
    Tcp,
    Rdma,
    /// Local PCIe emulated through vfio-user
    Pcie,
}

impl std::fmt::Display for NvmeTransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NvmeTransportType::Tcp => write!(f, "TCP"),
            NvmeTransportType::Rdma => write!(f, "RDMA"),
            NvmeTransportType::Pcie => write!(f, "PCIe"),
        }
    }
}

// =============================================================================
// NVMe Subsystem
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeSubsystem {
    #[serde(default)]
    pub name: String,
    pub spec: NvmeSubsystemSpec,
    #[serde(default)]
    pub status: Option<NvmeSubsystemStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeSubsystemSpec {
    /// Qualifier, unique among live subsystems
    pub nqn: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub max_namespaces: i64,
    /// Only this host may connect when set
    #[serde(default)]
    pub hostnqn: Option<String>,
    /// Pre-shared key enabling a secure channel on fabric listeners
    #[serde(default)]
    pub psk: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeSubsystemStatus {
    pub firmware_revision: String,
}

impl_resource!(NvmeSubsystem, ResourceKind::Subsystem, |updated, stored| {
    pinned(&mut updated.spec.nqn, &stored.spec.nqn, "spec.nqn")?;
    pinned(&mut updated.spec.hostnqn, &stored.spec.hostnqn, "spec.hostnqn")?;
    pinned(&mut updated.spec.psk, &stored.spec.psk, "spec.psk")
});

// =============================================================================
// NVMe Controller
// =============================================================================

/// Controller id before the engine confirms one
pub const UNASSIGNED_CONTROLLER_ID: i32 = -1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeController {
    #[serde(default)]
    pub name: String,
    pub spec: NvmeControllerSpec,
    #[serde(default)]
    pub status: Option<NvmeControllerStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeControllerSpec {
    /// Parent subsystem name, recovered from `name` when empty
    #[serde(default)]
    pub subsystem_name_ref: String,
    #[serde(default = "unassigned_controller_id")]
    pub nvme_controller_id: i32,
    #[serde(default)]
    pub trtype: NvmeTransportType,
    #[serde(default)]
    pub endpoint: Option<ControllerEndpoint>,
    #[serde(default)]
    pub max_nsq: i32,
    #[serde(default)]
    pub max_ncq: i32,
}

fn unassigned_controller_id() -> i32 {
    UNASSIGNED_CONTROLLER_ID
}

impl Default for NvmeControllerSpec {
    fn default() -> Self {
        Self {
            subsystem_name_ref: String::new(),
            nvme_controller_id: UNASSIGNED_CONTROLLER_ID,
            trtype: NvmeTransportType::default(),
            endpoint: None,
            max_nsq: 0,
            max_ncq: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeControllerStatus {
    pub active: bool,
}

impl_resource!(NvmeController, ResourceKind::Controller, |updated, stored| {
    pinned(
        &mut updated.spec.subsystem_name_ref,
        &stored.spec.subsystem_name_ref,
        "spec.subsystemNameRef",
    )?;
    fixed(&updated.spec.trtype, &stored.spec.trtype, "spec.trtype")?;
    pinned(&mut updated.spec.endpoint, &stored.spec.endpoint, "spec.endpoint")
});

// =============================================================================
// NVMe Namespace
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeNamespace {
    #[serde(default)]
    pub name: String,
    pub spec: NvmeNamespaceSpec,
    #[serde(default)]
    pub status: Option<NvmeNamespaceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeNamespaceSpec {
    #[serde(default)]
    pub subsystem_name_ref: String,
    /// Requested nsid, 0 lets the engine choose. Provisional until created.
    #[serde(default)]
    pub host_nsid: i32,
    pub volume_name_ref: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub nguid: Option<String>,
    #[serde(default)]
    pub eui64: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    #[default]
    Unspecified,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvmeNamespaceStatus {
    pub oper_state: OperState,
}

impl_resource!(NvmeNamespace, ResourceKind::Namespace, |updated, stored| {
    let (spec, was) = (&mut updated.spec, &stored.spec);
    pinned(
        &mut spec.subsystem_name_ref,
        &was.subsystem_name_ref,
        "spec.subsystemNameRef",
    )?;
    pinned(&mut spec.host_nsid, &was.host_nsid, "spec.hostNsid")?;
    pinned(&mut spec.volume_name_ref, &was.volume_name_ref, "spec.volumeNameRef")?;
    pinned(&mut spec.uuid, &was.uuid, "spec.uuid")?;
    pinned(&mut spec.nguid, &was.nguid, "spec.nguid")?;
    pinned(&mut spec.eui64, &was.eui64, "spec.eui64")
});

// =============================================================================
// Virtio Devices
// =============================================================================

/// Per-device QoS limits, zero means unlimited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QosLimits {
    #[serde(default)]
    pub rw_iops_kiops: i64,
    #[serde(default)]
    pub rw_bandwidth_mbs: i64,
    #[serde(default)]
    pub rd_bandwidth_mbs: i64,
    #[serde(default)]
    pub wr_bandwidth_mbs: i64,
}

impl QosLimits {
    pub fn is_unlimited(&self) -> bool {
        self.rw_iops_kiops == 0
            && self.rw_bandwidth_mbs == 0
            && self.rd_bandwidth_mbs == 0
            && self.wr_bandwidth_mbs == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtioBlk {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pcie_id: PciEndpoint,
    pub volume_name_ref: String,
    #[serde(default)]
    pub max_io_qps: i64,
    #[serde(default)]
    pub max_limit: Option<QosLimits>,
}

// Limits live on the engine; they are set on Create and cleared on Delete only
impl_resource!(VirtioBlk, ResourceKind::VirtioBlk, |updated, stored| {
    pinned(&mut updated.volume_name_ref, &stored.volume_name_ref, "volumeNameRef")?;
    pinned(&mut updated.max_limit, &stored.max_limit, "maxLimit")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScsiController {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pcie_id: PciEndpoint,
    #[serde(default)]
    pub max_luns: i32,
}

impl_resource!(ScsiController, ResourceKind::ScsiController);

/// Target number before the engine confirms one
pub const UNASSIGNED_TARGET_NUM: i32 = -1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScsiLun {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub controller_name_ref: String,
    pub volume_name_ref: String,
    /// Requested target number, negative lets the engine pick the first free one
    #[serde(default = "unassigned_target_num")]
    pub target_num: i32,
}

fn unassigned_target_num() -> i32 {
    UNASSIGNED_TARGET_NUM
}

impl_resource!(ScsiLun, ResourceKind::ScsiLun, |updated, stored| {
    pinned(
        &mut updated.controller_name_ref,
        &stored.controller_name_ref,
        "controllerNameRef",
    )?;
    pinned(&mut updated.volume_name_ref, &stored.volume_name_ref, "volumeNameRef")?;
    fixed(&updated.target_num, &stored.target_num, "targetNum")
});

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    pub read_bytes_count: i64,
    pub read_ops_count: i64,
    pub write_bytes_count: i64,
    pub write_ops_count: i64,
    pub read_latency_ticks: i64,
    pub write_latency_ticks: i64,
}

impl VolumeStats {
    /// Canned response for families without real counters
    pub fn unavailable() -> Self {
        Self {
            read_bytes_count: -1,
            read_ops_count: -1,
            write_bytes_count: -1,
            write_ops_count: -1,
            read_latency_ticks: -1,
            write_latency_ticks: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub name: String,
    pub stats: VolumeStats,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Parent name for nested kinds, empty for root kinds
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub page_token: String,
}

impl ListRequest {
    pub fn new(parent: impl Into<String>, page_size: i32) -> Self {
        Self {
            parent: parent.into(),
            page_size,
            page_token: String::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = token.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    /// Empty when there are no further pages
    pub next_page_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest<T> {
    pub resource: T,
    #[serde(default)]
    pub update_mask: Option<FieldMask>,
    #[serde(default)]
    pub allow_missing: bool,
}

impl<T> UpdateRequest<T> {
    pub fn new(resource: T) -> Self {
        Self {
            resource,
            update_mask: None,
            allow_missing: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub name: String,
    #[serde(default)]
    pub allow_missing: bool,
}

impl DeleteRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_missing: false,
        }
    }

    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_family_wire_form() {
        assert_eq!(serde_json::to_string(&AddressFamily::Ipv4).unwrap(), "\"IPv4\"");
        let parsed: AddressFamily = serde_json::from_str("\"ipv6\"").unwrap();
        assert_eq!(parsed, AddressFamily::Ipv6);
    }

    #[test]
    fn test_controller_defaults_to_sentinel_id() {
        let ctrl: NvmeController =
            serde_json::from_str(r#"{"spec":{"trtype":"pcie"}}"#).unwrap();
        assert_eq!(ctrl.spec.nvme_controller_id, UNASSIGNED_CONTROLLER_ID);
        assert_eq!(ctrl.spec.trtype, NvmeTransportType::Pcie);
        assert!(ctrl.spec.endpoint.is_none());
    }

    #[test]
    fn test_unavailable_stats() {
        let stats = VolumeStats::unavailable();
        assert_eq!(stats.read_ops_count, -1);
        assert_eq!(stats.write_ops_count, -1);
    }

    #[test]
    fn test_lun_identity_is_pinned() {
        let stored = ScsiLun {
            name: "//storage.bridge.dev/scsiLuns/lun0".into(),
            controller_name_ref: "//storage.bridge.dev/scsiControllers/scsi0".into(),
            volume_name_ref: "Malloc0".into(),
            target_num: 0,
        };

        let mut unset = stored.clone();
        unset.controller_name_ref.clear();
        unset.volume_name_ref.clear();
        assert_eq!(unset.pin_identity(&stored), Ok(()));
        assert_eq!(unset, stored);

        let mut moved = stored.clone();
        moved.target_num = 1;
        assert_eq!(moved.pin_identity(&stored), Err("targetNum"));

        let mut swapped = stored.clone();
        swapped.volume_name_ref = "Malloc1".into();
        assert_eq!(swapped.pin_identity(&stored), Err("volumeNameRef"));
    }
}
