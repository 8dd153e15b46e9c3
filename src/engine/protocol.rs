//! Engine wire protocol
//!
//! JSON-RPC 2.0 envelopes plus the parameter and result shapes of every
//! engine method the bridge issues. Field names are reproduced verbatim from
//! the engine's RPC interface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// =============================================================================
// Envelopes
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'a str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: u64,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub result: Option<Value>,
}

// =============================================================================
// Method Names
// =============================================================================

pub mod method {
    pub const SPDK_GET_VERSION: &str = "spdk_get_version";

    pub const NVMF_CREATE_SUBSYSTEM: &str = "nvmf_create_subsystem";
    pub const NVMF_DELETE_SUBSYSTEM: &str = "nvmf_delete_subsystem";
    pub const NVMF_GET_SUBSYSTEMS: &str = "nvmf_get_subsystems";
    pub const NVMF_GET_STATS: &str = "nvmf_get_stats";
    pub const NVMF_SUBSYSTEM_ADD_HOST: &str = "nvmf_subsystem_add_host";
    pub const NVMF_SUBSYSTEM_ADD_LISTENER: &str = "nvmf_subsystem_add_listener";
    pub const NVMF_SUBSYSTEM_REMOVE_LISTENER: &str = "nvmf_subsystem_remove_listener";
    pub const NVMF_SUBSYSTEM_ADD_NS: &str = "nvmf_subsystem_add_ns";
    pub const NVMF_SUBSYSTEM_REMOVE_NS: &str = "nvmf_subsystem_remove_ns";

    pub const BDEV_GET_IOSTAT: &str = "bdev_get_iostat";
    pub const BDEV_SET_QOS_LIMIT: &str = "bdev_set_qos_limit";

    pub const VHOST_CREATE_BLK_CONTROLLER: &str = "vhost_create_blk_controller";
    pub const VHOST_CREATE_SCSI_CONTROLLER: &str = "vhost_create_scsi_controller";
    pub const VHOST_DELETE_CONTROLLER: &str = "vhost_delete_controller";
    pub const VHOST_GET_CONTROLLERS: &str = "vhost_get_controllers";
    pub const VHOST_SCSI_CONTROLLER_ADD_TARGET: &str = "vhost_scsi_controller_add_target";
    pub const VHOST_SCSI_CONTROLLER_REMOVE_TARGET: &str = "vhost_scsi_controller_remove_target";
}

// =============================================================================
// Version
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionFields {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionResult {
    pub version: String,
    #[serde(default)]
    pub fields: VersionFields,
}

// =============================================================================
// NVMe-oF Subsystems
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubsystemParams {
    pub nqn: String,
    pub serial_number: String,
    pub model_number: String,
    pub allow_any_host: bool,
    pub max_namespaces: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemParams {
    pub nqn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddHostParams {
    pub nqn: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psk: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenAddress {
    pub trtype: String,
    pub traddr: String,
    #[serde(default)]
    pub trsvcid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub adrfam: String,
}

impl ListenAddress {
    /// Engines report trtype/adrfam in varying case
    pub fn same_endpoint(&self, other: &ListenAddress) -> bool {
        self.trtype.eq_ignore_ascii_case(&other.trtype)
            && self.traddr == other.traddr
            && self.trsvcid == other.trsvcid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerParams {
    pub nqn: String,
    pub listen_address: ListenAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_channel: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsid: Option<i32>,
    pub bdev_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nguid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eui64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNamespaceParams {
    pub nqn: String,
    pub namespace: NamespaceParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveNamespaceParams {
    pub nqn: String,
    pub nsid: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsystemNamespace {
    pub nsid: i32,
    #[serde(default)]
    pub bdev_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub nguid: Option<String>,
    #[serde(default)]
    pub eui64: Option<String>,
}

/// One row of `nvmf_get_subsystems`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subsystem {
    pub nqn: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub listen_addresses: Vec<ListenAddress>,
    #[serde(default)]
    pub allow_any_host: bool,
    #[serde(default)]
    pub hosts: Vec<Value>,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub max_namespaces: i64,
    #[serde(default)]
    pub namespaces: Vec<SubsystemNamespace>,
}

impl Subsystem {
    /// The discovery subsystem is engine-internal
    pub fn is_discovery(&self) -> bool {
        self.subtype.eq_ignore_ascii_case("discovery")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollGroupStats {
    pub name: String,
    #[serde(default)]
    pub admin_qpairs: i64,
    #[serde(default)]
    pub io_qpairs: i64,
    #[serde(default)]
    pub current_admin_qpairs: i64,
    #[serde(default)]
    pub current_io_qpairs: i64,
    #[serde(default)]
    pub pending_bdev_io: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NvmfStats {
    #[serde(default)]
    pub tick_rate: i64,
    #[serde(default)]
    pub poll_groups: Vec<PollGroupStats>,
}

// =============================================================================
// Block Devices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BdevNameParams {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BdevIoStat {
    pub name: String,
    #[serde(default)]
    pub bytes_read: i64,
    #[serde(default)]
    pub num_read_ops: i64,
    #[serde(default)]
    pub bytes_written: i64,
    #[serde(default)]
    pub num_write_ops: i64,
    #[serde(default)]
    pub read_latency_ticks: i64,
    #[serde(default)]
    pub write_latency_ticks: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoStatResult {
    #[serde(default)]
    pub tick_rate: i64,
    #[serde(default)]
    pub ticks: i64,
    #[serde(default)]
    pub bdevs: Vec<BdevIoStat>,
}

/// `bdev_set_qos_limit`; zero disables a limit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QosLimitParams {
    pub name: String,
    pub rw_ios_per_sec: i64,
    pub rw_mbytes_per_sec: i64,
    pub r_mbytes_per_sec: i64,
    pub w_mbytes_per_sec: i64,
}

// =============================================================================
// vhost-user Controllers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBlkControllerParams {
    pub ctrlr: String,
    pub dev_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScsiControllerParams {
    pub ctrlr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteControllerParams {
    pub ctrlr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetControllersParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddTargetParams {
    pub ctrlr: String,
    pub scsi_target_num: i32,
    pub bdev_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveTargetParams {
    pub ctrlr: String,
    pub scsi_target_num: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockBackend {
    #[serde(default)]
    pub bdev: String,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScsiLunInfo {
    pub id: i32,
    pub bdev_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScsiTargetInfo {
    pub scsi_dev_num: i32,
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub luns: Vec<ScsiLunInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSpecific {
    #[serde(default)]
    pub block: Option<BlockBackend>,
    #[serde(default)]
    pub scsi: Option<Vec<ScsiTargetInfo>>,
}

/// One row of `vhost_get_controllers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VhostController {
    pub ctrlr: String,
    #[serde(default)]
    pub cpumask: String,
    #[serde(default)]
    pub socket: String,
    #[serde(default)]
    pub backend_specific: BackendSpecific,
}
