//! Storage Bridge - Storage Control Plane Translator
//!
//! Exposes NVMe-oF and virtio storage resources as named, cacheable records
//! and drives a storage engine over JSON-RPC to realize them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     REST API (axum)                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                   Resource Manager                           │
//! │  subsystems │ controllers │ namespaces │ virtio-blk │ SCSI   │
//! │        per-family caches + pagination cursors                │
//! ├──────────────────────────┬───────────────────────────────────┤
//! │  Transport strategies    │  QoS provider                     │
//! │  tcp │ rdma │ vfio-user  │                                   │
//! │  vhost-user              │                                   │
//! ├──────────────────────────┴───────────────────────────────────┤
//! │            JSON-RPC engine client (unix / tcp)               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: resource manager and REST API
//! - [`engine`]: JSON-RPC client and engine protocol
//! - [`transport`]: per-transport parameter builders
//! - [`naming`]: resource name composition and parsing
//! - [`pagination`]: list cursor store
//! - [`config`]: YAML configuration
//! - [`domain`]: resource records and ports
//! - [`error`]: error types and handling

pub mod config;
pub mod controlplane;
pub mod domain;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod naming;
pub mod pagination;
pub mod transport;

// Re-export commonly used types
pub use config::{ApiConfig, BridgeConfig, EngineConfig, TransportConfig};

pub use controlplane::{ApiServer, ApiServerConfig, ResourceManager, RestRouter};

pub use domain::model::{
    DeleteRequest, ListRequest, ListResponse, NvmeController, NvmeNamespace, NvmeSubsystem,
    NvmeTransportType, ScsiController, ScsiLun, StatsResponse, UpdateRequest, VirtioBlk,
    VolumeStats,
};
pub use domain::ports::{
    EngineClient, EngineClientRef, NvmeTransport, QosProvider, VirtioTransport,
};
pub use domain::FieldMask;

pub use engine::{EngineAddress, EngineQos, JsonRpcClient};

pub use error::{Error, ErrorCode, Result};

pub use naming::ResourceKind;
pub use pagination::CursorStore;
pub use transport::TransportRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
