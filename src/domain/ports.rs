//! Domain Ports - trait boundaries between the resource manager and the outside
//!
//! The resource manager talks to the engine only through [`EngineClient`],
//! asks a transport strategy for engine parameters, and delegates QoS to a
//! [`QosProvider`]. Adapters implement these traits.

use crate::domain::model::{NvmeController, NvmeSubsystem, QosLimits, ScsiController, VirtioBlk};
use crate::engine::protocol::{
    CreateBlkControllerParams, CreateScsiControllerParams, DeleteControllerParams, ListenerParams,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// Engine Client Port
// =============================================================================

/// The engine's `Call` contract.
///
/// One call writes one request and reads exactly one matching response.
/// Implementations never retry.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Issue `method` with optional `params`, returning the raw `result`
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value>;
}

// =============================================================================
// Transport Strategy Ports
// =============================================================================

/// Builds listener parameters for one class of NVMe controller
pub trait NvmeTransport: Send + Sync {
    /// Short label used in logs
    fn label(&self) -> &'static str;

    /// Parameters for `nvmf_subsystem_add_listener`
    fn create_params(
        &self,
        controller: &NvmeController,
        subsystem: &NvmeSubsystem,
    ) -> Result<ListenerParams>;

    /// Parameters for `nvmf_subsystem_remove_listener`
    fn delete_params(
        &self,
        controller: &NvmeController,
        subsystem: &NvmeSubsystem,
    ) -> Result<ListenerParams> {
        self.create_params(controller, subsystem)
    }
}

/// Builds create/delete parameters for virtio devices on a local PCI function
pub trait VirtioTransport: Send + Sync {
    fn label(&self) -> &'static str;

    fn blk_create_params(&self, id: &str, device: &VirtioBlk) -> Result<CreateBlkControllerParams>;

    fn scsi_create_params(
        &self,
        id: &str,
        controller: &ScsiController,
    ) -> Result<CreateScsiControllerParams>;

    fn delete_params(&self, id: &str) -> Result<DeleteControllerParams>;
}

// =============================================================================
// QoS Port
// =============================================================================

/// Middle-end QoS collaborator
#[async_trait]
pub trait QosProvider: Send + Sync {
    /// Apply limits to a backing volume
    async fn apply_limits(&self, volume: &str, limits: &QosLimits) -> Result<()>;

    /// Remove every limit from a backing volume
    async fn clear_limits(&self, volume: &str) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type EngineClientRef = Arc<dyn EngineClient>;
pub type NvmeTransportRef = Arc<dyn NvmeTransport>;
pub type VirtioTransportRef = Arc<dyn VirtioTransport>;
pub type QosProviderRef = Arc<dyn QosProvider>;
