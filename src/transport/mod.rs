//! Transport Strategies
//!
//! Each strategy turns a resource record into the engine parameters that
//! attach or detach it:
//! - `fabrics`: NVMe over TCP or RDMA listeners
//! - `vfiouser`: NVMe emulated on a local PCIe function via vfio-user
//! - `vhost`: virtio-blk and virtio-scsi devices over vhost-user

pub mod fabrics;
pub mod vfiouser;
pub mod vhost;

pub use fabrics::FabricsTransport;
pub use vfiouser::VfioUserTransport;
pub use vhost::VhostUserTransport;

use crate::config::TransportConfig;
use crate::domain::model::{NvmeTransportType, PciEndpoint};
use crate::domain::ports::{NvmeTransportRef, VirtioTransportRef};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// Factory
// =============================================================================

/// Factory for transport strategies
pub struct TransportFactory;

impl TransportFactory {
    /// Create the NVMe strategy for a transport kind
    pub fn nvme(kind: NvmeTransportType, config: &TransportConfig) -> NvmeTransportRef {
        match kind {
            NvmeTransportType::Tcp | NvmeTransportType::Rdma => {
                Arc::new(FabricsTransport::new(kind, config.tcp.clone()))
            }
            NvmeTransportType::Pcie => Arc::new(VfioUserTransport::new(config.vfio_user.clone())),
        }
    }

    /// The virtio strategy
    pub fn virtio() -> VirtioTransportRef {
        Arc::new(VhostUserTransport)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Strategies available to the resource manager, fixed at construction
pub struct TransportRegistry {
    nvme: HashMap<NvmeTransportType, NvmeTransportRef>,
    virtio: VirtioTransportRef,
}

impl TransportRegistry {
    /// Every supported NVMe kind plus vhost-user
    pub fn new(config: &TransportConfig) -> Self {
        [
            NvmeTransportType::Tcp,
            NvmeTransportType::Rdma,
            NvmeTransportType::Pcie,
        ]
        .into_iter()
        .fold(Self::empty(TransportFactory::virtio()), |registry, kind| {
            registry.with_nvme(kind, TransportFactory::nvme(kind, config))
        })
    }

    /// No NVMe kinds; add them with [`TransportRegistry::with_nvme`]
    pub fn empty(virtio: VirtioTransportRef) -> Self {
        Self {
            nvme: HashMap::new(),
            virtio,
        }
    }

    pub fn with_nvme(mut self, kind: NvmeTransportType, transport: NvmeTransportRef) -> Self {
        self.nvme.insert(kind, transport);
        self
    }

    /// Strategy for a controller's transport kind
    pub fn nvme(&self, kind: NvmeTransportType) -> Result<&NvmeTransportRef> {
        self.nvme
            .get(&kind)
            .ok_or_else(|| Error::invalid(format!("unsupported transport type: {}", kind)))
    }

    pub fn virtio(&self) -> &VirtioTransportRef {
        &self.virtio
    }
}

/// Local-function transports only expose physical functions on port 0
pub(crate) fn check_local_function(pcie: &PciEndpoint) -> Result<()> {
    if pcie.port_id != 0 {
        return Err(Error::invalid(format!(
            "only port 0 is supported, got {}",
            pcie.port_id
        )));
    }
    if pcie.virtual_function != 0 {
        return Err(Error::invalid(format!(
            "virtual functions are not supported, got {}",
            pcie.virtual_function
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NvmeController, NvmeControllerSpec, NvmeSubsystem};
    use assert_matches::assert_matches;

    #[test]
    fn test_registry_selects_by_kind() {
        let registry = TransportRegistry::new(&TransportConfig::default());
        assert_eq!(registry.nvme(NvmeTransportType::Tcp).unwrap().label(), "tcp");
        assert_eq!(registry.nvme(NvmeTransportType::Rdma).unwrap().label(), "rdma");
        assert_eq!(registry.nvme(NvmeTransportType::Pcie).unwrap().label(), "vfiouser");
        assert_eq!(registry.virtio().label(), "vhost-user");
    }

    #[test]
    fn test_unregistered_kind_is_invalid() {
        let config = TransportConfig::default();
        let registry = TransportRegistry::empty(TransportFactory::virtio()).with_nvme(
            NvmeTransportType::Tcp,
            TransportFactory::nvme(NvmeTransportType::Tcp, &config),
        );

        assert_matches!(
            registry.nvme(NvmeTransportType::Rdma).err(),
            Some(Error::InvalidArgument(msg)) if msg.contains("RDMA")
        );

        let controller = NvmeController {
            spec: NvmeControllerSpec::default(),
            ..Default::default()
        };
        let params = registry
            .nvme(NvmeTransportType::Tcp)
            .unwrap()
            .create_params(&controller, &NvmeSubsystem::default())
            .unwrap();
        assert_eq!(params.listen_address.trsvcid, "4420");
    }

    #[test]
    fn test_local_function_checks() {
        assert!(check_local_function(&PciEndpoint::new(3)).is_ok());
        assert_matches!(
            check_local_function(&PciEndpoint { port_id: 1, ..Default::default() }),
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            check_local_function(&PciEndpoint { virtual_function: 2, ..Default::default() }),
            Err(Error::InvalidArgument(_))
        );
    }
}
