//! NVMe over fabrics (TCP, RDMA)

use crate::config::FabricsListenConfig;
use crate::domain::model::{ControllerEndpoint, NvmeController, NvmeSubsystem, NvmeTransportType};
use crate::domain::ports::NvmeTransport;
use crate::engine::protocol::{ListenAddress, ListenerParams};
use crate::error::{Error, Result};

/// Listener strategy for network fabrics
#[derive(Debug, Clone)]
pub struct FabricsTransport {
    trtype: NvmeTransportType,
    defaults: FabricsListenConfig,
}

impl FabricsTransport {
    /// `defaults` is the listener used when a controller has no endpoint
    pub fn new(trtype: NvmeTransportType, defaults: FabricsListenConfig) -> Self {
        Self { trtype, defaults }
    }

    fn listen_address(&self, controller: &NvmeController) -> Result<ListenAddress> {
        let (traddr, trsvcid, adrfam) = match &controller.spec.endpoint {
            Some(ControllerEndpoint::Fabrics(endpoint)) => (
                endpoint.traddr.clone(),
                endpoint.trsvcid.clone(),
                endpoint.adrfam,
            ),
            Some(ControllerEndpoint::Pcie(_)) => {
                return Err(Error::invalid(format!(
                    "controller {} has a PCIe endpoint but uses {} transport",
                    controller.name, self.trtype
                )))
            }
            None => (
                self.defaults.listen_addr.clone(),
                self.defaults.listen_port.clone(),
                self.defaults.adrfam,
            ),
        };

        if traddr.is_empty() || trsvcid.is_empty() {
            return Err(Error::invalid(format!(
                "controller {} needs a transport address and service id",
                controller.name
            )));
        }

        Ok(ListenAddress {
            trtype: self.trtype.to_string(),
            traddr,
            trsvcid,
            adrfam: adrfam.to_string(),
        })
    }
}

impl NvmeTransport for FabricsTransport {
    fn label(&self) -> &'static str {
        match self.trtype {
            NvmeTransportType::Rdma => "rdma",
            _ => "tcp",
        }
    }

    fn create_params(
        &self,
        controller: &NvmeController,
        subsystem: &NvmeSubsystem,
    ) -> Result<ListenerParams> {
        Ok(ListenerParams {
            nqn: subsystem.spec.nqn.clone(),
            listen_address: self.listen_address(controller)?,
            secure_channel: subsystem.spec.psk.as_ref().map(|_| true),
        })
    }
}
