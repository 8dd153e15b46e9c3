//! Bridge Configuration
//!
//! One YAML document, every field optional:
//!
//! ```yaml
//! engine:
//!   address: /var/tmp/spdk.sock
//!   maxResponseBytes: 16777216
//! transport:
//!   tcp:
//!     listenAddr: 127.0.0.1
//!     listenPort: "4420"
//!     adrfam: IPv4
//!   vfioUser:
//!     ctrlrDir: /var/tmp
//! api:
//!   restAddr: 0.0.0.0:8090
//! ```

use crate::domain::model::AddressFamily;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_ENGINE_ADDRESS: &str = "/var/tmp/spdk.sock";
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Top Level
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    pub engine: EngineConfig,
    pub transport: TransportConfig,
    pub api: ApiConfig,
}

impl BridgeConfig {
    /// Read and parse a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document is a valid all-defaults config
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: BridgeConfig = serde_yaml::from_str(raw)
            .map_err(|e| Error::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.address.trim().is_empty() {
            return Err(Error::Configuration("engine.address is empty".into()));
        }
        if self.engine.max_response_bytes == 0 {
            return Err(Error::Configuration("engine.maxResponseBytes must be positive".into()));
        }
        self.api.socket_addr()?;
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// How to reach the storage engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Unix socket path or `host:port`
    pub address: String,
    /// Responses larger than this are rejected
    pub max_response_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ENGINE_ADDRESS.to_string(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

// =============================================================================
// Transports
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    pub tcp: FabricsListenConfig,
    pub vfio_user: VfioUserConfig,
}

/// Listener used when a fabric controller carries no endpoint of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricsListenConfig {
    pub listen_addr: String,
    pub listen_port: String,
    pub adrfam: AddressFamily,
}

impl Default for FabricsListenConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: "4420".to_string(),
            adrfam: AddressFamily::Ipv4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VfioUserConfig {
    /// Base directory holding one socket directory per controller
    pub ctrlr_dir: String,
}

impl Default for VfioUserConfig {
    fn default() -> Self {
        Self {
            ctrlr_dir: "/var/tmp".to_string(),
        }
    }
}

// =============================================================================
// API
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// REST API bind address
    pub rest_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_addr: "0.0.0.0:8090".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.rest_addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid REST API address: {}", e)))
    }
}
