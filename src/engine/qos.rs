//! QoS through the engine
//!
//! Applies per-volume rate limits with `bdev_set_qos_limit`. Clearing sets
//! every limit back to zero, which the engine treats as unlimited.

use crate::domain::model::QosLimits;
use crate::domain::ports::{EngineClientRef, QosProvider};
use crate::engine::invoke;
use crate::engine::protocol::{method, QosLimitParams};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::info;

/// QoS provider backed by the engine's bdev layer
pub struct EngineQos {
    engine: EngineClientRef,
}

impl EngineQos {
    pub fn new(engine: EngineClientRef) -> Self {
        Self { engine }
    }

    async fn set(&self, params: QosLimitParams) -> Result<()> {
        let volume = params.name.clone();
        let applied: bool =
            invoke(self.engine.as_ref(), method::BDEV_SET_QOS_LIMIT, &params).await?;
        if !applied {
            return Err(Error::invalid(format!(
                "Could not set QoS limits on volume: {}",
                volume
            )));
        }
        Ok(())
    }
}

fn check_limits(volume: &str, limits: &QosLimits) -> Result<()> {
    let fields = [
        ("rwIopsKiops", limits.rw_iops_kiops),
        ("rwBandwidthMbs", limits.rw_bandwidth_mbs),
        ("rdBandwidthMbs", limits.rd_bandwidth_mbs),
        ("wrBandwidthMbs", limits.wr_bandwidth_mbs),
    ];
    for (field, value) in fields {
        if value < 0 {
            return Err(Error::invalid(format!(
                "negative QoS limit {} for volume {}: {}",
                field, volume, value
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl QosProvider for EngineQos {
    async fn apply_limits(&self, volume: &str, limits: &QosLimits) -> Result<()> {
        check_limits(volume, limits)?;
        info!("Applying QoS limits to volume {}: {:?}", volume, limits);

        self.set(QosLimitParams {
            name: volume.to_string(),
            rw_ios_per_sec: limits.rw_iops_kiops * 1000,
            rw_mbytes_per_sec: limits.rw_bandwidth_mbs,
            r_mbytes_per_sec: limits.rd_bandwidth_mbs,
            w_mbytes_per_sec: limits.wr_bandwidth_mbs,
        })
        .await
    }

    async fn clear_limits(&self, volume: &str) -> Result<()> {
        info!("Clearing QoS limits on volume {}", volume);
        self.set(QosLimitParams {
            name: volume.to_string(),
            ..Default::default()
        })
        .await
    }
}
