//! Storage Engine Adapter
//!
//! Everything that speaks the engine's JSON-RPC dialect:
//! - `client`: the correlation-checked call/response client
//! - `protocol`: envelopes, method names, parameter and result shapes
//! - `qos`: QoS limits applied through the engine

pub mod client;
pub mod protocol;
pub mod qos;

#[cfg(test)]
pub(crate) mod simulated;

pub use client::{EngineAddress, JsonRpcClient};
pub use qos::EngineQos;

use crate::domain::ports::EngineClient;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Call `method` with typed params and decode the typed result
pub async fn invoke<P, R>(engine: &dyn EngineClient, method: &str, params: &P) -> Result<R>
where
    P: Serialize + Sync + ?Sized,
    R: DeserializeOwned,
{
    let params = serde_json::to_value(params)?;
    let result = engine.call(method, Some(params)).await?;
    decode(method, result)
}

/// Call a method that takes no params
pub async fn invoke_bare<R>(engine: &dyn EngineClient, method: &str) -> Result<R>
where
    R: DeserializeOwned,
{
    let result = engine.call(method, None).await?;
    decode(method, result)
}

fn decode<R: DeserializeOwned>(method: &str, result: Value) -> Result<R> {
    serde_json::from_value(result)
        .map_err(|e| Error::Transport(format!("malformed {} result: {}", method, e)))
}
