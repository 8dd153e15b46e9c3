//! JSON-RPC Engine Client
//!
//! Turns one byte stream (Unix socket or TCP) into a call/response
//! abstraction. A call holds the stream for its whole write+read pair, so
//! concurrent callers never interleave on the wire.
//!
//! ```text
//!   caller ──► lock ──► id = next ──► write {"jsonrpc","id","method","params"}
//!                                    read  {"id","error","result"}
//!                                    id matches? error code 0? ──► result
//! ```

use crate::config::EngineConfig;
use crate::domain::ports::EngineClient;
use crate::engine::protocol::{RpcRequest, RpcResponse, JSONRPC_VERSION};
use crate::error::{Error, Result};
use crate::metrics;
use async_trait::async_trait;
use bytes::BytesMut;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

// =============================================================================
// Engine Address
// =============================================================================

/// Where the engine listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl EngineAddress {
    /// Parse `unix:<path>`, `tcp:<host:port>`, a bare path, or a bare `host:port`
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Configuration("engine address is empty".into()));
        }

        if let Some(path) = address.strip_prefix("unix:") {
            return Ok(EngineAddress::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = address.strip_prefix("tcp:") {
            return Ok(EngineAddress::Tcp(addr.to_string()));
        }
        if address.starts_with('/') || address.starts_with('.') || !address.contains(':') {
            return Ok(EngineAddress::Unix(PathBuf::from(address)));
        }
        Ok(EngineAddress::Tcp(address.to_string()))
    }
}

impl std::fmt::Display for EngineAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            EngineAddress::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

// =============================================================================
// Stream
// =============================================================================

trait EngineStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> EngineStream for T {}

type BoxedStream = Box<dyn EngineStream>;

// =============================================================================
// Client
// =============================================================================

/// Engine client over a single stream
pub struct JsonRpcClient {
    /// `None` for clients built around an existing stream
    address: Option<EngineAddress>,
    next_id: AtomicU64,
    stream: Mutex<Option<BoxedStream>>,
    max_response_bytes: usize,
}

impl JsonRpcClient {
    /// Create a client that connects lazily on first call
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let address = EngineAddress::parse(&config.address)?;
        debug!("Engine client configured for {}", address);

        Ok(Self {
            address: Some(address),
            next_id: AtomicU64::new(0),
            stream: Mutex::new(None),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Wrap an already-connected stream. Once it fails the client stays closed.
    pub fn from_stream<S>(stream: S, max_response_bytes: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            address: None,
            next_id: AtomicU64::new(0),
            stream: Mutex::new(Some(Box::new(stream))),
            max_response_bytes,
        }
    }

    /// Correlation id the next call will use
    pub fn peek_next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) + 1
    }

    async fn connect(&self) -> Result<BoxedStream> {
        let address = self
            .address
            .as_ref()
            .ok_or_else(|| Error::Transport("connection to engine is closed".into()))?;

        let stream: BoxedStream = match address {
            EngineAddress::Unix(path) => Box::new(
                tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|e| Error::Transport(format!("connect {}: {}", address, e)))?,
            ),
            EngineAddress::Tcp(addr) => Box::new(
                tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| Error::Transport(format!("connect {}: {}", address, e)))?,
            ),
        };

        debug!("Connected to engine at {}", address);
        Ok(stream)
    }

    async fn exchange(
        &self,
        stream: &mut BoxedStream,
        id: u64,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };
        let mut payload = serde_json::to_vec(&request)?;
        payload.push(b'\n');

        trace!("Engine request {}", String::from_utf8_lossy(&payload).trim_end());

        stream
            .write_all(&payload)
            .await
            .map_err(|e| Error::Transport(format!("sending {}: {}", method, e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("sending {}: {}", method, e)))?;

        let response = read_response(stream, self.max_response_bytes).await?;

        if response.id != id {
            return Err(Error::Protocol {
                expected: id,
                received: response.id,
            });
        }

        if let Some(error) = response.error {
            if error.code != 0 {
                return Err(Error::Engine {
                    code: error.code,
                    message: error.message,
                });
            }
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}

/// Read exactly one response envelope, however it is split across reads
async fn read_response(stream: &mut BoxedStream, max_bytes: usize) -> Result<RpcResponse> {
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let read = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| Error::Transport(format!("reading response: {}", e)))?;
        if read == 0 {
            return Err(Error::Transport(
                "engine closed the connection before a complete response".into(),
            ));
        }
        if buf.len() > max_bytes {
            return Err(Error::Transport(format!(
                "response exceeds {} bytes",
                max_bytes
            )));
        }

        let mut values = serde_json::Deserializer::from_slice(&buf).into_iter::<RpcResponse>();
        match values.next() {
            Some(Ok(response)) => return Ok(response),
            Some(Err(e)) if e.is_eof() => continue,
            Some(Err(e)) => {
                return Err(Error::Transport(format!("malformed response: {}", e)));
            }
            None => continue,
        }
    }
}

#[async_trait]
impl EngineClient for JsonRpcClient {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut guard = self.stream.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::engine().calls.with_label_values(&[method]).inc();

        if guard.is_none() {
            match self.connect().await {
                Ok(stream) => *guard = Some(stream),
                Err(e) => {
                    metrics::engine()
                        .failures
                        .with_label_values(&[method, "transport"])
                        .inc();
                    return Err(e);
                }
            }
        }
        let stream = guard
            .as_mut()
            .ok_or_else(|| Error::Internal("engine stream missing after connect".into()))?;

        debug!("Engine call {} id={}", method, id);
        let outcome = self.exchange(stream, id, method, params).await;

        match &outcome {
            Err(Error::Transport(reason)) => {
                warn!("Engine call {} id={} failed: {}", method, id, reason);
                // The stream may hold a partial response; never read from it again
                *guard = None;
                metrics::engine()
                    .failures
                    .with_label_values(&[method, "transport"])
                    .inc();
            }
            Err(Error::Protocol { received, .. }) => {
                warn!(
                    "Engine call {} id={} got response for id={}, dropping connection",
                    method, id, received
                );
                *guard = None;
                metrics::engine()
                    .failures
                    .with_label_values(&[method, "protocol"])
                    .inc();
            }
            Err(Error::Engine { code, message }) => {
                debug!("Engine declined {} id={}: {} {}", method, id, code, message);
                metrics::engine()
                    .failures
                    .with_label_values(&[method, "engine"])
                    .inc();
            }
            _ => {}
        }

        outcome
    }
}
