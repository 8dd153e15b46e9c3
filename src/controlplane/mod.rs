//! Control Plane
//!
//! Resource families managed on the storage engine's behalf. Each family
//! keeps its own cache and talks to the engine through the shared
//! `ResourceManager`.

pub mod api;
pub mod manager;

mod controller;
mod namespace;
mod scsi;
mod subsystem;
mod virtio_blk;

pub use api::*;
pub use manager::ResourceManager;
