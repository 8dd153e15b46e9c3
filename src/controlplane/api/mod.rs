//! API Module
//!
//! REST surface over the resource manager, plus the server that hosts it.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
