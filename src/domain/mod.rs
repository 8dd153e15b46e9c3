//! Domain layer - resource records, port definitions, and request gates
//!
//! This module defines the traits (ports) that adapters implement, the
//! records the resource manager caches, and the validation and field-mask
//! rules applied before any engine contact.

pub mod fieldmask;
pub mod model;
pub mod ports;
pub mod validation;

pub use fieldmask::FieldMask;
pub use model::*;
pub use ports::*;
