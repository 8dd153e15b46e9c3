//! Request validation
//!
//! Field-level checks run before any core logic. They are a pass/fail gate:
//! a failure is always `Error::InvalidArgument` and no engine call follows.

use crate::error::{Error, Result};
use crate::naming::{kind_of, ResourceKind};
use regex_lite::Regex;
use std::sync::OnceLock;

/// NVMe qualified names are limited to 223 bytes
pub const MAX_NQN_LEN: usize = 223;

fn resource_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("static pattern compiles")
    })
}

/// Caller-chosen resource ids: lowercase, digits and dashes, at most 63 chars
pub fn resource_id(id: &str) -> Result<()> {
    if resource_id_pattern().is_match(id) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "user-settable ID must only contain lowercase, numbers and hyphens: {}",
            id
        )))
    }
}

/// Reject an empty required field
pub fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::invalid(format!("missing required field: {}", field)))
    } else {
        Ok(())
    }
}

/// Name must be a well-formed name of `kind`
pub fn name_of_kind(name: &str, kind: ResourceKind) -> Result<()> {
    required("name", name)?;
    match kind_of(name) {
        Some(found) if found == kind => Ok(()),
        _ => Err(Error::invalid(format!("{} is not a valid {} name", name, kind))),
    }
}

pub fn nqn(nqn: &str) -> Result<()> {
    required("spec.nqn", nqn)?;
    if !nqn.starts_with("nqn.") {
        return Err(Error::invalid(format!("NQN must start with \"nqn.\": {}", nqn)));
    }
    if nqn.len() > MAX_NQN_LEN {
        return Err(Error::invalid(format!(
            "NQN exceeds {} bytes: {}",
            MAX_NQN_LEN, nqn
        )));
    }
    Ok(())
}
