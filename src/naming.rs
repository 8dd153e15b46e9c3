//! Resource Naming
//!
//! Pure functions mapping between hierarchical resource names and the
//! identifiers the engine understands.
//!
//! ```text
//! //storage.bridge.dev/subsystems/{id}
//! //storage.bridge.dev/subsystems/{id}/controllers/{id}
//! //storage.bridge.dev/subsystems/{id}/namespaces/{id}
//! //storage.bridge.dev/virtioBlks/{id}
//! //storage.bridge.dev/scsiControllers/{id}
//! //storage.bridge.dev/scsiControllers/{id}/scsiLuns/{id}
//! ```

use serde::{Deserialize, Serialize};

/// Fixed authority every resource name is rooted at
pub const AUTHORITY: &str = "//storage.bridge.dev";

pub const SUBSYSTEMS: &str = "subsystems";
pub const CONTROLLERS: &str = "controllers";
pub const NAMESPACES: &str = "namespaces";
pub const VIRTIO_BLKS: &str = "virtioBlks";
pub const SCSI_CONTROLLERS: &str = "scsiControllers";
pub const SCSI_LUNS: &str = "scsiLuns";

// =============================================================================
// Resource Kind
// =============================================================================

/// Kinds of resources managed by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Subsystem,
    Controller,
    Namespace,
    VirtioBlk,
    ScsiController,
    ScsiLun,
}

impl ResourceKind {
    /// Collection segment this kind lives under
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Subsystem => SUBSYSTEMS,
            ResourceKind::Controller => CONTROLLERS,
            ResourceKind::Namespace => NAMESPACES,
            ResourceKind::VirtioBlk => VIRTIO_BLKS,
            ResourceKind::ScsiController => SCSI_CONTROLLERS,
            ResourceKind::ScsiLun => SCSI_LUNS,
        }
    }

    /// Kind of the parent resource, if this kind is nested
    pub fn parent(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::Controller | ResourceKind::Namespace => Some(ResourceKind::Subsystem),
            ResourceKind::ScsiLun => Some(ResourceKind::ScsiController),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Subsystem => write!(f, "subsystem"),
            ResourceKind::Controller => write!(f, "controller"),
            ResourceKind::Namespace => write!(f, "namespace"),
            ResourceKind::VirtioBlk => write!(f, "virtio-blk"),
            ResourceKind::ScsiController => write!(f, "scsi-controller"),
            ResourceKind::ScsiLun => write!(f, "scsi-lun"),
        }
    }
}

// =============================================================================
// Compose / Decompose
// =============================================================================

/// Build the full name of a resource.
///
/// `parent_id` is ignored for root-level kinds.
pub fn compose_name(kind: ResourceKind, parent_id: &str, own_id: &str) -> String {
    match kind.parent() {
        Some(parent) => format!(
            "{}/{}/{}/{}/{}",
            AUTHORITY,
            parent.collection(),
            parent_id,
            kind.collection(),
            own_id
        ),
        None => format!("{}/{}/{}", AUTHORITY, kind.collection(), own_id),
    }
}

/// Id of the subsystem a name belongs to, or empty if the name has none
pub fn parent_id(name: &str) -> String {
    parent_id_in(name, SUBSYSTEMS)
}

/// Segment following the first `collection` segment, or empty
pub fn parent_id_in(name: &str, collection: &str) -> String {
    let mut segments = name.split('/');
    while let Some(segment) = segments.next() {
        if segment == collection {
            return segments.next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

/// Last path segment of a name
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Full name of the parent of `name`, resolved purely from the path
pub fn parent_name(kind: ResourceKind, name: &str) -> Option<String> {
    let parent = kind.parent()?;
    let id = parent_id_in(name, parent.collection());
    if id.is_empty() {
        None
    } else {
        Some(compose_name(parent, "", &id))
    }
}

/// Parse a full name back to its kind
pub fn kind_of(name: &str) -> Option<ResourceKind> {
    let rest = name.strip_prefix(AUTHORITY)?.strip_prefix('/')?;
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    match segments.as_slice() {
        [SUBSYSTEMS, _] => Some(ResourceKind::Subsystem),
        [SUBSYSTEMS, _, CONTROLLERS, _] => Some(ResourceKind::Controller),
        [SUBSYSTEMS, _, NAMESPACES, _] => Some(ResourceKind::Namespace),
        [VIRTIO_BLKS, _] => Some(ResourceKind::VirtioBlk),
        [SCSI_CONTROLLERS, _] => Some(ResourceKind::ScsiController),
        [SCSI_CONTROLLERS, _, SCSI_LUNS, _] => Some(ResourceKind::ScsiLun),
        _ => None,
    }
}
