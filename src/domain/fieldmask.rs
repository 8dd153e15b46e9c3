//! Field-masked updates
//!
//! A mask lists dotted JSON paths (`spec.maxNsq`) that an Update may change.
//! Merging goes through `serde_json::Value`, so every resource record gets
//! the same behavior without per-type code.

use crate::domain::model::Resource;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path that selects every mutable field
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask {
    #[serde(default)]
    pub paths: Vec<String>,
}

impl FieldMask {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// True when the mask means "replace everything"
    pub fn is_full_replace(&self) -> bool {
        self.paths.is_empty() || self.paths.iter().all(|p| p == WILDCARD)
    }

    /// Check every path names a mutable field present in `resource`
    pub fn validate(&self, resource: &Value) -> Result<()> {
        if self.is_full_replace() {
            return Ok(());
        }

        for raw in &self.paths {
            if raw == WILDCARD {
                return Err(Error::invalid(
                    "field mask wildcard cannot be combined with other paths",
                ));
            }
            let path = normalize_path(raw);
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(Error::invalid(format!("malformed field mask path: {}", raw)));
            }
            if path == "name" {
                return Err(Error::invalid("field mask cannot change the resource name"));
            }
            if lookup(resource, &path).is_none() {
                return Err(Error::invalid(format!("unknown field in field mask: {}", raw)));
            }
        }

        Ok(())
    }
}

/// Convert `snake_case` segments to the camelCase used on the wire
fn normalize_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper = false;
            for c in segment.chars() {
                if c == '_' {
                    upper = true;
                } else if upper {
                    out.extend(c.to_uppercase());
                    upper = false;
                } else {
                    out.push(c);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

fn assign(target: &mut Value, path: &str, new_value: Value) {
    let mut current = target;
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), new_value);
    }
}

/// Produce the record an Update stores.
///
/// Without a mask (or with `*`) the update replaces the existing record
/// wholesale; otherwise only the masked paths are copied across. The name of
/// the existing record always wins.
pub fn merge<T: Resource>(existing: &T, update: &T, mask: Option<&FieldMask>) -> Result<T> {
    let mask = match mask {
        Some(mask) if !mask.is_full_replace() => mask,
        _ => {
            let mut replaced = update.clone();
            replaced.set_name(existing.name().to_string());
            return Ok(replaced);
        }
    };

    let source = serde_json::to_value(update)?;
    mask.validate(&source)?;

    let mut target = serde_json::to_value(existing)?;
    for raw in &mask.paths {
        let path = normalize_path(raw);
        if let Some(value) = lookup(&source, &path) {
            assign(&mut target, &path, value.clone());
        }
    }

    let mut merged: T = serde_json::from_value(target)
        .map_err(|e| Error::invalid(format!("field mask produced an invalid resource: {}", e)))?;
    merged.set_name(existing.name().to_string());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NvmeSubsystem, NvmeSubsystemSpec};
    use assert_matches::assert_matches;

    fn subsystem(name: &str, serial: &str, model: &str) -> NvmeSubsystem {
        NvmeSubsystem {
            name: name.into(),
            spec: NvmeSubsystemSpec {
                nqn: "nqn.2022-09.io.spdk:opi1".into(),
                serial_number: serial.into(),
                model_number: model.into(),
                max_namespaces: 32,
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn test_masked_merge_changes_only_listed_paths() {
        let existing = subsystem("a", "serial-1", "model-1");
        let update = subsystem("ignored", "serial-2", "model-2");

        let mask = FieldMask::new(["spec.serial_number"]);
        let merged = merge(&existing, &update, Some(&mask)).unwrap();

        assert_eq!(merged.name, "a");
        assert_eq!(merged.spec.serial_number, "serial-2");
        assert_eq!(merged.spec.model_number, "model-1");
    }

    #[test]
    fn test_full_replace_keeps_name() {
        let existing = subsystem("a", "serial-1", "model-1");
        let update = subsystem("b", "serial-2", "model-2");

        let merged = merge(&existing, &update, None).unwrap();
        assert_eq!(merged.name, "a");
        assert_eq!(merged.spec.model_number, "model-2");

        let merged = merge(&existing, &update, Some(&FieldMask::new(["*"]))).unwrap();
        assert_eq!(merged.spec.serial_number, "serial-2");
    }

    #[test]
    fn test_invalid_masks() {
        let existing = subsystem("a", "s", "m");
        let update = existing.clone();

        for paths in [vec!["spec.nope"], vec!["name"], vec!["spec..nqn"], vec!["*", "spec.nqn"]] {
            let mask = FieldMask::new(paths.clone());
            assert_matches!(
                merge(&existing, &update, Some(&mask)),
                Err(Error::InvalidArgument(_)),
                "{:?}",
                paths
            );
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("spec.max_namespaces"), "spec.maxNamespaces");
        assert_eq!(normalize_path("spec.maxNamespaces"), "spec.maxNamespaces");
    }
}
