//! Package descriptor (`ig.json`) parsing and tree layout.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ConfigError;
use crate::identity;

/// Authority prefix whose canonical URLs are never rewritten, unless the
/// descriptor overrides it with an `exemptAuthority` field.
pub const DEFAULT_EXEMPT_AUTHORITY: &str = "http://hl7.org.au";

/// Read-only per-run configuration, parsed once from the package root.
/// Also carries the descriptor tree so the side index can be written back
/// into its `resources` section at the end of the run.
#[derive(Debug)]
pub struct PackageConfig {
    root: PathBuf,
    descriptor: Value,
    pub canonical_base: String,
    pub exempt_authority: String,
    pub name_prefix: String,
}

impl PackageConfig {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join("ig.json");
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let descriptor: Value =
            serde_json::from_str(&text).map_err(|e| ConfigError::Malformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;

        let canonical_base = descriptor
            .get("canonicalBase")
            .and_then(Value::as_str)
            .filter(|base| !base.is_empty())
            .ok_or_else(|| ConfigError::MissingCanonicalBase {
                path: path.display().to_string(),
            })?
            .to_string();
        let exempt_authority = descriptor
            .get("exemptAuthority")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_EXEMPT_AUTHORITY)
            .to_string();
        let name_prefix = identity::name_prefix(&canonical_base);

        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
            canonical_base,
            exempt_authority,
            name_prefix,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join("resources")
    }

    /// e.g. `IG/pages/_includes`, where companion narrative stubs live.
    pub fn includes_dir(&self) -> PathBuf {
        self.root.join("pages").join("_includes")
    }

    pub fn guide_path(&self) -> PathBuf {
        self.resources_dir().join("ig.xml")
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join("ig.json")
    }

    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    /// Replace the descriptor's `resources` section wholesale; the side
    /// index owns that section.
    pub fn set_resources_section(&mut self, section: Value) {
        match self.descriptor {
            Value::Object(ref mut map) => {
                map.insert("resources".to_string(), section);
            }
            _ => {
                // `load` only accepts object descriptors; nothing to do.
            }
        }
    }
}
