//! Type-specific structural repairs. Every rule is idempotent: a second
//! pass over an already-repaired document is a no-op.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::RepairError;
use crate::resource::{Resource, ResourceType};

/// Apply the repair rules for the resource's type. `includes_dir` is where
/// companion narrative stub files live.
pub fn repair_structure(resource: &mut Resource, includes_dir: &Path) -> Result<(), RepairError> {
    let res_type = resource.res_type().clone();
    match res_type {
        ResourceType::StructureDefinition => repair_structure_definition(resource, includes_dir),
        ResourceType::SearchParameter => {
            let id = resource.id().ok_or(RepairError::MissingId)?.to_string();
            ensure_stubs(includes_dir, &id)
        }
        ResourceType::CodeSystem | ResourceType::ValueSet => {
            repair_terminology(resource);
            Ok(())
        }
        ResourceType::OperationDefinition
        | ResourceType::CapabilityStatement
        | ResourceType::ImplementationGuide
        | ResourceType::Other(_) => Ok(()),
    }
}

fn repair_structure_definition(
    resource: &mut Resource,
    includes_dir: &Path,
) -> Result<(), RepairError> {
    let id = resource.id().ok_or(RepairError::MissingId)?.to_string();
    let base_type = resource
        .get_str("type")
        .ok_or(RepairError::MissingType)?
        .to_string();
    let url = resource.url().map(str::to_string);

    // The snapshot view is regenerated downstream; carrying a stale one
    // around only invites drift.
    resource.remove_field("snapshot");

    let elements = differential_elements(resource).ok_or(RepairError::MissingDifferential)?;
    if elements.is_empty() {
        return Err(RepairError::MissingDifferential);
    }

    let first_path = elements
        .first()
        .and_then(|el| el.get("path"))
        .and_then(Value::as_str);
    if first_path != Some(base_type.as_str()) {
        let mut root = Map::new();
        root.insert("id".to_string(), Value::String(base_type.clone()));
        root.insert("path".to_string(), Value::String(base_type.clone()));
        elements.insert(0, Value::Object(root));
    }

    // An extension definition fixes its own url into Extension.url; keep
    // that in sync with the canonical url.
    if let Some(url) = url {
        let fixed = elements.iter_mut().find(|el| {
            el.get("path").and_then(Value::as_str) == Some("Extension.url")
        });
        if let Some(element) = fixed {
            if let Some(Value::String(fixed_uri)) = element.get_mut("fixedUri") {
                if *fixed_uri != url {
                    tracing::info!("fixed Extension.url from {} to {}", fixed_uri, url);
                    *fixed_uri = url;
                }
            }
        }
    }

    ensure_stubs(includes_dir, &id)
}

/// The differential element list as a mutable array, promoting the
/// single-element form the tagged-text encoding produces.
fn differential_elements(resource: &mut Resource) -> Option<&mut Vec<Value>> {
    let differential = resource.body_mut().get_mut("differential")?;
    let element = differential.get_mut("element")?;
    if !element.is_array() {
        let single = element.take();
        *element = Value::Array(vec![single]);
    }
    element.as_array_mut()
}

fn repair_terminology(resource: &mut Resource) {
    let name = match resource.name() {
        Some(name) => name.to_string(),
        None => return,
    };
    if resource.get_str("title").is_none() {
        resource.set_str("title", &name);
    }
    if resource.get_str("description").is_none() {
        resource.set_str("description", &name);
    }
}

/// Create the three narrative include stubs for an id if missing; existing
/// files are never touched, so hand-authored content survives.
fn ensure_stubs(includes_dir: &Path, id: &str) -> Result<(), RepairError> {
    for suffix in ["intro", "summary", "search"] {
        let path = includes_dir.join(format!("{}-{}.md", id, suffix));
        if !path.exists() {
            std::fs::create_dir_all(includes_dir)?;
            std::fs::write(&path, "")?;
            tracing::info!("created stub {}", path.display());
        }
    }
    Ok(())
}
