//! Manifest reconciliation: the guide's resource listing is made to match
//! what the walk actually found, then reordered by type precedence.
//! Entries referencing resources no longer on disk are deliberately kept;
//! deletions are a curation decision, not ours.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::codec::{self, Encoding};
use crate::error::{ConfigError, IgError};
use crate::resource::{value_as_bool, Resource, ResourceType};
use crate::walk::ProcessedResource;

/// Precedence groups for the packing order. Everything past the named
/// groups keeps its original relative order.
const GROUP_OTHER: usize = 7;

/// The single manifest document, with the path it is written back to.
#[derive(Debug)]
pub struct Guide {
    resource: Resource,
    path: PathBuf,
}

impl Guide {
    /// Load the guide from its well-known path. A missing or non-guide
    /// document is fatal: reconciliation cannot proceed without it.
    pub fn load(path: &Path) -> Result<Self, IgError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingGuide {
            path: path.display().to_string(),
        })?;
        let resource = codec::parse(&text, Encoding::Xml)?;
        if *resource.res_type() != ResourceType::ImplementationGuide {
            return Err(ConfigError::NotAGuide {
                path: path.display().to_string(),
            }
            .into());
        }
        Ok(Self {
            resource,
            path: path.to_path_buf(),
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn publisher(&self) -> Option<String> {
        self.resource.publisher().map(str::to_string)
    }

    /// Swap in the copy parsed during the walk.
    pub fn replace(&mut self, resource: Resource) {
        self.resource = resource;
    }

    /// The entry list as a mutable array, created on demand and promoted
    /// from the single-entry form the tagged-text encoding produces.
    fn entries_mut(&mut self) -> &mut Vec<Value> {
        let definition = object_entry(self.resource.body_mut(), "definition");
        let element = object_entry_map(definition, "resource");
        if let Value::Null = element {
            *element = Value::Array(Vec::new());
        } else if !element.is_array() {
            let single = element.take();
            *element = Value::Array(vec![single]);
        }
        match element {
            Value::Array(items) => items,
            _ => unreachable!("normalized to an array above"),
        }
    }
}

fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    object_entry_map(value, key)
}

fn object_entry_map<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
        _ => unreachable!("normalized to an object above"),
    }
}

/// Bring the guide's entry list in line with the resources found on disk
/// and re-pack it. Writes the guide back iff its canonical form changed;
/// returns whether a write happened.
pub fn reconcile(guide: &mut Guide, resources: &[ProcessedResource]) -> Result<bool, IgError> {
    let before = codec::serialize(guide.resource())?;

    let extension_ids: HashSet<String> = resources
        .iter()
        .filter(|pr| *pr.resource.res_type() == ResourceType::StructureDefinition)
        .filter(|pr| pr.resource.get_str("kind") == Some("complex-type"))
        .filter_map(|pr| pr.resource.id().map(str::to_string))
        .collect();

    let entries = guide.entries_mut();

    // Step 1: every found resource gets exactly one entry; matched entries
    // pick up the repaired display name.
    for pr in resources {
        let Some(key) = pr.key() else { continue };
        let existing = entries.iter_mut().find(|entry| {
            !entry_is_example(entry) && entry_reference(entry) == Some(key.as_str())
        });
        match existing {
            Some(entry) => {
                if pr.resource.res_type().is_conformance() {
                    set_entry_name(entry, pr.resource.name());
                }
            }
            None => {
                // Stamp the name at append time too, or the copy in the
                // matched branch would dirty the guide again on the next run.
                tracing::info!("added {} to the guide", key);
                let mut entry = json!({"reference": {"reference": key}});
                if pr.resource.res_type().is_conformance() {
                    set_entry_name(&mut entry, pr.resource.name());
                }
                entries.push(entry);
            }
        }
    }

    // Step 2: re-pack by type precedence, alphabetical within each group.
    reorder_entries(entries, &extension_ids);

    let after = codec::serialize(guide.resource())?;
    if after != before {
        std::fs::write(guide.path(), &after)?;
        tracing::info!("updated {}", guide.path().display());
        return Ok(true);
    }
    Ok(false)
}

/// Example entries are pinned to their original positions; everything else
/// is grouped and sorted around them.
fn reorder_entries(entries: &mut Vec<Value>, extension_ids: &HashSet<String>) {
    let taken = std::mem::take(entries);
    let total = taken.len();
    let mut pinned: Vec<(usize, Value)> = Vec::new();
    let mut participants: Vec<Value> = Vec::new();
    for (index, entry) in taken.into_iter().enumerate() {
        if entry_is_example(&entry) {
            pinned.push((index, entry));
        } else {
            participants.push(entry);
        }
    }

    participants.sort_by(|a, b| {
        let group_a = precedence_group(a, extension_ids);
        let group_b = precedence_group(b, extension_ids);
        match group_a.cmp(&group_b) {
            // ties in the catch-all group keep their original order
            Ordering::Equal if group_a < GROUP_OTHER => entry_name(a).cmp(entry_name(b)),
            ordering => ordering,
        }
    });

    let mut slots: Vec<Option<Value>> = std::iter::repeat_with(|| None).take(total).collect();
    for (index, entry) in pinned {
        slots[index] = Some(entry);
    }
    let mut reordered = participants.into_iter();
    for slot in slots.iter_mut() {
        if slot.is_none() {
            *slot = reordered.next();
        }
    }
    *entries = slots.into_iter().flatten().collect();
}

fn precedence_group(entry: &Value, extension_ids: &HashSet<String>) -> usize {
    let Some((res_type, id)) = entry_reference(entry).and_then(|r| r.split_once('/')) else {
        return GROUP_OTHER;
    };
    match res_type {
        "CodeSystem" => 0,
        "ValueSet" => 1,
        "StructureDefinition" if extension_ids.contains(id) => 2,
        "StructureDefinition" => 3,
        "OperationDefinition" => 4,
        "SearchParameter" => 5,
        "CapabilityStatement" => 6,
        _ => GROUP_OTHER,
    }
}

fn entry_reference(entry: &Value) -> Option<&str> {
    entry.get("reference")?.get("reference")?.as_str()
}

fn entry_name(entry: &Value) -> &str {
    entry.get("name").and_then(Value::as_str).unwrap_or("")
}

fn entry_is_example(entry: &Value) -> bool {
    if entry.get("exampleCanonical").is_some() {
        return true;
    }
    entry
        .get("exampleBoolean")
        .or_else(|| entry.get("example"))
        .and_then(value_as_bool)
        .unwrap_or(false)
}

fn set_entry_name(entry: &mut Value, name: Option<&str>) {
    if let Value::Object(map) = entry {
        match name {
            Some(name) => {
                map.insert("name".to_string(), Value::String(name.to_string()));
            }
            None => {
                map.shift_remove("name");
            }
        }
    }
}
