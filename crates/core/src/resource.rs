//! The unified in-memory record for conformance resources.
//! Both physical encodings parse into this shape (the JSON rendition of
//! FHIR, field order preserved), so the repair passes are encoding-agnostic.

use std::fmt;

use serde_json::{Map, Value};

use crate::codec::Encoding;
use crate::error::ParseError;

/// Fixed vocabulary of document types the pipeline dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    StructureDefinition,
    ValueSet,
    CodeSystem,
    SearchParameter,
    OperationDefinition,
    CapabilityStatement,
    ImplementationGuide,
    Other(String),
}

impl ResourceType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "StructureDefinition" => Self::StructureDefinition,
            "ValueSet" => Self::ValueSet,
            "CodeSystem" => Self::CodeSystem,
            "SearchParameter" => Self::SearchParameter,
            "OperationDefinition" => Self::OperationDefinition,
            "CapabilityStatement" => Self::CapabilityStatement,
            "ImplementationGuide" => Self::ImplementationGuide,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::StructureDefinition => "StructureDefinition",
            Self::ValueSet => "ValueSet",
            Self::CodeSystem => "CodeSystem",
            Self::SearchParameter => "SearchParameter",
            Self::OperationDefinition => "OperationDefinition",
            Self::CapabilityStatement => "CapabilityStatement",
            Self::ImplementationGuide => "ImplementationGuide",
            Self::Other(name) => name,
        }
    }

    /// Types that carry identity fields (url/name/publisher) and appear in
    /// the side index.
    pub fn is_conformance(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed document, mutated in place by the repair passes and written
/// back in the encoding it was read in.
#[derive(Debug, Clone)]
pub struct Resource {
    res_type: ResourceType,
    encoding: Encoding,
    body: Value,
}

impl Resource {
    /// Wrap a parsed tree. The root must be an object with a string
    /// `resourceType` field.
    pub fn from_body(body: Value, encoding: Encoding) -> Result<Self, ParseError> {
        let type_name = body
            .as_object()
            .ok_or(ParseError::NotAnObject)?
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingResourceType)?;
        let res_type = ResourceType::from_name(type_name);
        Ok(Self {
            res_type,
            encoding,
            body,
        })
    }

    pub fn res_type(&self) -> &ResourceType {
        &self.res_type
    }

    pub fn type_name(&self) -> &str {
        self.res_type.name()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    fn fields(&self) -> &Map<String, Value> {
        // Invariant from `from_body`: the root is always an object.
        self.body.as_object().unwrap_or(EMPTY.get_or_init(Map::new))
    }

    fn fields_mut(&mut self) -> &mut Map<String, Value> {
        if !self.body.is_object() {
            self.body = Value::Object(Map::new());
        }
        match self.body {
            Value::Object(ref mut map) => map,
            _ => unreachable!("normalized to an object above"),
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields().get(field).and_then(Value::as_str)
    }

    /// Insert or overwrite a top-level string field. New fields append at
    /// the end, keeping the canonical order stable across runs.
    pub fn set_str(&mut self, field: &str, value: &str) {
        self.fields_mut()
            .insert(field.to_string(), Value::String(value.to_string()));
    }

    /// Remove a top-level field, preserving the order of the remainder.
    pub fn remove_field(&mut self, field: &str) -> Option<Value> {
        self.fields_mut().shift_remove(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn publisher(&self) -> Option<&str> {
        self.get_str("publisher")
    }

    /// Identity key, e.g. `StructureDefinition/patient-au`.
    pub fn key(&self) -> Option<String> {
        self.id().map(|id| format!("{}/{}", self.type_name(), id))
    }
}

static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();

/// Read a boolean that may have been parsed from the tagged-text encoding,
/// where every scalar is a string.
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}
