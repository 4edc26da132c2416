//! Document codec: two format adapters converging on one in-memory record.
//! A record is always serialized back in the encoding it was parsed from,
//! so an unchanged document round-trips to byte-identical canonical text.

pub mod json;
pub mod xml;

use crate::error::{ParseError, WriteError};
use crate::resource::Resource;

/// Physical encoding of a resource file, selected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Xml,
}

impl Encoding {
    /// Map a file extension to an encoding. Anything else is not a
    /// resource document.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

pub fn parse(text: &str, encoding: Encoding) -> Result<Resource, ParseError> {
    match encoding {
        Encoding::Json => json::parse(text),
        Encoding::Xml => xml::parse(text),
    }
}

/// Canonical serialization: deterministic, pretty-printed, used both to
/// detect changes and to write files.
pub fn serialize(resource: &Resource) -> Result<String, WriteError> {
    match resource.encoding() {
        Encoding::Json => json::serialize(resource),
        Encoding::Xml => xml::serialize(resource),
    }
}
