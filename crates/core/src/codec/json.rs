//! Structured-markup adapter: JSON documents via serde_json.
//! Field order is preserved on parse, so the canonical form keeps the
//! author's ordering and new fields append at the end.

use serde_json::Value;

use crate::codec::Encoding;
use crate::error::{ParseError, WriteError};
use crate::resource::Resource;

pub fn parse(text: &str) -> Result<Resource, ParseError> {
    let body: Value = serde_json::from_str(text)?;
    Resource::from_body(body, Encoding::Json)
}

pub fn serialize(resource: &Resource) -> Result<String, WriteError> {
    let mut out = serde_json::to_string_pretty(resource.body())?;
    out.push('\n');
    Ok(out)
}
