//! Identity repair: canonical URL, display name, and publisher fields.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::PackageConfig;
use crate::error::RepairError;
use crate::resource::{Resource, ResourceType};

/// The identifier pattern a display name must satisfy.
const NAME_PATTERN: &str = "^[A-Z][A-Za-z0-9_]{0,254}$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("literal pattern compiles"))
}

pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Derive the name prefix from the canonical base: last path segment,
/// leading `segment-` stripped, first letter upper-cased.
/// `http://example.org/fhir/au-core` becomes `Core`.
pub fn name_prefix(canonical_base: &str) -> String {
    let segment = canonical_base
        .rsplit('/')
        .next()
        .unwrap_or(canonical_base);
    let stripped = match segment.find('-') {
        Some(pos) => &segment[pos + 1..],
        None => segment,
    };
    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Regenerate a display name from the resource id: a leading
/// `searchparameter-` token maps to `_sp_`, remaining hyphens to
/// underscores.
pub fn regenerate_name(prefix: &str, id: &str) -> String {
    let id = match id.strip_prefix("searchparameter-") {
        Some(rest) => format!("_sp_{}", rest),
        None => id.to_string(),
    };
    format!("{}_{}", prefix, id.replace('-', "_"))
}

/// Repair the identity fields of one resource in place. Applies to
/// conformance-capable types only; the guide itself is exempt.
pub fn repair_identity(
    resource: &mut Resource,
    cfg: &PackageConfig,
    guide_publisher: Option<&str>,
) -> Result<(), RepairError> {
    if !resource.res_type().is_conformance()
        || *resource.res_type() == ResourceType::ImplementationGuide
    {
        return Ok(());
    }
    let id = resource.id().ok_or(RepairError::MissingId)?.to_string();

    // The exemption guards only the URL rewrite; name and publisher are
    // still repaired for exempt-authority resources.
    let exempt = resource
        .url()
        .is_some_and(|url| url.starts_with(&cfg.exempt_authority));
    if !exempt {
        let canonical = format!("{}/{}/{}", cfg.canonical_base, resource.type_name(), id);
        if resource.url() != Some(canonical.as_str()) {
            resource.set_str("url", &canonical);
        }
    }

    if !resource.name().is_some_and(is_valid_name) {
        let name = regenerate_name(&cfg.name_prefix, &id);
        if !is_valid_name(&name) {
            tracing::warn!("regenerated name is still invalid: {}", name);
        }
        resource.set_str("name", &name);
    }

    if resource.publisher() != guide_publisher {
        match guide_publisher {
            Some(publisher) => resource.set_str("publisher", publisher),
            None => {
                resource.remove_field("publisher");
            }
        }
    }
    Ok(())
}
