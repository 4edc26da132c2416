//! Side-index writer: regenerates the descriptor's `resources` section,
//! mapping each conformance resource's key to its source and output file
//! names. Always rewritten; the section is derived fresh every run.

use serde_json::{json, Map, Value};

use crate::config::PackageConfig;
use crate::error::IgError;
use crate::walk::ProcessedResource;

/// Rebuild the `resources` section and rewrite the package descriptor.
pub fn write_side_index(
    cfg: &mut PackageConfig,
    resources: &[ProcessedResource],
) -> Result<(), IgError> {
    let mut section = Map::new();
    for pr in resources {
        if !pr.resource.res_type().is_conformance() {
            continue;
        }
        let Some(key) = pr.key() else { continue };
        let base = output_base_name(pr.resource.type_name(), &pr.file_name);
        section.insert(
            key,
            json!({
                "source": pr.file_name,
                "base": base
            }),
        );
    }
    cfg.set_resources_section(Value::Object(section));

    let mut text = serde_json::to_string_pretty(cfg.descriptor())
        .map_err(crate::error::WriteError::Serialize)?;
    text.push('\n');
    std::fs::write(cfg.descriptor_path(), text)?;
    tracing::info!("updated {}", cfg.descriptor_path().display());
    Ok(())
}

/// Output page name for a resource file: `{type}-{stem}.html` with the
/// duplicated type name squeezed back out of the stem.
fn output_base_name(type_name: &str, file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let mut base = format!("{}-{}.html", type_name, stem);
    base = base.replace(&type_name.to_lowercase(), "");
    base = base.replace("--", "-");
    base.replace(
        &format!("{}-{}-", type_name, type_name),
        &format!("{}-", type_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoding;
    use crate::resource::Resource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn processed(body: Value, file_name: &str) -> ProcessedResource {
        ProcessedResource {
            resource: Resource::from_body(body, Encoding::Json).unwrap(),
            file_name: file_name.to_string(),
        }
    }

    #[test]
    fn duplicated_type_prefix_is_squeezed_out() {
        assert_eq!(
            output_base_name("ValueSet", "valueset-gender.xml"),
            "ValueSet-gender.html"
        );
        assert_eq!(
            output_base_name("StructureDefinition", "epd-practitioner.xml"),
            "StructureDefinition-epd-practitioner.html"
        );
        assert_eq!(
            output_base_name("CodeSystem", "codesystem-codes.json"),
            "CodeSystem-codes.html"
        );
    }

    #[test]
    fn section_is_replaced_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ig.json"),
            r#"{"canonicalBase": "http://example.org/fhir/demo", "resources": {"Old/stale": {"source": "x", "base": "y"}}}"#,
        )
        .unwrap();
        let mut cfg = PackageConfig::load(dir.path()).unwrap();

        let vs = processed(
            json!({"resourceType": "ValueSet", "id": "vs-1"}),
            "valueset-vs-1.xml",
        );
        let example = processed(
            json!({"resourceType": "Patient", "id": "p-1"}),
            "patient-p-1.xml",
        );
        write_side_index(&mut cfg, &[vs, example]).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("ig.json")).unwrap())
                .unwrap();
        assert_eq!(
            written["resources"],
            json!({
                "ValueSet/vs-1": {
                    "source": "valueset-vs-1.xml",
                    "base": "ValueSet-vs-1.html"
                }
            })
        );
        // other descriptor fields survive
        assert_eq!(
            written["canonicalBase"],
            json!("http://example.org/fhir/demo")
        );
    }
}
