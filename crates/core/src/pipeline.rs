//! Full canonicalization pipeline: walk → reconcile manifest → side index.
//! The reconciler and side-index writer run strictly after the walk, since
//! both need the complete resource list.

use std::path::Path;

use crate::config::PackageConfig;
use crate::error::IgError;
use crate::manifest::{self, Guide};
use crate::sidecar;
use crate::walk;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RunSummary {
    pub resources_processed: usize,
    pub files_updated: usize,
    pub guide_updated: bool,
}

/// Canonicalize every resource in the package rooted at `root`.
/// Configuration failures abort before any file is touched.
pub fn canonicalize(root: &Path) -> Result<RunSummary, IgError> {
    let mut cfg = PackageConfig::load(root)?;
    let mut guide = Guide::load(&cfg.guide_path())?;

    let report = walk::process_tree(&cfg, &mut guide)?;
    let guide_updated = manifest::reconcile(&mut guide, &report.resources)?;
    sidecar::write_side_index(&mut cfg, &report.resources)?;

    Ok(RunSummary {
        resources_processed: report.resources.len(),
        files_updated: report.files_updated,
        guide_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::PathBuf;

    const GUIDE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ImplementationGuide xmlns="http://hl7.org/fhir">
	<id value="ig"/>
	<name value="DemoGuide"/>
	<publisher value="Demo Corp"/>
	<definition>
		<resource>
			<reference>
				<reference value="SearchParameter/searchparameter-patient-identifier"/>
			</reference>
			<name value="B"/>
		</resource>
	</definition>
</ImplementationGuide>
"#;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ig.json"),
            r#"{"canonicalBase": "http://example.org/fhir/au-core", "resources": {}}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("resources")).unwrap();
        std::fs::write(dir.path().join("resources").join("ig.xml"), GUIDE_XML).unwrap();
        dir
    }

    fn write_json(dir: &Path, name: &str, body: &Value) -> PathBuf {
        let path = dir.join("resources").join(name);
        std::fs::write(&path, serde_json::to_string_pretty(body).unwrap()).unwrap();
        path
    }

    #[test]
    fn full_run_repairs_reconciles_and_indexes() {
        let dir = setup();
        write_json(
            dir.path(),
            "codesystem-demo.json",
            &json!({"resourceType": "CodeSystem", "id": "cs-demo"}),
        );
        write_json(
            dir.path(),
            "searchparameter-patient-identifier.json",
            &json!({
                "resourceType": "SearchParameter",
                "id": "searchparameter-patient-identifier",
                "name": "bad name"
            }),
        );

        let summary = canonicalize(dir.path()).unwrap();
        assert_eq!(summary.resources_processed, 2);
        assert!(summary.guide_updated);

        let guide = std::fs::read_to_string(dir.path().join("resources").join("ig.xml")).unwrap();
        let cs_pos = guide.find("CodeSystem/cs-demo").unwrap();
        let sp_pos = guide
            .find("SearchParameter/searchparameter-patient-identifier")
            .unwrap();
        assert!(cs_pos < sp_pos, "code systems pack before search parameters");
        assert!(guide.contains("<name value=\"Core__sp_patient_identifier\"/>"));

        let descriptor: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("ig.json")).unwrap())
                .unwrap();
        assert!(descriptor["resources"]
            .get("CodeSystem/cs-demo")
            .is_some());

        for suffix in ["intro", "summary", "search"] {
            assert!(dir
                .path()
                .join("pages")
                .join("_includes")
                .join(format!("searchparameter-patient-identifier-{}.md", suffix))
                .exists());
        }
    }

    #[test]
    fn second_run_writes_nothing() {
        let dir = setup();
        write_json(
            dir.path(),
            "valueset-demo.json",
            &json!({"resourceType": "ValueSet", "id": "vs-demo"}),
        );

        canonicalize(dir.path()).unwrap();
        let guide_before =
            std::fs::read_to_string(dir.path().join("resources").join("ig.xml")).unwrap();
        let resource_before =
            std::fs::read_to_string(dir.path().join("resources").join("valueset-demo.json"))
                .unwrap();

        let summary = canonicalize(dir.path()).unwrap();
        assert_eq!(summary.files_updated, 0);
        assert!(!summary.guide_updated);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("resources").join("ig.xml")).unwrap(),
            guide_before
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("resources").join("valueset-demo.json"))
                .unwrap(),
            resource_before
        );
    }

    #[test]
    fn missing_guide_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ig.json"),
            r#"{"canonicalBase": "http://example.org/fhir/demo"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("resources")).unwrap();
        let path = dir.path().join("resources").join("codesystem.json");
        std::fs::write(&path, r#"{"resourceType": "CodeSystem", "id": "cs"}"#).unwrap();

        assert!(canonicalize(dir.path()).is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"resourceType": "CodeSystem", "id": "cs"}"#
        );
    }
}
