//! Publish-box banner substitution across a published-site directory.
//! Plain templated text replacement between HTML marker comments; the
//! version list in `package-list.json` decides which banner each version
//! folder receives.

use std::path::Path;

use serde_json::Value;
use walkdir::WalkDir;

use crate::error::ReleaseError;

const MARKERS: [(&str, &str); 2] = [
    ("<!--ReleaseHeader-->", "<!--EndReleaseHeader-->"),
    ("<!-- ReleaseHeader -->", "<!-- EndReleaseHeader -->"),
];

/// Update the publish-box banner in every published version folder, the
/// root mirror, and the CI build output.
pub fn prepare_release(root: &Path) -> Result<(), ReleaseError> {
    let descriptor_path = root.join("ig.json");
    let descriptor = read_json(&descriptor_path)?;
    let business_version = descriptor
        .get("fixed-business-version")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReleaseError::MissingBusinessVersion {
            path: descriptor_path.display().to_string(),
        })?
        .to_string();

    let list_path = root.join("package-list.json");
    let package_list = read_json(&list_path)?;
    let versions = package_list
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| ReleaseError::Malformed {
            path: list_path.display().to_string(),
            detail: "no list array".into(),
        })?;

    let mut current_version: Option<String> = None;
    for item in versions {
        let Some(version) = item.get("version").and_then(Value::as_str) else {
            continue;
        };
        let status = item.get("status").and_then(Value::as_str).unwrap_or("");
        let current = is_current(item);
        let folder = root.join(version);
        if !folder.is_dir() {
            continue;
        }
        if current && status != "ci-build" {
            process_folder(
                &folder,
                "This is the current published version in its permanent home. <a href=\"../history.html\">Directory of published versions</a>",
                true,
            )?;
            current_version = Some(version.to_string());

            let root_mirror = root.join("root");
            if root_mirror.is_dir() {
                process_folder(
                    &root_mirror,
                    &format!(
                        "This is the current published version {}. <a href=\"history.html\">Directory of published versions</a>",
                        version
                    ),
                    true,
                )?;
            }
        } else if !current {
            let target = current_version.as_deref().unwrap_or(&business_version);
            process_folder(
                &folder,
                &format!(
                    "This version is superseded by <a href=\"../{0}/index.html\">{0}</a>. <a href=\"../history.html\">Directory of published versions</a>",
                    target
                ),
                false,
            )?;
        }
    }

    let output = root.join("output");
    if output.is_dir() {
        let banner = match current_version {
            Some(ref version) => format!(
                "This is the continuous integration build, it is not an authorized publication, and may be broken or incomplete at times. Refer to the <a href=\"../history.html\">Directory of published versions</a> for stable versions, or <a href=\"../{0}/index.html\">{0}</a> for the current version",
                version
            ),
            None => "This is the continuous integration build, it is not an authorized publication, and may be broken or incomplete at times. Refer to the <a href=\"../history.html\">Directory of published versions</a> for stable versions".to_string(),
        };
        process_folder(&output, &banner, true)?;
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, ReleaseError> {
    let text = std::fs::read_to_string(path).map_err(|e| ReleaseError::Malformed {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ReleaseError::Malformed {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

/// `current` appears as a JSON boolean or, in older hand-edited lists, as
/// the string `"True"`.
fn is_current(item: &Value) -> bool {
    match item.get("current") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Replace the publish-box banner in every HTML page below `dir`,
/// skipping QA report folders.
pub fn process_folder(dir: &Path, banner: &str, current: bool) -> Result<(), ReleaseError> {
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with("qa"))
        {
            continue;
        }
        if !update_html(path, banner, current)? {
            tracing::warn!("publish box template not in {}", path.display());
        }
    }
    Ok(())
}

fn update_html(path: &Path, banner: &str, current: bool) -> Result<bool, ReleaseError> {
    let content = std::fs::read_to_string(path)?;
    for (start_marker, end_marker) in MARKERS {
        let Some(start) = content.find(start_marker) else {
            continue;
        };
        let body_start = start + start_marker.len();
        let Some(end) = content[body_start..].find(end_marker) else {
            continue;
        };
        let end = body_start + end;

        let mut replacement = String::new();
        if !banner.is_empty() {
            let wrap = !banner.contains("publish-box");
            if wrap {
                replacement.push_str(if current {
                    "<p id=\"publish-box\">"
                } else {
                    "<p id=\"publish-box-past\">"
                });
            }
            replacement.push_str(banner);
            if wrap {
                replacement.push_str("</p>");
            }
        }

        let new_content = format!(
            "{}{}{}",
            &content[..body_start],
            replacement,
            &content[end..]
        );
        if new_content != content {
            std::fs::write(path, new_content)?;
            tracing::info!("updated {}", path.display());
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = "<html><body><!--ReleaseHeader-->old banner<!--EndReleaseHeader--></body></html>";

    #[test]
    fn banner_is_replaced_between_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, PAGE).unwrap();

        assert!(update_html(&path, "fresh banner", true).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<html><body><!--ReleaseHeader--><p id=\"publish-box\">fresh banner</p><!--EndReleaseHeader--></body></html>"
        );
    }

    #[test]
    fn superseded_pages_get_the_past_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, PAGE).unwrap();

        update_html(&path, "old version", false).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("<p id=\"publish-box-past\">old version</p>"));
    }

    #[test]
    fn banner_with_own_wrapper_is_not_wrapped_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, PAGE).unwrap();

        update_html(&path, "<p id=\"publish-box\">self wrapped</p>", true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("publish-box").count(), 1);
    }

    #[test]
    fn spaced_markers_are_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(
            &path,
            "<!-- ReleaseHeader -->x<!-- EndReleaseHeader -->",
        )
        .unwrap();

        assert!(update_html(&path, "banner", true).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("banner"));
    }

    #[test]
    fn pages_without_markers_are_reported_not_touched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.html");
        std::fs::write(&path, "<html>no markers</html>").unwrap();

        assert!(!update_html(&path, "banner", true).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<html>no markers</html>"
        );
    }

    #[test]
    fn prepare_release_fans_out_over_version_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ig.json"),
            r#"{"fixed-business-version": "1.1.0"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("package-list.json"),
            r#"{"list": [
                {"version": "1.1.0", "status": "release", "current": true},
                {"version": "1.0.0", "status": "release"}
            ]}"#,
        )
        .unwrap();
        for version in ["1.1.0", "1.0.0", "output"] {
            std::fs::create_dir_all(dir.path().join(version)).unwrap();
            std::fs::write(dir.path().join(version).join("index.html"), PAGE).unwrap();
        }

        prepare_release(dir.path()).unwrap();

        let current = std::fs::read_to_string(dir.path().join("1.1.0/index.html")).unwrap();
        assert!(current.contains("permanent home"));

        let superseded = std::fs::read_to_string(dir.path().join("1.0.0/index.html")).unwrap();
        assert!(superseded.contains("superseded by <a href=\"../1.1.0/index.html\">1.1.0</a>"));
        assert!(superseded.contains("publish-box-past"));

        let ci = std::fs::read_to_string(dir.path().join("output/index.html")).unwrap();
        assert!(ci.contains("continuous integration build"));
        assert!(ci.contains("1.1.0/index.html"));
    }

    #[test]
    fn missing_business_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ig.json"), r#"{}"#).unwrap();
        assert!(matches!(
            prepare_release(dir.path()),
            Err(ReleaseError::MissingBusinessVersion { .. })
        ));
    }
}
