//! Directory walker and diff-gated writer: the driver of the pipeline.
//! One file is read, repaired, and optionally rewritten before the next is
//! considered; the accumulated resource list is the only state that
//! crosses file boundaries.

use std::path::Path;

use walkdir::WalkDir;

use crate::codec::{self, Encoding};
use crate::config::PackageConfig;
use crate::error::IgError;
use crate::identity;
use crate::manifest::Guide;
use crate::repair;
use crate::resource::{Resource, ResourceType};

/// Known non-resource files living in the resources directory.
const SKIP_FILES: [&str; 4] = [
    "ig-expansion-parameters.json",
    "ig-new.json",
    "ig-new.xml",
    "ig-validation-parameters.json",
];

/// A resource that survived the walk, with the file name it came from.
#[derive(Debug)]
pub struct ProcessedResource {
    pub resource: Resource,
    pub file_name: String,
}

impl ProcessedResource {
    pub fn key(&self) -> Option<String> {
        self.resource.key()
    }
}

#[derive(Debug, Default)]
pub struct WalkReport {
    pub resources: Vec<ProcessedResource>,
    pub files_updated: usize,
}

/// Process every resource file under the resources directory. Per-file
/// failures are logged and skipped; the guide document is captured into
/// `guide` instead of the resource list.
pub fn process_tree(cfg: &PackageConfig, guide: &mut Guide) -> Result<WalkReport, IgError> {
    let includes_dir = cfg.includes_dir();
    let publisher = guide.publisher();
    let mut report = WalkReport::default();

    for entry in WalkDir::new(cfg.resources_dir())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if SKIP_FILES.contains(&file_name.as_str()) {
            continue;
        }
        let encoding = match path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Encoding::from_extension)
        {
            Some(encoding) => encoding,
            None => {
                tracing::info!("not a resource document, skipping {}", path.display());
                continue;
            }
        };

        match process_file(path, encoding, cfg, &includes_dir, publisher.as_deref()) {
            Ok(Processed::Guide(resource)) => guide.replace(resource),
            Ok(Processed::Resource { resource, updated }) => {
                if updated {
                    report.files_updated += 1;
                }
                report.resources.push(ProcessedResource {
                    resource,
                    file_name,
                });
            }
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
            }
        }
    }

    Ok(report)
}

enum Processed {
    Guide(Resource),
    Resource { resource: Resource, updated: bool },
}

fn process_file(
    path: &Path,
    encoding: Encoding,
    cfg: &PackageConfig,
    includes_dir: &Path,
    guide_publisher: Option<&str>,
) -> Result<Processed, IgError> {
    tracing::info!("processing {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let mut resource = codec::parse(&text, encoding)?;
    let before = codec::serialize(&resource)?;

    if path.file_name().and_then(|name| name.to_str()) == Some("ig.xml")
        && *resource.res_type() == ResourceType::ImplementationGuide
    {
        // The reconciler owns the guide's diff and write.
        return Ok(Processed::Guide(resource));
    }

    identity::repair_identity(&mut resource, cfg, guide_publisher)?;
    repair::repair_structure(&mut resource, includes_dir)?;

    let after = codec::serialize(&resource)?;
    let updated = after != before;
    if updated {
        std::fs::write(path, &after)?;
        tracing::info!("updated {}", path.display());
    }
    Ok(Processed::Resource { resource, updated })
}
