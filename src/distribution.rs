//! # Distribution Assembler
//!
//! Phase 5: gathers the packaged executables, the runtime configuration the
//! tracker reads from next to its executable, optional documentation, and a
//! generated quick-start note into the versioned release folder.
//!
//! Copies happen in a fixed order (executables, configs, documentation,
//! quick-start). The first failure stops the phase and whatever was already
//! copied stays where it is.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{BuildError, BuildResult};
use crate::manifest::{Manifest, file_name_of};
use crate::packager::PackagedArtifact;

/// Quick-start note, one literal line per entry. Written with CRLF endings
/// because the audience opens it in Notepad.
pub const QUICK_START_LINES: &[&str] = &[
    "IL-2 CAMPAIGN PROGRESS TRACKER v1.1",
    "===================================",
    "",
    "QUICK START",
    "-----------",
    "1. Extract this folder anywhere (for example your Desktop).",
    "2. Keep campaign_progress_config.yaml, object_categories.yaml and",
    "   weapons_mappings.yaml in the same folder as IL2_CampaignTracker.exe.",
    "3. Double-click IL2_CampaignTracker.exe.",
    "4. On first run, select your IL-2 Sturmovik game directory.",
    "5. Leave the tracker window open while you fly; it updates your",
    "   campaigns every 10 seconds.",
    "",
    "REQUIREMENTS",
    "------------",
    "- Windows 10 or 11 (64-bit)",
    "- IL-2 Sturmovik: Great Battles",
    "- Mission logging enabled in startup.cfg (mission_text_log = 1)",
    "- mlg2txt.exe kept next to IL2_CampaignTracker.exe",
    "",
    "NOTE",
    "----",
    "The campaign asset pack is NOT included in this download.",
    "Download it separately from the release page and extract it into",
    "this folder before the first run.",
];

const LINE_ENDING: &str = "\r\n";

/// Full text of the quick-start file.
pub fn quick_start_text() -> String {
    let mut text = String::new();
    for line in QUICK_START_LINES {
        text.push_str(line);
        text.push_str(LINE_ENDING);
    }
    text
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    pub bundle_dir: PathBuf,
    /// Bundle-relative names, in the order they were written.
    pub files: Vec<String>,
    /// Set when the documentation source was absent.
    pub documentation_skipped: bool,
}

/// Builds the release folder from the completed package jobs.
pub fn assemble_distribution(
    project_dir: &Path,
    manifest: &Manifest,
    artifacts: &[PackagedArtifact],
) -> BuildResult<BundleReport> {
    let bundle_dir = project_dir.join(&manifest.bundle.dir_name);
    fs::create_dir_all(&bundle_dir).map_err(|source| BuildError::WriteFailed {
        path: bundle_dir.clone(),
        source,
    })?;
    info!("  Output folder: {}", bundle_dir.display());

    let mut report = BundleReport {
        bundle_dir: bundle_dir.clone(),
        ..Default::default()
    };

    for artifact in artifacts {
        let name = copy_into(project_dir, &artifact.output, &bundle_dir, None)?;
        report.files.push(name);
    }

    for config in manifest.distributed_files() {
        let name = copy_into(project_dir, config, &bundle_dir, None)?;
        report.files.push(name);
    }

    if let Some(doc) = &manifest.bundle.documentation {
        if project_dir.join(&doc.source).is_file() {
            let name = copy_into(project_dir, &doc.source, &bundle_dir, Some(&doc.target))?;
            report.files.push(name);
        } else {
            info!("  [SKIP] {} not found, no documentation copied", doc.source.display());
            report.documentation_skipped = true;
        }
    }

    let quick_start = bundle_dir.join(&manifest.bundle.quick_start_file);
    fs::write(&quick_start, quick_start_text()).map_err(|source| {
        error!("  [FAIL] {}", manifest.bundle.quick_start_file);
        BuildError::WriteFailed {
            path: quick_start.clone(),
            source,
        }
    })?;
    info!("  [OK] Generated {}", manifest.bundle.quick_start_file);
    report.files.push(manifest.bundle.quick_start_file.clone());

    Ok(report)
}

/// Copies `rel` from the project into the bundle, optionally renaming it.
fn copy_into(project_dir: &Path, rel: &Path, bundle_dir: &Path, rename: Option<&str>) -> BuildResult<String> {
    let name = match rename {
        Some(name) => name.to_string(),
        None => file_name_of(rel)?,
    };
    let target = bundle_dir.join(&name);

    debug!("Copying {:?} -> {:?}", project_dir.join(rel), target);
    match fs::copy(project_dir.join(rel), &target) {
        Ok(bytes) => {
            info!("  [OK] {} ({} bytes)", name, bytes);
            Ok(name)
        }
        Err(source) => {
            error!("  [FAIL] {}", rel.display());
            Err(BuildError::CopyFailed {
                artifact: rel.to_path_buf(),
                source,
            })
        }
    }
}

/// Lists the files currently in a bundle directory, sorted, relative to it.
pub fn bundle_contents(bundle_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(bundle_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(bundle_dir)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();
    names.sort();
    names
}
