//! Phase 1: every required file must exist before anything is compiled or removed.

use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use crate::system::BuildSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightReport {
    /// Files confirmed present, in check order.
    pub checked: Vec<PathBuf>,
}

/// Confirms each required entry exists, stopping at the first one that doesn't.
///
/// Existence only: nothing is opened or parsed here.
pub fn check_required_files(
    project_dir: &Path,
    manifest: &Manifest,
    system: &impl BuildSystem,
) -> BuildResult<PreflightReport> {
    let mut report = PreflightReport::default();

    for entry in manifest.required_files() {
        if !system.path_exists(&project_dir.join(&entry.path)) {
            error!("  [MISSING] {}", entry.path.display());
            return Err(BuildError::MissingRequiredFile {
                path: entry.path.clone(),
                message: entry.missing_message(),
            });
        }
        info!("  [OK] {}", entry.path.display());
        report.checked.push(entry.path.clone());
    }

    Ok(report)
}
