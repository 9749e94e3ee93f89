//! Phase 2: compile-check every script the release depends on.
//!
//! Absent targets are skipped with a warning. Required scripts were already
//! confirmed by the pre-flight phase, so only optional ones can be absent here.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use crate::system::BuildSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxReport {
    pub passed: Vec<PathBuf>,
    /// Targets that were not on disk.
    pub skipped: Vec<PathBuf>,
}

/// Compile-checks each syntax target, stopping at the first that fails to parse.
pub fn check_syntax(
    project_dir: &Path,
    manifest: &Manifest,
    system: &impl BuildSystem,
) -> BuildResult<SyntaxReport> {
    let mut report = SyntaxReport::default();

    for target in manifest.syntax_targets() {
        let full = project_dir.join(target.path);

        if !system.path_exists(&full) {
            if target.optional {
                warn!("  [SKIP] {} not found (optional)", target.path.display());
            } else {
                warn!("  [SKIP] {} not found", target.path.display());
            }
            report.skipped.push(target.path.to_path_buf());
            continue;
        }

        let outcome = system.compile_check(&full)?;
        if !outcome.success {
            error!("  [FAIL] {}", target.path.display());
            let diagnostics = if outcome.diagnostics.is_empty() {
                outcome.describe_failure()
            } else {
                outcome.diagnostics
            };
            return Err(BuildError::SyntaxError {
                path: target.path.to_path_buf(),
                diagnostics,
            });
        }

        info!("  [OK] {}", target.path.display());
        report.passed.push(target.path.to_path_buf());
    }

    Ok(report)
}
