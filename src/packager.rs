//! Phase 4: run the packaging tool once per job, in manifest order.

use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::{BuildError, BuildResult};
use crate::manifest::{Manifest, PackageJob};
use crate::system::BuildSystem;

/// A job that ran to completion and left its executable behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArtifact {
    pub job: String,
    /// Relative to the project directory.
    pub output: PathBuf,
}

/// Every artifact phase 4 produced, in job order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
    pub artifacts: Vec<PackagedArtifact>,
}

/// Runs every package job; the first failure ends the phase.
///
/// # Arguments
///
/// * `project_dir` - Working directory for the packaging tool.
/// * `manifest` - Supplies the jobs, in the order they run.
/// * `stale` - Paths the clean phase could not remove. An output at or under
///   one of them may be left over from an earlier build, so the job fails.
/// * `system` - Runs the packaging tool.
pub fn run_package_jobs(
    project_dir: &Path,
    manifest: &Manifest,
    stale: &[PathBuf],
    system: &impl BuildSystem,
) -> BuildResult<PackageReport> {
    let mut report = PackageReport::default();
    let total = manifest.jobs.len();

    for (index, job) in manifest.jobs.iter().enumerate() {
        info!("  [{}/{}] Packaging {} from {}", index + 1, total, job.name, job.spec_file.display());
        let artifact = run_job(project_dir, job, stale, system)?;
        info!("  [OK] {} -> {}", job.name, artifact.output.display());
        report.artifacts.push(artifact);
    }

    Ok(report)
}

fn run_job(
    project_dir: &Path,
    job: &PackageJob,
    stale: &[PathBuf],
    system: &impl BuildSystem,
) -> BuildResult<PackagedArtifact> {
    let outcome = system.package(project_dir, &job.spec_file)?;

    if !outcome.success {
        error!("  [FAIL] {}", job.name);
        return Err(BuildError::PackagingFailed {
            job: job.name.clone(),
            reason: outcome.describe_failure(),
        });
    }

    if !project_dir.join(&job.output).is_file() {
        error!("  [FAIL] {} produced no {}", job.name, job.output.display());
        return Err(BuildError::PackagingFailed {
            job: job.name.clone(),
            reason: format!("finished but {} was not produced", job.output.display()),
        });
    }

    if let Some(leftover) = stale.iter().find(|p| job.output.starts_with(p)) {
        error!("  [FAIL] {} may be stale, {} was not cleaned", job.output.display(), leftover.display());
        return Err(BuildError::PackagingFailed {
            job: job.name.clone(),
            reason: format!(
                "{} could be left over from a previous build because {} could not be removed",
                job.output.display(),
                leftover.display()
            ),
        });
    }

    Ok(PackagedArtifact {
        job: job.name.clone(),
        output: job.output.clone(),
    })
}
