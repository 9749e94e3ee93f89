//! # Build Pipeline
//!
//! Drives the five phases in order and stops at the first failure:
//!
//! ```text
//! Start -> Preflight -> SyntaxCheck -> Clean -> Package -> Assemble -> Done
//!              \             \           \         \          \
//!               +-------------+-----------+---------+----------+--> Aborted
//! ```
//!
//! No phase is re-entered and nothing is retried. Everything a phase produces
//! goes into the returned [`BuildReport`]; there is no ambient build state.

use std::path::PathBuf;

use log::{error, info};

use crate::cleaner::{self, CleanReport};
use crate::distribution::{self, BundleReport};
use crate::error::{BuildError, BuildResult};
use crate::invariant_ppt::assert_invariant;
use crate::manifest::Manifest;
use crate::packager::{self, PackageReport};
use crate::preflight::{self, PreflightReport};
use crate::syntax::{self, SyntaxReport};
use crate::system::BuildSystem;

pub const INV_PHASE_ORDER: &str = "phases advance in declared order";
pub const INV_ABORT_FROM_ACTIVE: &str = "only an active phase can abort";
pub const INV_ALL_JOBS_PACKAGED: &str = "every package job produced an artifact before assembly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Start,
    /// Phase 1: required files exist.
    Preflight,
    /// Phase 2: scripts compile-check.
    SyntaxCheck,
    /// Phase 3: stale output removed.
    Clean,
    /// Phase 4: executables packaged.
    Package,
    /// Phase 5: release folder assembled.
    Assemble,
    Done,
    Aborted,
}

impl BuildPhase {
    /// Short name used in logs and the failure summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Start => "start",
            BuildPhase::Preflight => "preflight",
            BuildPhase::SyntaxCheck => "syntax-check",
            BuildPhase::Clean => "clean",
            BuildPhase::Package => "package",
            BuildPhase::Assemble => "assemble",
            BuildPhase::Done => "done",
            BuildPhase::Aborted => "aborted",
        }
    }

    /// Banner shown when the phase starts.
    pub fn title(&self) -> &'static str {
        match self {
            BuildPhase::Preflight => "Checking required files",
            BuildPhase::SyntaxCheck => "Checking script syntax",
            BuildPhase::Clean => "Removing old build output",
            BuildPhase::Package => "Packaging executables",
            BuildPhase::Assemble => "Assembling distribution",
            BuildPhase::Start | BuildPhase::Done | BuildPhase::Aborted => "",
        }
    }

    /// 1-based position among the five working phases.
    pub fn number(&self) -> Option<u8> {
        match self {
            BuildPhase::Preflight => Some(1),
            BuildPhase::SyntaxCheck => Some(2),
            BuildPhase::Clean => Some(3),
            BuildPhase::Package => Some(4),
            BuildPhase::Assemble => Some(5),
            _ => None,
        }
    }

    /// Phases reachable from this one. Every working phase may abort; the
    /// terminal states lead nowhere.
    pub fn valid_next_phases(&self) -> &'static [BuildPhase] {
        use BuildPhase::*;
        match self {
            Start => &[Preflight],
            Preflight => &[SyntaxCheck, Aborted],
            SyntaxCheck => &[Clean, Aborted],
            Clean => &[Package, Aborted],
            Package => &[Assemble, Aborted],
            Assemble => &[Done, Aborted],
            Done | Aborted => &[],
        }
    }

    /// Whether `next` is one of [`valid_next_phases`](Self::valid_next_phases).
    pub fn can_transition_to(&self, next: BuildPhase) -> bool {
        self.valid_next_phases().contains(&next)
    }

    /// `Done` or `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Done | BuildPhase::Aborted)
    }
}

/// Everything a run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub project_dir: PathBuf,
    pub manifest: Manifest,
}

/// What a run did, phase by phase.
#[derive(Debug)]
pub struct BuildReport {
    pub state: BuildPhase,
    /// The phase that was active when the run aborted.
    pub aborted_at: Option<BuildPhase>,
    pub error: Option<BuildError>,
    pub preflight: Option<PreflightReport>,
    pub syntax: Option<SyntaxReport>,
    pub clean: Option<CleanReport>,
    pub package: Option<PackageReport>,
    pub bundle: Option<BundleReport>,
}

impl BuildReport {
    fn new() -> Self {
        Self {
            state: BuildPhase::Start,
            aborted_at: None,
            error: None,
            preflight: None,
            syntax: None,
            clean: None,
            package: None,
            bundle: None,
        }
    }

    /// True only when every phase completed.
    pub fn succeeded(&self) -> bool {
        self.state == BuildPhase::Done
    }

    fn enter(&mut self, next: BuildPhase) -> BuildResult<()> {
        if !assert_invariant(self.state.can_transition_to(next), INV_PHASE_ORDER, next.as_str()) {
            return Err(BuildError::PhaseOrder(format!(
                "{} -> {}",
                self.state.as_str(),
                next.as_str()
            )));
        }
        self.state = next;
        if let Some(n) = next.number() {
            info!("");
            info!("[{}/5] {}...", n, next.title());
        }
        Ok(())
    }

    fn abort(&mut self, err: BuildError) {
        assert_invariant(
            self.state.can_transition_to(BuildPhase::Aborted),
            INV_ABORT_FROM_ACTIVE,
            self.state.as_str(),
        );
        error!("Build aborted during {}: {}", self.state.as_str(), err);
        self.aborted_at = Some(self.state);
        self.state = BuildPhase::Aborted;
        self.error = Some(err);
    }
}

/// Runs the full build. The returned report says how far it got.
pub fn run_pipeline(config: &BuildConfig, system: &impl BuildSystem) -> BuildReport {
    let mut report = BuildReport::new();
    if let Err(err) = drive(config, system, &mut report) {
        report.abort(err);
    }
    report
}

fn drive(config: &BuildConfig, system: &impl BuildSystem, report: &mut BuildReport) -> BuildResult<()> {
    let dir = &config.project_dir;
    let manifest = &config.manifest;

    report.enter(BuildPhase::Preflight)?;
    report.preflight = Some(preflight::check_required_files(dir, manifest, system)?);

    report.enter(BuildPhase::SyntaxCheck)?;
    report.syntax = Some(syntax::check_syntax(dir, manifest, system)?);

    report.enter(BuildPhase::Clean)?;
    let clean = cleaner::clean_artifacts(dir, manifest);
    let stale = clean.left_behind.clone();
    report.clean = Some(clean);

    report.enter(BuildPhase::Package)?;
    let package = packager::run_package_jobs(dir, manifest, &stale, system)?;
    if !assert_invariant(
        package.artifacts.len() == manifest.jobs.len(),
        INV_ALL_JOBS_PACKAGED,
        BuildPhase::Package.as_str(),
    ) {
        return Err(BuildError::PhaseOrder("assembly requested with missing artifacts".to_string()));
    }

    let artifacts = package.artifacts.clone();
    report.package = Some(package);

    report.enter(BuildPhase::Assemble)?;
    report.bundle = Some(distribution::assemble_distribution(dir, manifest, &artifacts)?);

    report.enter(BuildPhase::Done)?;
    Ok(())
}

/// Phases 1 and 2 only, for a quick sanity check without touching build output.
pub fn run_checks(config: &BuildConfig, system: &impl BuildSystem) -> BuildResult<(PreflightReport, SyntaxReport)> {
    info!("[1/2] {}...", BuildPhase::Preflight.title());
    let preflight = preflight::check_required_files(&config.project_dir, &config.manifest, system)?;
    info!("");
    info!("[2/2] {}...", BuildPhase::SyntaxCheck.title());
    let syntax = syntax::check_syntax(&config.project_dir, &config.manifest, system)?;
    Ok((preflight, syntax))
}
