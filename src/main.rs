//! # il2-build: The Main Entry Point
//!
//! Parses the command line, sets up logging, resolves the build manifest and
//! dispatches to the pipeline. Running the binary with no arguments performs
//! the full release build, just like double-clicking the old batch script.
//!
//! Exit status is 0 when the requested work completed and 1 otherwise.

use std::fs::{self, File};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::{LevelFilter, debug, error, info, warn};
use simplelog::{CombinedLogger, Config, SharedLogger, SimpleLogger, WriteLogger};

mod cleaner;
mod discovery;
mod distribution;
mod error;
mod invariant_ppt;
mod manifest;
mod packager;
mod pipeline;
mod preflight;
mod specgen;
mod syntax;
mod system;

use manifest::{Manifest, ManifestSource};
use pipeline::{BuildConfig, BuildReport};
use system::HostSystem;

/// The primary Command Line Interface (CLI) configuration.
#[derive(Parser)]
#[command(name = "il2-build")]
#[command(about = "Validates, packages and assembles the IL-2 Campaign Tracker release", long_about = None)]
struct Cli {
    /// What to do. Defaults to a full build.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Turn on verbose logging.
    ///
    /// - `-v`: Debug
    /// - `-vv`: Trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding the tracker sources and spec files.
    #[arg(long, default_value = ".", global = true)]
    project_dir: PathBuf,

    /// Manifest to use instead of `build_manifest.json` / the built-in one.
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Kill a compile check or packaging run that takes longer than this.
    ///
    /// Unset by default: a hung tool blocks the build.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Exit immediately instead of waiting for Enter.
    #[arg(long, global = true)]
    no_pause: bool,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run every phase: check, compile-check, clean, package, assemble.
    Build,
    /// Only verify required files and script syntax.
    Check,
    /// Only remove previous build output.
    Clean,
    /// Print the effective manifest as JSON.
    Manifest,
    /// Write each job's PyInstaller .spec file from the manifest.
    EmitSpecs,
}

fn main() {
    let cli = Cli::parse();
    let log_file = init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Build);
    let succeeded = match run(&cli, command) {
        Ok(ok) => ok,
        Err(e) => {
            error!("{:#}", e);
            false
        }
    };

    if let Some(path) = &log_file {
        debug!("Log written to {}", path.display());
    }

    if matches!(command, Commands::Build | Commands::Check) && !cli.no_pause {
        pause();
    }

    std::process::exit(if succeeded { 0 } else { 1 });
}

fn run(cli: &Cli, command: Commands) -> Result<bool> {
    let project_dir = std::path::absolute(&cli.project_dir)
        .with_context(|| format!("Cannot resolve project directory {}", cli.project_dir.display()))?;
    if !project_dir.is_dir() {
        anyhow::bail!("Project directory {} does not exist", project_dir.display());
    }

    let (manifest, source) = Manifest::resolve(&project_dir, cli.manifest.as_deref())
        .context("Failed to load the build manifest")?;
    match &source {
        ManifestSource::BuiltIn => debug!("Using the built-in manifest"),
        ManifestSource::File(path) => info!("Using manifest {}", path.display()),
    }

    let config = BuildConfig { project_dir, manifest };

    match command {
        Commands::Build => {
            let system = host_system(cli)?;
            print_banner(&config.manifest);
            let report = pipeline::run_pipeline(&config, &system);
            print_summary(&report);
            Ok(report.succeeded())
        }
        Commands::Check => {
            let system = host_system(cli)?;
            match pipeline::run_checks(&config, &system) {
                Ok((preflight, syntax)) => {
                    info!("");
                    info!(
                        "All checks passed: {} required files present, {} scripts compile, {} optional scripts absent",
                        preflight.checked.len(),
                        syntax.passed.len(),
                        syntax.skipped.len()
                    );
                    Ok(true)
                }
                Err(e) => {
                    error!("Check failed: {}", e);
                    Ok(false)
                }
            }
        }
        Commands::Clean => {
            let report = cleaner::clean_artifacts(&config.project_dir, &config.manifest);
            info!("Removed {} paths ({} files)", report.removed.len(), report.files_removed);
            Ok(report.left_behind.is_empty())
        }
        Commands::Manifest => {
            println!("{}", config.manifest.to_json_pretty()?);
            Ok(true)
        }
        Commands::EmitSpecs => {
            let written = specgen::emit_specs(&config.project_dir, &config.manifest)?;
            info!("Wrote {} spec file(s)", written.len());
            Ok(true)
        }
    }
}

fn host_system(cli: &Cli) -> Result<HostSystem> {
    let timeout = cli.timeout_secs.map(Duration::from_secs);
    HostSystem::detect(timeout).context("Failed to start the process runtime")
}

/// Terminal logger at the requested level, plus a debug-level copy of the run in
/// the per-user data directory. Returns where that copy is being written.
fn init_logging(verbose: u8) -> Option<PathBuf> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(SimpleLogger::new(level, Config::default()));

    let log_file = log_file_path().and_then(|path| File::create(&path).ok().map(|f| (path, f)));
    let log_path = match log_file {
        Some((path, file)) => {
            loggers.push(WriteLogger::new(LevelFilter::Debug.max(level), Config::default(), file));
            Some(path)
        }
        None => None,
    };

    // A second init only happens in tests; logging must never stop a build.
    let _ = CombinedLogger::init(loggers);
    log_path
}

fn log_file_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "il2-tracker-build")?;
    let dir = dirs.data_local_dir();
    fs::create_dir_all(dir).ok()?;
    Some(dir.join("last_build.log"))
}

fn print_banner(manifest: &Manifest) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Building {} v{}", manifest.product, manifest.version);
    println!("═══════════════════════════════════════════════════════════════");
}

fn print_summary(report: &BuildReport) {
    debug_assert!(report.state.is_terminal());

    println!();
    println!("───────────────────────────────────────────────────────────────");
    if let Some(clean) = &report.clean {
        if !clean.left_behind.is_empty() {
            warn!("Could not remove: {:?}", clean.left_behind);
        }
    }
    if let Some(package) = &report.package {
        for artifact in &package.artifacts {
            println!("  {} -> {}", artifact.job, artifact.output.display());
        }
    }

    match (&report.bundle, &report.error) {
        (Some(bundle), None) => {
            println!();
            println!("✓ BUILD SUCCEEDED");
            println!("  Distribution: {}", bundle.bundle_dir.display());
            for name in distribution::bundle_contents(&bundle.bundle_dir) {
                println!("    {}", name);
            }
            if bundle.documentation_skipped {
                println!("  (no README found, documentation not included)");
            }
            debug!("Files written this run: {:?}", bundle.files);
        }
        (_, Some(err)) => {
            let phase = report.aborted_at.map(|p| p.as_str()).unwrap_or("start");
            println!();
            println!("✕ BUILD FAILED during {}", phase);
            println!("  {}", err);
        }
        (None, None) => {}
    }
    if let (Some(preflight), Some(syntax)) = (&report.preflight, &report.syntax) {
        debug!(
            "{} required files checked, {} scripts compiled, {} skipped",
            preflight.checked.len(),
            syntax.passed.len(),
            syntax.skipped.len()
        );
    }
    println!();
}

/// Keeps a double-clicked console window open long enough to read the result.
fn pause() {
    if !std::io::stdin().is_terminal() {
        return;
    }
    print!("Press Enter to exit...");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
