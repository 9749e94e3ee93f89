//! Error taxonomy for the distribution build.
//!
//! Every variant is fatal: the pipeline stops at the point of detection and
//! reports the variant's message. Tolerated conditions (a missing optional
//! syntax-check target, a missing documentation file) never become errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    /// Phase 1: a required source or config file is absent.
    #[error("{message} (missing: {})", path.display())]
    MissingRequiredFile { path: PathBuf, message: String },

    /// Phase 2: the compile-check rejected a script.
    #[error("syntax check failed for {}:\n{diagnostics}", path.display())]
    SyntaxError { path: PathBuf, diagnostics: String },

    /// Phase 4: a packaging job exited non-zero or produced nothing.
    #[error("packaging job '{job}' failed: {reason}")]
    PackagingFailed { job: String, reason: String },

    /// Phase 5: an artifact could not be copied into the bundle.
    #[error("failed to copy {} into the distribution: {source}", artifact.display())]
    CopyFailed {
        artifact: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Phase 5 (and `emit-specs`): a generated file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not launch {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} did not finish within {timeout_secs}s and was killed")]
    ToolTimedOut { tool: String, timeout_secs: u64 },

    #[error("invalid build manifest: {0}")]
    Manifest(String),

    #[error("build phases ran out of order: {0}")]
    PhaseOrder(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
