use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};

use crate::discovery::{self, PYINSTALLER_NAMES, PYTHON_NAMES};
use crate::error::{BuildError, BuildResult};

/// Result of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Captured stderr/stdout, empty when the tool wrote straight to the console.
    pub diagnostics: String,
}

impl ToolOutput {
    /// One-line reason for a non-zero exit, used when no diagnostics were captured.
    pub fn describe_failure(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by a signal".to_string(),
        }
    }
}

/// Abstraction over everything the build asks of the host besides plain file copies.
/// Tests swap in `MockSystem` to script tool failures and observe call order.
pub trait BuildSystem {
    /// Existence check used by the pre-flight and syntax phases.
    fn path_exists(&self, path: &Path) -> bool;

    /// Parse `script` without executing it.
    fn compile_check(&self, script: &Path) -> BuildResult<ToolOutput>;

    /// Run the packaging tool on `spec_file` with `project_dir` as working directory.
    fn package(&self, project_dir: &Path, spec_file: &Path) -> BuildResult<ToolOutput>;
}

/// How to launch a tool: program plus any fixed leading arguments.
#[derive(Debug, Clone)]
struct ToolCommand {
    label: String,
    program: PathBuf,
    leading_args: Vec<OsString>,
}

/// The real host: Python and PyInstaller found on `PATH`.
pub struct HostSystem {
    python: ToolCommand,
    packager: ToolCommand,
    timeout: Option<Duration>,
    runtime: tokio::runtime::Runtime,
}

impl HostSystem {
    /// Locates the tools and prepares a single-threaded runtime for driving them.
    pub fn detect(timeout: Option<Duration>) -> std::io::Result<Self> {
        let python_path = discovery::find_executable(PYTHON_NAMES).unwrap_or_else(|| {
            warn!("No Python interpreter found on PATH; falling back to 'python'");
            PathBuf::from("python")
        });

        let packager = match discovery::find_executable(PYINSTALLER_NAMES) {
            Some(path) => ToolCommand {
                label: "PyInstaller".to_string(),
                program: path,
                leading_args: Vec::new(),
            },
            None => {
                info!("pyinstaller not on PATH; using '{} -m PyInstaller'", python_path.display());
                ToolCommand {
                    label: "PyInstaller".to_string(),
                    program: python_path.clone(),
                    leading_args: vec!["-m".into(), "PyInstaller".into()],
                }
            }
        };

        let python = ToolCommand {
            label: "Python compile check".to_string(),
            program: python_path,
            leading_args: vec!["-m".into(), "py_compile".into()],
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self { python, packager, timeout, runtime })
    }

    fn run(
        &self,
        tool: &ToolCommand,
        args: &[OsString],
        cwd: Option<&Path>,
        capture: bool,
    ) -> BuildResult<ToolOutput> {
        debug!("Running {:?} {:?} {:?}", tool.program, tool.leading_args, args);

        let mut cmd = tokio::process::Command::new(&tool.program);
        cmd.args(&tool.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let timeout = self.timeout;
        let launched = self.runtime.block_on(async {
            if capture {
                with_timeout(timeout, &tool.label, cmd.output()).await.map(|r| {
                    r.map(|out| {
                        let mut diagnostics = String::from_utf8_lossy(&out.stderr).into_owned();
                        if diagnostics.trim().is_empty() {
                            diagnostics = String::from_utf8_lossy(&out.stdout).into_owned();
                        }
                        ToolOutput {
                            success: out.status.success(),
                            exit_code: out.status.code(),
                            diagnostics: diagnostics.trim_end().to_string(),
                        }
                    })
                })
            } else {
                // Packaging output streams straight to the console.
                with_timeout(timeout, &tool.label, cmd.status()).await.map(|r| {
                    r.map(|status| ToolOutput {
                        success: status.success(),
                        exit_code: status.code(),
                        diagnostics: String::new(),
                    })
                })
            }
        })?;

        launched.map_err(|source| BuildError::ToolUnavailable {
            tool: format!("{} ({})", tool.label, tool.program.display()),
            source,
        })
    }
}

/// Awaits `fut`, bounded by `limit` when one is set. The child is killed on
/// expiry because the command was spawned with `kill_on_drop`.
async fn with_timeout<F, T>(limit: Option<Duration>, tool: &str, fut: F) -> BuildResult<T>
where
    F: std::future::Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BuildError::ToolTimedOut {
                tool: tool.to_string(),
                timeout_secs: limit.as_secs(),
            }),
        None => Ok(fut.await),
    }
}

impl BuildSystem for HostSystem {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn compile_check(&self, script: &Path) -> BuildResult<ToolOutput> {
        self.run(&self.python, &[script.as_os_str().to_owned()], None, true)
    }

    fn package(&self, project_dir: &Path, spec_file: &Path) -> BuildResult<ToolOutput> {
        let args = [
            OsString::from("--clean"),
            OsString::from("--noconfirm"),
            spec_file.as_os_str().to_owned(),
        ];
        self.run(&self.packager, &args, Some(project_dir), false)
    }
}

#[cfg(test)]
pub use mock::MockSystem;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_description_reports_exit_code() {
        let out = ToolOutput { success: false, exit_code: Some(2), diagnostics: String::new() };
        assert_eq!(out.describe_failure(), "exit code 2");

        let killed = ToolOutput { success: false, exit_code: None, diagnostics: String::new() };
        assert_eq!(killed.describe_failure(), "terminated by a signal");
    }

    #[test]
    fn missing_program_is_reported_as_unavailable() {
        let host = HostSystem {
            python: ToolCommand {
                label: "Python compile check".to_string(),
                program: PathBuf::from("/nonexistent/python-for-tests"),
                leading_args: Vec::new(),
            },
            packager: ToolCommand {
                label: "PyInstaller".to_string(),
                program: PathBuf::from("/nonexistent/pyinstaller-for-tests"),
                leading_args: Vec::new(),
            },
            timeout: None,
            runtime: tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap(),
        };

        let err = host.compile_check(Path::new("script.py")).unwrap_err();
        assert!(matches!(err, BuildError::ToolUnavailable { .. }));

        let err = host.package(Path::new("."), Path::new("app.spec")).unwrap_err();
        assert!(matches!(err, BuildError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn slow_tool_is_killed_after_timeout() {
        let host = HostSystem {
            python: ToolCommand {
                label: "sleeper".to_string(),
                program: PathBuf::from("sleep"),
                leading_args: Vec::new(),
            },
            packager: ToolCommand {
                label: "sleeper".to_string(),
                program: PathBuf::from("sleep"),
                leading_args: Vec::new(),
            },
            timeout: Some(Duration::from_millis(200)),
            runtime: tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap(),
        };

        let err = host.compile_check(Path::new("5")).unwrap_err();
        assert!(matches!(err, BuildError::ToolTimedOut { .. }));
    }
}
