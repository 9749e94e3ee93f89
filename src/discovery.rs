//! # Tool Discovery
//!
//! Finds the external tools the build shells out to: the Python interpreter
//! (for compile checks) and PyInstaller (for packaging). Every directory on
//! `PATH` is scanned one level deep; on Windows an executable may carry any
//! of the usual launcher extensions.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use walkdir::WalkDir;

/// Interpreter names, in order of preference.
pub const PYTHON_NAMES: &[&str] = &["python", "python3", "py"];

pub const PYINSTALLER_NAMES: &[&str] = &["pyinstaller"];

const WINDOWS_EXTENSIONS: &[&str] = &["exe", "cmd", "bat", "com"];

/// Returns the first executable matching `names` on the current `PATH`.
///
/// Names are tried in order, so an earlier name anywhere on `PATH` wins over
/// a later name in an earlier directory.
pub fn find_executable(names: &[&str]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_in_path_list(&path_var, names)
}

/// Same as [`find_executable`] against an explicit `PATH`-style list.
pub fn find_in_path_list(path_var: &OsString, names: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();

    for name in names {
        for dir in &dirs {
            if let Some(found) = scan_dir(dir, name) {
                debug!("Found {} at {:?}", name, found);
                return Some(found);
            }
        }
    }
    None
}

/// Looks for `name` directly inside `dir`.
fn scan_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    trace!("Scanning {:?} for {}", dir, name);

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .find(|path| path.is_file() && matches_tool(path, name))
}

fn matches_tool(path: &Path, name: &str) -> bool {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    let name = name.to_lowercase();

    if cfg!(windows) {
        WINDOWS_EXTENSIONS
            .iter()
            .any(|ext| file_name == format!("{}.{}", name, ext))
    } else {
        file_name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tool_file(name: &str) -> String {
        if cfg!(windows) { format!("{}.exe", name) } else { name.to_string() }
    }

    #[test]
    fn finds_tool_in_second_directory() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join(tool_file("pyinstaller")), b"").unwrap();

        let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_in_path_list(&path_var, PYINSTALLER_NAMES).unwrap();
        assert_eq!(found, second.path().join(tool_file("pyinstaller")));
    }

    #[test]
    fn earlier_name_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join(tool_file("python3")), b"").unwrap();
        fs::write(second.path().join(tool_file("python")), b"").unwrap();

        let path_var = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_in_path_list(&path_var, PYTHON_NAMES).unwrap();
        assert_eq!(found, second.path().join(tool_file("python")));
    }

    #[test]
    fn directories_and_missing_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(tool_file("pyinstaller"))).unwrap();

        let path_var = std::env::join_paths([dir.path(), Path::new("/definitely/not/here")]).unwrap();
        assert!(find_in_path_list(&path_var, PYINSTALLER_NAMES).is_none());
    }

    #[test]
    fn nested_tools_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Scripts");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join(tool_file("pyinstaller")), b"").unwrap();

        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_in_path_list(&path_var, PYINSTALLER_NAMES).is_none());
    }
}
