//! # Artifact Cleaner
//!
//! Phase 3: wipes the packager's work directories and any stale executables so
//! the next packaging run can never pick up output from a previous build.
//!
//! Removal is unconditional and idempotent. A path that is already gone is a
//! no-op. A path that cannot be removed is reported in
//! [`CleanReport::left_behind`]; the packaging phase refuses any output that
//! lies under one of those paths, since nothing here is allowed to abort the run.

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::manifest::Manifest;

/// What the clean phase removed and what it had to leave in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Paths that existed and were removed.
    pub removed: Vec<PathBuf>,
    /// Regular files deleted across all removed paths.
    pub files_removed: usize,
    /// Paths that existed but could not be removed.
    pub left_behind: Vec<PathBuf>,
}

impl CleanReport {
    /// True when nothing on the clean list existed.
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.left_behind.is_empty()
    }
}

/// Removes every path on the manifest's clean list.
pub fn clean_artifacts(project_dir: &Path, manifest: &Manifest) -> CleanReport {
    let mut report = CleanReport::default();

    for rel in &manifest.clean {
        if !rel.components().any(|c| matches!(c, Component::Normal(_))) {
            warn!("  Refusing to clean {}: it names the project directory", rel.display());
            report.left_behind.push(rel.clone());
            continue;
        }
        let target = project_dir.join(rel);
        let Ok(meta) = fs::symlink_metadata(&target) else {
            debug!("  {} not present", rel.display());
            continue;
        };

        let (result, files) = if meta.is_dir() {
            let files = count_files(&target);
            (fs::remove_dir_all(&target), files)
        } else {
            (fs::remove_file(&target), 1)
        };

        match result {
            Ok(()) => {
                info!("  Removed {} ({} files)", rel.display(), files);
                report.removed.push(rel.clone());
                report.files_removed += files;
            }
            Err(e) => {
                warn!("  Could not remove {}: {}", rel.display(), e);
                report.left_behind.push(rel.clone());
            }
        }
    }

    if report.is_noop() {
        info!("  Nothing to clean");
    }
    report
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("build/IL2_CampaignTracker/localpycache")).unwrap();
        fs::write(dir.join("build/IL2_CampaignTracker/warn.txt"), b"w").unwrap();
        fs::write(dir.join("build/IL2_CampaignTracker/localpycache/a.pyc"), b"c").unwrap();
        fs::create_dir_all(dir.join("dist")).unwrap();
        fs::write(dir.join("dist/IL2_CampaignTracker.exe"), b"MZ").unwrap();
        fs::write(dir.join("mlg2txt.exe"), b"MZ").unwrap();
    }

    #[test]
    fn removes_listed_paths_and_counts_files() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        fs::write(dir.path().join("il2_tracker_launcher.py"), b"").unwrap();

        let report = clean_artifacts(dir.path(), &Manifest::il2_tracker());

        assert_eq!(
            report.removed,
            vec![PathBuf::from("build"), PathBuf::from("dist"), PathBuf::from("mlg2txt.exe")]
        );
        assert_eq!(report.files_removed, 4);
        assert!(!dir.path().join("build").exists());
        assert!(!dir.path().join("dist").exists());
        assert!(dir.path().join("il2_tracker_launcher.py").exists());
    }

    #[test]
    fn second_run_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let manifest = Manifest::il2_tracker();

        let first = clean_artifacts(dir.path(), &manifest);
        assert!(!first.is_noop());

        let second = clean_artifacts(dir.path(), &manifest);
        assert!(second.is_noop());
        assert_eq!(second.files_removed, 0);
    }

    #[test]
    fn empty_project_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let report = clean_artifacts(dir.path(), &Manifest::il2_tracker());
        assert_eq!(report, CleanReport::default());
    }

    #[test]
    fn project_root_is_never_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("il2_tracker_launcher.py"), b"").unwrap();
        let mut manifest = Manifest::il2_tracker();
        manifest.clean = vec![PathBuf::from("."), PathBuf::from("./")];

        let report = clean_artifacts(dir.path(), &manifest);

        assert!(report.removed.is_empty());
        assert_eq!(report.left_behind.len(), 2);
        assert!(dir.path().join("il2_tracker_launcher.py").exists());
    }

    #[test]
    fn bundle_directory_survives() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::il2_tracker();
        let bundle = dir.path().join(&manifest.bundle.dir_name);
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("QUICK_START.txt"), b"old").unwrap();

        clean_artifacts(dir.path(), &manifest);
        assert!(bundle.join("QUICK_START.txt").exists());
    }
}
