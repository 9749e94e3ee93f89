//! Renders a job's [`PackagingSpec`] as a PyInstaller one-file `.spec` script.
//!
//! Only the `emit-specs` command writes these; the build treats existing
//! `.spec` files as inputs and never regenerates them behind the user's back.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{BuildError, BuildResult};
use crate::manifest::{Manifest, PackagingSpec};

/// Quotes `value` as a single-quoted Python string literal.
fn py_str(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Paths are written with forward slashes, which PyInstaller accepts on every platform.
fn py_path(path: &Path) -> String {
    py_str(&path.to_string_lossy().replace('\\', "/"))
}

fn py_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Renders one PyInstaller `.spec` file: `Analysis`, `PYZ` and a one-file `EXE`.
///
/// # Arguments
///
/// * `spec` - The packaging description of a single job.
///
/// # Returns
///
/// The file contents, ready to be written next to the entry point.
pub fn render_spec(spec: &PackagingSpec) -> String {
    let binaries: Vec<String> = spec
        .binaries
        .iter()
        .map(|b| format!("({}, '.')", py_path(b)))
        .collect();
    let datas: Vec<String> = spec
        .data_files
        .iter()
        .map(|d| format!("({}, {})", py_path(&d.source), py_str(&d.destination)))
        .collect();
    let hidden: Vec<String> = spec.hidden_imports.iter().map(|h| py_str(h)).collect();
    let py_bool = |b: bool| if b { "True" } else { "False" };

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# -*- mode: python ; coding: utf-8 -*-");
    let _ = writeln!(out, "# Generated by `il2-build emit-specs`. Edit build_manifest.json instead.");
    let _ = writeln!(out);
    let _ = writeln!(out, "a = Analysis(");
    let _ = writeln!(out, "    [{}],", py_path(&spec.entry_point));
    let _ = writeln!(out, "    pathex=[],");
    let _ = writeln!(out, "    binaries={},", py_list(&binaries));
    let _ = writeln!(out, "    datas={},", py_list(&datas));
    let _ = writeln!(out, "    hiddenimports={},", py_list(&hidden));
    let _ = writeln!(out, "    hookspath=[],");
    let _ = writeln!(out, "    hooksconfig={{}},");
    let _ = writeln!(out, "    runtime_hooks=[],");
    let _ = writeln!(out, "    excludes=[],");
    let _ = writeln!(out, "    noarchive=False,");
    let _ = writeln!(out, ")");
    let _ = writeln!(out, "pyz = PYZ(a.pure)");
    let _ = writeln!(out);
    let _ = writeln!(out, "exe = EXE(");
    let _ = writeln!(out, "    pyz,");
    let _ = writeln!(out, "    a.scripts,");
    let _ = writeln!(out, "    a.binaries,");
    let _ = writeln!(out, "    a.datas,");
    let _ = writeln!(out, "    [],");
    let _ = writeln!(out, "    name={},", py_str(&spec.executable_name));
    let _ = writeln!(out, "    debug=False,");
    let _ = writeln!(out, "    bootloader_ignore_signals=False,");
    let _ = writeln!(out, "    strip=False,");
    let _ = writeln!(out, "    upx=True,");
    let _ = writeln!(out, "    upx_exclude=[],");
    let _ = writeln!(out, "    runtime_tmpdir=None,");
    let _ = writeln!(out, "    console={},", py_bool(spec.console));
    let _ = writeln!(out, "    disable_windowed_traceback=False,");
    let _ = writeln!(out, "    argv_emulation=False,");
    let _ = writeln!(out, "    target_arch=None,");
    let _ = writeln!(out, "    codesign_identity=None,");
    let _ = writeln!(out, "    entitlements_file=None,");
    if let Some(icon) = &spec.icon {
        let _ = writeln!(out, "    icon={},", py_path(icon));
    }
    let _ = writeln!(out, ")");
    out
}

/// Writes a `.spec` file for every job that carries a packaging description.
pub fn emit_specs(project_dir: &Path, manifest: &Manifest) -> BuildResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    for job in &manifest.jobs {
        let Some(spec) = &job.packaging else {
            warn!("{} has no packaging description; leaving {} alone", job.name, job.spec_file.display());
            continue;
        };

        let target = project_dir.join(&job.spec_file);
        fs::write(&target, render_spec(spec)).map_err(|source| BuildError::WriteFailed {
            path: target.clone(),
            source,
        })?;
        info!("Wrote {} for {}", job.spec_file.display(), job.name);
        written.push(job.spec_file.clone());
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_spec() -> PackagingSpec {
        Manifest::il2_tracker().jobs[0].packaging.clone().unwrap()
    }

    #[test]
    fn tracker_spec_declares_entry_binaries_datas_and_hidden_imports() {
        let text = render_spec(&tracker_spec());

        assert!(text.contains("    ['il2_tracker_launcher.py'],\n"));
        assert!(text.contains("binaries=[('wkhtmltopdf.exe', '.')],"));
        assert!(text.contains("('object_categories.yaml', '.')"));
        assert!(text.contains("'step3_generate_events'"));
        assert!(text.contains("'tkinter.messagebox'"));
        assert!(text.contains("name='IL2_CampaignTracker',"));
        assert!(text.contains("console=True,"));
        assert!(text.contains("hooksconfig={},"));
        assert!(!text.contains("icon="));
    }

    #[test]
    fn converter_spec_has_empty_lists() {
        let spec = Manifest::il2_tracker().jobs[1].packaging.clone().unwrap();
        let text = render_spec(&spec);
        assert!(text.contains("binaries=[],"));
        assert!(text.contains("datas=[],"));
        assert!(text.contains("hiddenimports=[],"));
        assert!(text.contains("name='mlg2txt',"));
    }

    #[test]
    fn strings_are_escaped_and_paths_use_forward_slashes() {
        let mut spec = tracker_spec();
        spec.executable_name = "it's".to_string();
        spec.icon = Some(PathBuf::from("assets\\tracker.ico"));
        spec.console = false;

        let text = render_spec(&spec);
        assert!(text.contains(r"name='it\'s',"));
        assert!(text.contains("icon='assets/tracker.ico',"));
        assert!(text.contains("console=False,"));
    }

    #[test]
    fn emit_writes_one_file_per_described_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::il2_tracker();
        manifest.jobs[1].packaging = None;

        let written = emit_specs(dir.path(), &manifest).unwrap();
        assert_eq!(written, vec![PathBuf::from("IL2_CampaignTracker.spec")]);
        assert!(dir.path().join("IL2_CampaignTracker.spec").is_file());
        assert!(!dir.path().join("mlg2txt.spec").exists());
    }
}
