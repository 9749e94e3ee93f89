//! # Build Manifest
//!
//! One declarative list drives every phase of the build. Each entry names a
//! file in the project directory and the roles it plays:
//!
//! - `required`: must exist before anything else happens (phase 1).
//! - `syntax_check`: must compile-check cleanly (phase 2). A target without the
//!   `required` role is optional; its absence is only a warning.
//! - `distribute`: copied verbatim into the release folder (phase 5).
//!
//! Package jobs, the clean list and the bundle layout live next to the entries
//! so the whole release is described in a single place. The built-in manifest
//! describes the IL-2 Campaign Tracker; a `build_manifest.json` in the project
//! directory replaces it.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, BuildResult};

/// File name probed in the project directory when no `--manifest` is given.
pub const MANIFEST_FILE_NAME: &str = "build_manifest.json";

/// The phases a manifest entry participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Required,
    SyntaxCheck,
    Distribute,
}

/// A single file known to the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Path relative to the project directory.
    pub path: PathBuf,
    pub roles: Vec<Role>,
    /// Diagnostic shown when a required entry is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_message: Option<String>,
}

impl ManifestEntry {
    /// An entry with no custom missing-file message.
    pub fn new(path: impl Into<PathBuf>, roles: &[Role]) -> Self {
        Self {
            path: path.into(),
            roles: roles.to_vec(),
            missing_message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.missing_message = Some(message.into());
        self
    }

    /// Whether this entry takes part in the phase behind `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The phase-1 diagnostic, falling back to a generic one.
    pub fn missing_message(&self) -> String {
        self.missing_message
            .clone()
            .unwrap_or_else(|| format!("Required file {} not found", self.path.display()))
    }
}

/// A phase-2 view of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxTarget<'a> {
    pub path: &'a Path,
    /// Absence is tolerated when the file is not also required.
    pub optional: bool,
}

/// A data file embedded into a packaged executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataFile {
    pub source: PathBuf,
    /// Directory inside the bundle, `.` for the bundle root.
    pub destination: String,
}

/// What the packaging tool needs to know to build one executable.
///
/// Rendered into a `.spec` file by `emit-specs`; the build itself only reads
/// the `.spec` files that already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingSpec {
    pub entry_point: PathBuf,
    /// Name of the produced executable, without extension.
    pub executable_name: String,
    #[serde(default)]
    pub binaries: Vec<PathBuf>,
    #[serde(default)]
    pub data_files: Vec<DataFile>,
    /// Modules the packager cannot discover by static analysis.
    #[serde(default)]
    pub hidden_imports: Vec<String>,
    #[serde(default = "default_console")]
    pub console: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
}

fn default_console() -> bool {
    true
}

/// One invocation of the packaging tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageJob {
    /// Human name used in diagnostics.
    pub name: String,
    pub spec_file: PathBuf,
    /// Where the packager leaves the executable, relative to the project directory.
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<PackagingSpec>,
}

/// A file copied into the bundle under a different name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamedCopy {
    pub source: PathBuf,
    pub target: String,
}

/// Layout of the release folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleSpec {
    /// Versioned directory name, created under the project directory.
    pub dir_name: String,
    pub quick_start_file: String,
    /// Optional documentation; skipped when the source is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<RenamedCopy>,
}

/// The complete description of a release: files, jobs, clean list and bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub product: String,
    pub version: String,
    pub entries: Vec<ManifestEntry>,
    /// Run in order; the first failure stops the rest.
    pub jobs: Vec<PackageJob>,
    /// Paths removed before packaging.
    pub clean: Vec<PathBuf>,
    pub bundle: BundleSpec,
}

/// Where the effective manifest came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    BuiltIn,
    File(PathBuf),
}

impl Manifest {
    /// The release layout of the IL-2 Campaign Progress Tracker.
    pub fn il2_tracker() -> Self {
        use Role::*;

        let entries = vec![
            ManifestEntry::new("il2_tracker_launcher.py", &[Required, SyntaxCheck])
                .with_message("Main launcher script not found"),
            ManifestEntry::new("step1_extract_mission_dates.py", &[Required, SyntaxCheck])
                .with_message("Mission date extractor not found"),
            ManifestEntry::new("decode_campaing_usersave1.py", &[Required, SyntaxCheck])
                .with_message("Save file decoder not found"),
            ManifestEntry::new("step3_generate_events.py", &[Required, SyntaxCheck])
                .with_message("Event generator not found"),
            ManifestEntry::new("step4_process_mission_logs.py", &[Required, SyntaxCheck])
                .with_message("Mission log processor not found"),
            ManifestEntry::new("monitor_campaigns.py", &[Required, SyntaxCheck])
                .with_message("Campaign monitor not found"),
            ManifestEntry::new("mlg2txt.py", &[Required, SyntaxCheck])
                .with_message("Mission log converter not found"),
            ManifestEntry::new("cleanup_failed_missions.py", &[SyntaxCheck]),
            ManifestEntry::new("country_validator_gui.py", &[SyntaxCheck]),
            ManifestEntry::new("il2_mission_debrief.py", &[SyntaxCheck]),
            ManifestEntry::new("il2_firing_accuracy.py", &[SyntaxCheck]),
            ManifestEntry::new("campaign_progress_config.yaml", &[Required, Distribute])
                .with_message("Tracker configuration not found"),
            ManifestEntry::new("object_categories.yaml", &[Required, Distribute])
                .with_message("Object category definitions not found"),
            ManifestEntry::new("weapons_mappings.yaml", &[Required, Distribute])
                .with_message("Weapon mappings not found"),
            ManifestEntry::new("stock_campaigns.yaml", &[Required])
                .with_message("Stock campaign list not found"),
            ManifestEntry::new("wkhtmltopdf.exe", &[Required])
                .with_message("wkhtmltopdf.exe not found (needed for PDF reports)"),
            ManifestEntry::new("IL2_CampaignTracker.spec", &[Required])
                .with_message("PyInstaller spec for the tracker not found"),
            ManifestEntry::new("mlg2txt.spec", &[Required])
                .with_message("PyInstaller spec for mlg2txt not found"),
        ];

        let tracker = PackageJob {
            name: "IL-2 Campaign Tracker".to_string(),
            spec_file: PathBuf::from("IL2_CampaignTracker.spec"),
            output: PathBuf::from("dist").join("IL2_CampaignTracker.exe"),
            packaging: Some(PackagingSpec {
                entry_point: PathBuf::from("il2_tracker_launcher.py"),
                executable_name: "IL2_CampaignTracker".to_string(),
                binaries: vec![PathBuf::from("wkhtmltopdf.exe")],
                data_files: vec![
                    DataFile { source: PathBuf::from("object_categories.yaml"), destination: ".".to_string() },
                    DataFile { source: PathBuf::from("weapons_mappings.yaml"), destination: ".".to_string() },
                    DataFile { source: PathBuf::from("stock_campaigns.yaml"), destination: ".".to_string() },
                ],
                hidden_imports: [
                    "step1_extract_mission_dates",
                    "decode_campaing_usersave1",
                    "step3_generate_events",
                    "step4_process_mission_logs",
                    "monitor_campaigns",
                    "cleanup_failed_missions",
                    "country_validator_gui",
                    "il2_mission_debrief",
                    "il2_firing_accuracy",
                    "yaml",
                    "pdfkit",
                    "tkinter",
                    "tkinter.ttk",
                    "tkinter.messagebox",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                console: true,
                icon: None,
            }),
        };

        let converter = PackageJob {
            name: "mlg2txt converter".to_string(),
            spec_file: PathBuf::from("mlg2txt.spec"),
            output: PathBuf::from("dist").join("mlg2txt.exe"),
            packaging: Some(PackagingSpec {
                entry_point: PathBuf::from("mlg2txt.py"),
                executable_name: "mlg2txt".to_string(),
                binaries: Vec::new(),
                data_files: Vec::new(),
                hidden_imports: Vec::new(),
                console: true,
                icon: None,
            }),
        };

        Self {
            product: "IL-2 Campaign Progress Tracker".to_string(),
            version: "1.1".to_string(),
            entries,
            jobs: vec![tracker, converter],
            clean: vec![
                PathBuf::from("build"),
                PathBuf::from("dist"),
                PathBuf::from("IL2_CampaignTracker.exe"),
                PathBuf::from("mlg2txt.exe"),
            ],
            bundle: BundleSpec {
                dir_name: "IL2_CampaignTracker_v1.1".to_string(),
                quick_start_file: "QUICK_START.txt".to_string(),
                documentation: Some(RenamedCopy {
                    source: PathBuf::from("README.md"),
                    target: "README.txt".to_string(),
                }),
            },
        }
    }

    /// Reads and validates a manifest file.
    pub fn load(path: &Path) -> BuildResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| BuildError::Manifest(format!("cannot read {}: {}", path.display(), e)))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| BuildError::Manifest(format!("{}: {}", path.display(), e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Picks the manifest for a project: explicit path, then
    /// `build_manifest.json` in the project directory, then the built-in one.
    pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> BuildResult<(Self, ManifestSource)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, ManifestSource::File(path.to_path_buf())));
        }

        let local = project_dir.join(MANIFEST_FILE_NAME);
        if local.is_file() {
            debug!("Using project manifest {:?}", local);
            return Ok((Self::load(&local)?, ManifestSource::File(local)));
        }

        let manifest = Self::il2_tracker();
        manifest.validate()?;
        Ok((manifest, ManifestSource::BuiltIn))
    }

    /// Rejects manifests that would make the bundle ambiguous or escape the project.
    pub fn validate(&self) -> BuildResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            ensure_relative(&entry.path, "entry")?;
            if entry.roles.is_empty() {
                return Err(BuildError::Manifest(format!(
                    "entry {} has no roles",
                    entry.path.display()
                )));
            }
            if !seen.insert(entry.path.clone()) {
                return Err(BuildError::Manifest(format!(
                    "entry {} is listed twice",
                    entry.path.display()
                )));
            }
        }

        let mut job_names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(BuildError::Manifest("package job without a name".to_string()));
            }
            if !job_names.insert(job.name.as_str()) {
                return Err(BuildError::Manifest(format!("package job '{}' is listed twice", job.name)));
            }
            ensure_relative(&job.spec_file, "spec file")?;
            ensure_relative(&job.output, "job output")?;
        }

        let protected = self.protected_sources();
        for path in &self.clean {
            ensure_relative(path, "clean path")?;
            let target = normalized(path);
            if target.as_os_str().is_empty() {
                return Err(BuildError::Manifest(format!(
                    "clean path '{}' would remove the whole project",
                    path.display()
                )));
            }
            if let Some(source) = protected.iter().find(|p| normalized(p).starts_with(&target)) {
                return Err(BuildError::Manifest(format!(
                    "clean path '{}' would delete project source {}",
                    path.display(),
                    source.display()
                )));
            }
        }

        if !is_plain_name(&self.bundle.dir_name) {
            return Err(BuildError::Manifest(format!(
                "bundle directory '{}' must be a single path component",
                self.bundle.dir_name
            )));
        }
        if self.clean.iter().any(|p| p == Path::new(&self.bundle.dir_name)) {
            return Err(BuildError::Manifest(
                "the bundle directory cannot also be on the clean list".to_string(),
            ));
        }

        let mut bundle_names = HashSet::new();
        for name in self.bundle_file_names()? {
            if !is_plain_name(&name) {
                return Err(BuildError::Manifest(format!("bundle file '{}' is not a plain file name", name)));
            }
            if !bundle_names.insert(name.clone()) {
                return Err(BuildError::Manifest(format!("bundle file '{}' would be written twice", name)));
            }
        }

        Ok(())
    }

    /// Entries checked in phase 1, in manifest order.
    pub fn required_files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.has_role(Role::Required))
    }

    /// Entries checked in phase 2, in manifest order.
    pub fn syntax_targets(&self) -> impl Iterator<Item = SyntaxTarget<'_>> {
        self.entries
            .iter()
            .filter(|e| e.has_role(Role::SyntaxCheck))
            .map(|e| SyntaxTarget {
                path: &e.path,
                optional: !e.has_role(Role::Required),
            })
    }

    /// Configuration files copied verbatim into the bundle.
    pub fn distributed_files(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| e.has_role(Role::Distribute))
            .map(|e| e.path.as_path())
    }

    /// Every file name the bundle ends up containing, documentation included.
    pub fn bundle_file_names(&self) -> BuildResult<Vec<String>> {
        let mut names = Vec::new();
        for job in &self.jobs {
            names.push(file_name_of(&job.output)?);
        }
        for path in self.distributed_files() {
            names.push(file_name_of(path)?);
        }
        if let Some(doc) = &self.bundle.documentation {
            names.push(doc.target.clone());
        }
        names.push(self.bundle.quick_start_file.clone());
        Ok(names)
    }

    /// Project inputs the clean phase must never touch: every entry, every
    /// `.spec` file, the files packaged into executables and the documentation source.
    fn protected_sources(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.entries.iter().map(|e| e.path.as_path()).collect();
        for job in &self.jobs {
            paths.push(&job.spec_file);
            if let Some(spec) = &job.packaging {
                paths.push(&spec.entry_point);
                paths.extend(spec.binaries.iter().map(PathBuf::as_path));
                paths.extend(spec.data_files.iter().map(|d| d.source.as_path()));
            }
        }
        if let Some(doc) = &self.bundle.documentation {
            paths.push(&doc.source);
        }
        paths
    }

    /// Serializes the manifest in the format `build_manifest.json` is read in.
    pub fn to_json_pretty(&self) -> BuildResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BuildError::Manifest(e.to_string()))
    }
}

pub(crate) fn file_name_of(path: &Path) -> BuildResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BuildError::Manifest(format!("{} has no file name", path.display())))
}

fn ensure_relative(path: &Path, what: &str) -> BuildResult<()> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.as_os_str().is_empty() || escapes {
        return Err(BuildError::Manifest(format!(
            "{} '{}' must be a relative path inside the project",
            what,
            path.display()
        )));
    }
    Ok(())
}

/// `path` with every `.` component dropped. Empty when the path names the project root.
fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_manifest_is_valid() {
        Manifest::il2_tracker().validate().unwrap();
    }

    #[test]
    fn built_in_bundle_has_two_executables_three_configs_doc_and_quick_start() {
        let manifest = Manifest::il2_tracker();
        assert_eq!(manifest.jobs.len(), 2);
        assert_eq!(manifest.distributed_files().count(), 3);
        assert_eq!(
            manifest.bundle_file_names().unwrap(),
            vec![
                "IL2_CampaignTracker.exe",
                "mlg2txt.exe",
                "campaign_progress_config.yaml",
                "object_categories.yaml",
                "weapons_mappings.yaml",
                "README.txt",
                "QUICK_START.txt",
            ]
        );
    }

    #[test]
    fn syntax_targets_are_optional_unless_required() {
        let manifest = Manifest::il2_tracker();
        let targets: Vec<_> = manifest.syntax_targets().collect();

        let launcher = targets
            .iter()
            .find(|t| t.path == Path::new("il2_tracker_launcher.py"))
            .unwrap();
        assert!(!launcher.optional);

        let debrief = targets
            .iter()
            .find(|t| t.path == Path::new("il2_mission_debrief.py"))
            .unwrap();
        assert!(debrief.optional);
    }

    #[test]
    fn required_files_keep_manifest_order() {
        let manifest = Manifest::il2_tracker();
        let first_two: Vec<_> = manifest.required_files().take(2).map(|e| e.path.clone()).collect();
        assert_eq!(
            first_two,
            vec![
                PathBuf::from("il2_tracker_launcher.py"),
                PathBuf::from("step1_extract_mission_dates.py")
            ]
        );
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let mut manifest = Manifest::il2_tracker();
        manifest.entries.push(ManifestEntry::new("mlg2txt.py", &[Role::SyntaxCheck]));
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn colliding_bundle_names_are_rejected() {
        let mut manifest = Manifest::il2_tracker();
        manifest.bundle.quick_start_file = "README.txt".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn paths_escaping_the_project_are_rejected() {
        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("../outside"));
        assert!(manifest.validate().is_err());

        let mut manifest = Manifest::il2_tracker();
        manifest.bundle.dir_name = "nested/dir".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn bundle_directory_cannot_be_cleaned() {
        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("IL2_CampaignTracker_v1.1"));
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn cleaning_the_project_root_is_rejected() {
        for root in [".", "./", "./."] {
            let mut manifest = Manifest::il2_tracker();
            manifest.clean.push(PathBuf::from(root));
            let err = manifest.validate().unwrap_err();
            assert!(err.to_string().contains("whole project"), "{root}: {err}");
        }
    }

    #[test]
    fn cleaning_a_source_or_its_parent_is_rejected() {
        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("il2_tracker_launcher.py"));
        assert!(manifest.validate().unwrap_err().to_string().contains("il2_tracker_launcher.py"));

        let mut manifest = Manifest::il2_tracker();
        manifest.entries.push(ManifestEntry::new("scripts/extra.py", &[Role::SyntaxCheck]));
        manifest.clean.push(PathBuf::from("./scripts"));
        assert!(manifest.validate().unwrap_err().to_string().contains("extra.py"));

        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("README.md"));
        assert!(manifest.validate().is_err());

        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("mlg2txt.spec"));
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn rejected_clean_list_never_reaches_the_cleaner() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("il2_tracker_launcher.py"), b"print('hi')\n").unwrap();
        let mut manifest = Manifest::il2_tracker();
        manifest.clean.push(PathBuf::from("."));
        fs::write(dir.path().join(MANIFEST_FILE_NAME), manifest.to_json_pretty().unwrap()).unwrap();

        assert!(Manifest::resolve(dir.path(), None).is_err());
        assert!(dir.path().join("il2_tracker_launcher.py").exists());
    }

    #[test]
    fn packaged_inputs_are_checked_up_front() {
        let manifest = Manifest::il2_tracker();
        let required: Vec<_> = manifest.required_files().map(|e| e.path.clone()).collect();
        for job in &manifest.jobs {
            let spec = job.packaging.as_ref().unwrap();
            for path in spec.binaries.iter().chain(spec.data_files.iter().map(|d| &d.source)) {
                assert!(required.contains(path), "{} is packaged but not required", path.display());
            }
        }
    }

    #[test]
    fn json_manifest_round_trips_through_a_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::il2_tracker();
        fs::write(dir.path().join(MANIFEST_FILE_NAME), manifest.to_json_pretty().unwrap()).unwrap();

        let (loaded, source) = Manifest::resolve(dir.path(), None).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(source, ManifestSource::File(dir.path().join(MANIFEST_FILE_NAME)));
    }

    #[test]
    fn resolve_falls_back_to_built_in() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, source) = Manifest::resolve(dir.path(), None).unwrap();
        assert_eq!(source, ManifestSource::BuiltIn);
        assert_eq!(manifest.bundle.dir_name, "IL2_CampaignTracker_v1.1");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(
            &path,
            r#"{"product":"x","version":"1","entries":[],"jobs":[],"clean":[],
                "bundle":{"dir_name":"out","quick_start_file":"Q.txt"},"extra":1}"#,
        )
        .unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(matches!(err, BuildError::Manifest(_)));
    }

    #[test]
    fn roles_use_snake_case_in_json() {
        let entry = ManifestEntry::new("a.py", &[Role::SyntaxCheck]);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"path":"a.py","roles":["syntax_check"]}"#);
    }
}
