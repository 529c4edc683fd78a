use crate::records::SchoolConfig;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Used when neither `config.json` nor `subjects.json` lists subjects.
pub const FALLBACK_SUBJECTS: &[&str] = &["Mathematics", "Science", "English", "History", "Physics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Students,
    Exams,
    Results,
    Attendance,
    Fees,
    Teachers,
    Notices,
    Subjects,
    Config,
}

impl Resource {
    pub fn name(self) -> &'static str {
        match self {
            Resource::Students => "students",
            Resource::Exams => "exams",
            Resource::Results => "results",
            Resource::Attendance => "attendance",
            Resource::Fees => "fees",
            Resource::Teachers => "teachers",
            Resource::Notices => "notices",
            Resource::Subjects => "subjects",
            Resource::Config => "config",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// Generic message shown at the view boundary when a fetch fails.
    pub fn load_failed_message(self) -> String {
        format!("Failed to load {}.", self.name())
    }
}

/// Fetches the raw text of one resource per call.
pub trait DataSource {
    fn fetch(&self, resource: Resource) -> anyhow::Result<String>;
}

/// Static JSON fixtures in one folder, one file per resource.
#[derive(Debug, Clone)]
pub struct FixtureDir {
    root: PathBuf,
}

impl FixtureDir {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(
            root.is_dir(),
            "workspace {} is not a directory",
            root.display()
        );
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl DataSource for FixtureDir {
    fn fetch(&self, resource: Resource) -> anyhow::Result<String> {
        let path = self.root.join(resource.file_name());
        std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

pub fn load_collection<T: DeserializeOwned>(
    source: &dyn DataSource,
    resource: Resource,
) -> anyhow::Result<Vec<T>> {
    let raw = source.fetch(resource)?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", resource.file_name()))
}

pub fn load_config(source: &dyn DataSource) -> anyhow::Result<SchoolConfig> {
    let raw = source.fetch(Resource::Config)?;
    let mut cfg: SchoolConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", Resource::Config.file_name()))?;
    if cfg.subjects.is_empty() {
        cfg.subjects = match load_collection::<String>(source, Resource::Subjects) {
            Ok(subjects) if !subjects.is_empty() => subjects,
            Ok(_) => FALLBACK_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            Err(e) => {
                tracing::debug!(error = %format!("{e:#}"), "no subject list, using fallback");
                FALLBACK_SUBJECTS.iter().map(|s| s.to_string()).collect()
            }
        };
    }
    Ok(cfg)
}
