use std::collections::HashMap;
use std::path::PathBuf;

use crate::records::SchoolConfig;
use crate::source::FixtureDir;
use crate::view::View;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub source: Option<FixtureDir>,
    pub config: Option<SchoolConfig>,
    /// Open views keyed by view id.
    pub views: HashMap<String, View>,
}
