use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::source::{self, FixtureDir};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "openViews": state.views.len(),
        }),
    )
}

/// Points the sidecar at a fixture folder. The configuration must load; the
/// data collections are only read when a view or query needs them.
fn select_workspace(state: &mut AppState, path: &Path) -> Result<serde_json::Value, HandlerErr> {
    let dir = FixtureDir::open(path)
        .map_err(|e| HandlerErr::new("workspace_invalid", format!("{e:#}")))?;
    let config = source::load_config(&dir).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "config load failed");
        HandlerErr::new("config_load_failed", "Failed to load config.")
    })?;

    if !state.views.is_empty() {
        tracing::info!(closed = state.views.len(), "workspace changed, closing open views");
        state.views.clear();
    }
    tracing::info!(path = %path.display(), grades = config.grades.len(), "workspace selected");

    let result = json!({
        "workspacePath": path.to_string_lossy(),
        "config": &config,
    });
    state.workspace = Some(path.to_path_buf());
    state.source = Some(dir);
    state.config = Some(config);
    Ok(result)
}

/// Startup variant of `workspace.select` for `--workspace`.
pub fn preselect_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    select_workspace(state, path)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code, e.message))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match get_required_str(&req.params, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };
    match select_workspace(state, &path) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match require_workspace(state) {
        Ok((_, config)) => ok(&req.id, json!(config)),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        _ => None,
    }
}
