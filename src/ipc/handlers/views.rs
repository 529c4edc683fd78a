use crate::filters::parse_action;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_workspace, today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::view::{default_criteria, InitialValues, View, ViewKind};
use serde_json::json;

pub fn snapshot_json(view_id: &str, view: &View) -> serde_json::Value {
    let mut snap = json!(view.snapshot());
    snap["viewId"] = json!(view_id);
    snap
}

pub fn view_mut<'a>(state: &'a mut AppState, view_id: &str) -> Result<&'a mut View, HandlerErr> {
    state
        .views
        .get_mut(view_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("view {view_id} not found")))
}

fn view_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw_kind = get_required_str(params, "kind")?;
    let kind = ViewKind::parse(&raw_kind)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("unknown view kind: {raw_kind}")))?;
    let initial: InitialValues = match params.get("initial") {
        None | Some(serde_json::Value::Null) => InitialValues::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("invalid initial: {e}")))?,
    };

    let (source, config) = require_workspace(state)?;
    let as_of = today();
    let criteria = default_criteria(kind, config, &initial, as_of)?;
    let mut view = View::new(kind, criteria, as_of);
    view.load(source);

    let view_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(view_id = %view_id, ?kind, state = view.state().name(), "view opened");
    let snap = snapshot_json(&view_id, &view);
    state.views.insert(view_id, view);
    Ok(snap)
}

fn view_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    let action = parse_action(params.get("action"))?;
    let view = view_mut(state, &view_id)?;
    view.dispatch(&action)?;
    Ok(snapshot_json(&view_id, view))
}

fn view_snapshot(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    let view = view_mut(state, &view_id)?;
    Ok(snapshot_json(&view_id, view))
}

fn view_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    if state.views.remove(&view_id).is_none() {
        return Err(HandlerErr::new("not_found", format!("view {view_id} not found")));
    }
    tracing::info!(view_id = %view_id, "view closed");
    Ok(json!({ "viewId": view_id, "closed": true }))
}

fn views_list(state: &mut AppState) -> serde_json::Value {
    let mut rows: Vec<serde_json::Value> = state
        .views
        .iter()
        .map(|(id, v)| {
            json!({
                "viewId": id,
                "kind": v.kind,
                "state": v.state().name(),
                "resetVisible": v.criteria().is_reset_visible(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a["viewId"].as_str().cmp(&b["viewId"].as_str()));
    json!({ "views": rows })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "view.open" => view_open(state, &req.params),
        "view.update" => view_update(state, &req.params),
        "view.snapshot" => view_snapshot(state, &req.params),
        "view.close" => view_close(state, &req.params),
        "views.list" => Ok(views_list(state)),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
