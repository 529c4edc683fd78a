use crate::ipc::error::ok;
use crate::ipc::handlers::views::{snapshot_json, view_mut};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::view::NewNotice;
use serde_json::json;

fn notices_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    let Some(raw) = params.get("notice") else {
        return Err(HandlerErr::new("bad_params", "missing params.notice"));
    };
    let draft: NewNotice = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid notice: {e}")))?;

    let view = view_mut(state, &view_id)?;
    let notice = view.add_notice(draft)?;
    tracing::info!(view_id = %view_id, title = %notice.title, "notice added");
    Ok(json!({
        "notice": notice,
        "view": snapshot_json(&view_id, view),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notices.create" => notices_create(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
