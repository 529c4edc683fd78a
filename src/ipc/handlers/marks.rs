use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, load_failed, require_workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::marks::{MarksSheet, DEFAULT_MAX_MARKS};
use crate::records::{RecordId, ResultRecord, StudentRecord};
use crate::source::{load_collection, Resource};
use serde_json::json;

fn parse_max_marks(params: &serde_json::Value) -> Result<u32, HandlerErr> {
    match params.get("maxMarks") {
        None | Some(serde_json::Value::Null) => Ok(DEFAULT_MAX_MARKS),
        Some(v) => v
            .as_u64()
            .filter(|m| *m > 0 && *m <= u32::MAX as u64)
            .map(|m| m as u32)
            .ok_or_else(|| HandlerErr::new("bad_params", "maxMarks must be a positive integer")),
    }
}

/// Inputs arrive as `{ "<studentId>": "<raw text>" }`; numbers are taken as their text.
fn parse_inputs(params: &serde_json::Value) -> Result<Vec<(RecordId, String)>, HandlerErr> {
    let Some(raw) = params.get("inputs").filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::new("bad_params", "inputs must be an object"));
    };
    let mut out = Vec::with_capacity(obj.len());
    for (key, v) in obj {
        let id = RecordId::parse(key).ok_or_else(|| {
            HandlerErr::new("bad_params", format!("inputs key {key:?} is not a student id"))
        })?;
        let text = match v {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        out.push((id, text));
    }
    Ok(out)
}

fn marks_evaluate(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade = get_required_str(params, "grade")?;
    let section = get_required_str(params, "section")?;
    let subject = get_required_str(params, "subject")?;
    let max_marks = parse_max_marks(params)?;
    let inputs = parse_inputs(params)?;
    let bulk = params.get("bulkMark").and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let (source, _) = require_workspace(state)?;
    let students: Vec<StudentRecord> = load_collection(source, Resource::Students)
        .map_err(|e| load_failed(Resource::Students, e))?;
    let results: Vec<ResultRecord> = load_collection(source, Resource::Results)
        .map_err(|e| load_failed(Resource::Results, e))?;

    let mut sheet = MarksSheet::prefill(&students, &results, &grade, &section, &subject, max_marks);
    if let Some(bulk) = bulk {
        sheet.bulk_set(&bulk);
    }
    let mut unknown: Vec<RecordId> = Vec::new();
    for (id, text) in &inputs {
        if !sheet.set_input(*id, text) {
            unknown.push(*id);
        }
    }
    if !unknown.is_empty() {
        tracing::debug!(?unknown, "inputs for students outside the sheet ignored");
    }

    let stamp = chrono::Utc::now().to_rfc3339();
    Ok(json!({
        "sheet": &sheet,
        "invalidCount": sheet.invalid_count(),
        "ignoredInputs": unknown,
        "results": sheet.to_results(&stamp),
        "evaluatedAt": stamp,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "marks.evaluate" => marks_evaluate(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
