use crate::aggregate;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_date, get_required_str, load_failed, require_workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::AttendanceRecord;
use crate::source::{load_collection, FixtureDir, Resource};
use serde_json::json;

fn load_attendance(source: &FixtureDir) -> Result<Vec<AttendanceRecord>, HandlerErr> {
    load_collection(source, Resource::Attendance).map_err(|e| load_failed(Resource::Attendance, e))
}

fn attendance_lookup(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let grade = get_required_str(params, "grade")?;
    let section = get_required_str(params, "section")?;
    let (source, _) = require_workspace(state)?;
    let records = load_attendance(source)?;
    let snapshot = aggregate::attendance_snapshot(&records, date, &grade, &section);
    Ok(json!({
        "date": date,
        "grade": grade,
        "section": section,
        "found": snapshot.found,
        "stats": snapshot.stats,
        "records": snapshot.records,
    }))
}

fn attendance_trend(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade = get_required_str(params, "grade")?;
    let (source, config) = require_workspace(state)?;
    if !config.grades.iter().any(|g| *g == grade) {
        return Err(HandlerErr::new("bad_params", format!("{grade:?} is not a configured grade")));
    }
    let records = load_attendance(source)?;
    Ok(json!(aggregate::attendance_trend(&records, &grade)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.lookup" => attendance_lookup(state, &req.params),
        "attendance.trend" => attendance_trend(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
