use crate::aggregate;
use crate::ipc::error::ok;
use crate::ipc::handlers::views::{snapshot_json, view_mut};
use crate::ipc::helpers::{get_required_id, get_required_str, load_failed, require_workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::{AttendanceRecord, ResultRecord, StudentRecord};
use crate::source::{load_collection, Resource};
use crate::view::NewStudent;
use serde_json::json;

fn students_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    let Some(raw) = params.get("student") else {
        return Err(HandlerErr::new("bad_params", "missing params.student"));
    };
    let draft: NewStudent = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid student: {e}")))?;

    let view = view_mut(state, &view_id)?;
    let student = view.add_student(draft)?;
    tracing::info!(view_id = %view_id, id = %student.id, "student added");
    Ok(json!({
        "student": student,
        "view": snapshot_json(&view_id, view),
    }))
}

fn students_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(params, "viewId")?;
    let id = get_required_id(params, "id")?;
    let view = view_mut(state, &view_id)?;
    let removed = view.delete_student(id)?;
    tracing::info!(view_id = %view_id, id = %removed.id, "student removed");
    Ok(json!({
        "removed": removed,
        "view": snapshot_json(&view_id, view),
    }))
}

fn students_profile(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_id(params, "id")?;
    let (source, _) = require_workspace(state)?;

    let students: Vec<StudentRecord> = load_collection(source, Resource::Students)
        .map_err(|e| load_failed(Resource::Students, e))?;
    let Some(student) = students.into_iter().find(|s| s.id == id) else {
        return Err(HandlerErr::new("not_found", format!("student {id} not found")));
    };
    let results: Vec<ResultRecord> = load_collection(source, Resource::Results)
        .map_err(|e| load_failed(Resource::Results, e))?;
    let attendance: Vec<AttendanceRecord> = load_collection(source, Resource::Attendance)
        .map_err(|e| load_failed(Resource::Attendance, e))?;

    let own_results: Vec<&ResultRecord> = results.iter().filter(|r| r.student_id == id).collect();
    Ok(json!({
        "student": &student,
        "display": {
            "contact": student.contact_display(),
            "fatherName": student.father_name_display(),
            "motherName": student.mother_name_display(),
            "address": student.address_display(),
            "medicalConditions": student.medical_conditions_display(),
        },
        "results": own_results,
        "attendanceRate": aggregate::student_attendance_rate(&attendance, &student.admission_id),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => students_create(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        "students.profile" => students_profile(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
