use crate::aggregate;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_date, load_failed, require_workspace, today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::{
    AttendanceRecord, ExamRecord, FeeRecord, NoticeRecord, ResultRecord, StudentRecord,
};
use crate::source::{load_collection, FixtureDir, Resource};
use crate::view::{default_criteria, performance_report, InitialValues, ViewKind};
use serde::de::DeserializeOwned;
use serde_json::json;

fn load<T: DeserializeOwned>(source: &FixtureDir, resource: Resource) -> Result<Vec<T>, HandlerErr> {
    load_collection(source, resource).map_err(|e| load_failed(resource, e))
}

/// One-shot performance aggregates. `filters` is the flat object form
/// (`search`, `grade`, `section`); `"ALL"` or null leaves a criterion inactive.
fn analytics_performance(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (source, config) = require_workspace(state)?;
    let criteria = default_criteria(
        ViewKind::PerformanceAnalytics,
        config,
        &InitialValues::default(),
        today(),
    )?
    .with_filters(params.get("filters"))?;

    let results: Vec<ResultRecord> = load(source, Resource::Results)?;
    let students: Vec<StudentRecord> = load(source, Resource::Students)?;
    let report = performance_report(&results, &students, &criteria);

    Ok(json!({
        "criteria": criteria,
        "total": results.len(),
        "matched": report.results.len(),
        "gradeDistribution": report.grade_distribution,
        "topPerformers": report.top_performers,
        "subjectAverages": report.subject_averages,
    }))
}

fn analytics_dashboard(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let as_of = get_optional_date(params, "asOf")?.unwrap_or_else(today);
    let (source, _) = require_workspace(state)?;

    let students: Vec<StudentRecord> = load(source, Resource::Students)?;
    let attendance: Vec<AttendanceRecord> = load(source, Resource::Attendance)?;
    let exams: Vec<ExamRecord> = load(source, Resource::Exams)?;
    let notices: Vec<NoticeRecord> = load(source, Resource::Notices)?;
    let fees: Vec<FeeRecord> = load(source, Resource::Fees)?;

    Ok(json!({
        "summary": aggregate::dashboard_summary(&students, &attendance, &exams, &notices, as_of),
        "fees": aggregate::fee_summary(&fees, as_of),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "analytics.performance" => analytics_performance(state, &req.params),
        "analytics.dashboard" => analytics_dashboard(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
