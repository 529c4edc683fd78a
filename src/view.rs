//! Views bind one screen's source collections to its criteria set and run the
//! Source -> Filter -> Aggregate pipeline on every snapshot.

use crate::aggregate::{
    self, AttendanceSnapshot, AttendanceTrend, GradeDistribution, RankedStudent, SubjectAverage,
    TOP_PERFORMER_LIMIT,
};
use crate::filters::{CriteriaAction, CriteriaSet, Criterion, Dimension, FilterError, Filterable};
use crate::records::{
    AttendanceRecord, ExamRecord, FeeRecord, NoticePriority, NoticeRecord, RecordId, ResultRecord,
    SchoolConfig, StudentRecord, StudentStatus, TeacherRecord,
};
use crate::source::{load_collection, DataSource, Resource};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewError {
    pub code: String,
    pub message: String,
}

impl ViewError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<FilterError> for ViewError {
    fn from(e: FilterError) -> Self {
        Self {
            code: e.code,
            message: e.message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    StudentDirectory,
    ExamSchedule,
    FeeList,
    TeacherList,
    PerformanceAnalytics,
    AttendanceTrends,
    AttendanceSheet,
    NoticeBoard,
}

impl ViewKind {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(json!(raw)).ok()
    }
}

/// Starting values for required criteria, supplied when a view opens.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialValues {
    pub date: Option<NaiveDate>,
    pub grade: Option<String>,
    pub section: Option<String>,
}

fn pick_initial(
    dimension: Dimension,
    requested: Option<&str>,
    options: &[String],
) -> Result<String, FilterError> {
    match requested {
        Some(v) if options.iter().any(|o| o == v) => Ok(v.to_string()),
        Some(v) => Err(FilterError::new(
            "bad_params",
            format!("{:?} is not an allowed {}", v, dimension.as_str()),
        )),
        None => options.first().cloned().ok_or_else(|| {
            FilterError::new(
                "bad_params",
                format!("no {} options configured", dimension.as_str()),
            )
        }),
    }
}

pub fn default_criteria(
    kind: ViewKind,
    config: &SchoolConfig,
    initial: &InitialValues,
    today: NaiveDate,
) -> Result<CriteriaSet, FilterError> {
    let grade = || Criterion::optional(Dimension::Grade, &config.grades);
    let section = || Criterion::optional(Dimension::Section, &config.sections);

    let set = match kind {
        ViewKind::StudentDirectory => {
            CriteriaSet::new(Some("Search by name..."), vec![grade(), section()])
        }
        ViewKind::ExamSchedule => {
            CriteriaSet::new(Some("Search by subject..."), vec![grade(), section()])
        }
        ViewKind::FeeList => CriteriaSet::new(Some("Search by student..."), vec![grade()]),
        ViewKind::TeacherList => CriteriaSet::new(
            Some("Search by name..."),
            vec![Criterion::optional(Dimension::Subject, &config.subjects)],
        ),
        ViewKind::PerformanceAnalytics => {
            CriteriaSet::new(Some("Search by student..."), vec![grade(), section()])
        }
        ViewKind::AttendanceTrends => CriteriaSet::new(
            None,
            vec![Criterion::required(
                Dimension::Grade,
                config.grades.clone(),
                pick_initial(Dimension::Grade, initial.grade.as_deref(), &config.grades)?,
            )],
        ),
        ViewKind::AttendanceSheet => CriteriaSet::new(
            None,
            vec![
                Criterion::required(
                    Dimension::Date,
                    Vec::new(),
                    initial.date.unwrap_or(today).to_string(),
                ),
                Criterion::required(
                    Dimension::Grade,
                    config.grades.clone(),
                    pick_initial(Dimension::Grade, initial.grade.as_deref(), &config.grades)?,
                ),
                Criterion::required(
                    Dimension::Section,
                    config.sections.clone(),
                    pick_initial(
                        Dimension::Section,
                        initial.section.as_deref(),
                        &config.sections,
                    )?,
                ),
            ],
        ),
        ViewKind::NoticeBoard => CriteriaSet::new(None, Vec::new()),
    };
    Ok(set)
}

/// A result joined with its student's name so it can be searched by name.
#[derive(Debug, Clone)]
pub struct NamedResult {
    pub result: ResultRecord,
    pub student_name: Option<String>,
}

impl Filterable for NamedResult {
    fn search_key(&self) -> Option<&str> {
        self.student_name.as_deref()
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        self.result.dimension_value(dimension)
    }
}

pub fn filter_results(
    results: &[ResultRecord],
    students: &[StudentRecord],
    criteria: &CriteriaSet,
) -> Vec<ResultRecord> {
    let named: Vec<NamedResult> = results
        .iter()
        .map(|r| NamedResult {
            result: r.clone(),
            student_name: students
                .iter()
                .find(|s| s.id == r.student_id)
                .map(|s| s.name.clone()),
        })
        .collect();
    criteria
        .evaluate(&named)
        .into_iter()
        .map(|n| n.result)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub results: Vec<ResultRecord>,
    pub grade_distribution: GradeDistribution,
    pub top_performers: Vec<RankedStudent>,
    pub subject_averages: Vec<SubjectAverage>,
}

pub fn performance_report(
    results: &[ResultRecord],
    students: &[StudentRecord],
    criteria: &CriteriaSet,
) -> PerformanceReport {
    let filtered = filter_results(results, students, criteria);
    PerformanceReport {
        grade_distribution: aggregate::grade_distribution(&filtered),
        top_performers: aggregate::top_performers(&filtered, students, TOP_PERFORMER_LIMIT),
        subject_averages: aggregate::subject_averages(&filtered),
        results: filtered,
    }
}

pub fn trend_for(records: &[AttendanceRecord], criteria: &CriteriaSet) -> AttendanceTrend {
    aggregate::attendance_trend(records, criteria.value(Dimension::Grade).unwrap_or(""))
}

pub fn sheet_for(records: &[AttendanceRecord], criteria: &CriteriaSet) -> AttendanceSnapshot {
    let date = criteria
        .value(Dimension::Date)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    let grade = criteria.value(Dimension::Grade).unwrap_or("");
    let section = criteria.value(Dimension::Section).unwrap_or("");
    match date {
        Some(date) => aggregate::attendance_snapshot(records, date, grade, section),
        None => AttendanceSnapshot {
            found: false,
            stats: Default::default(),
            records: Vec::new(),
        },
    }
}

#[derive(Debug, Clone)]
pub enum ViewData {
    Students(Vec<StudentRecord>),
    Exams(Vec<ExamRecord>),
    Fees(Vec<FeeRecord>),
    Teachers(Vec<TeacherRecord>),
    Performance {
        results: Vec<ResultRecord>,
        students: Vec<StudentRecord>,
    },
    Attendance(Vec<AttendanceRecord>),
    Notices(Vec<NoticeRecord>),
}

fn fetch<T: serde::de::DeserializeOwned>(
    source: &dyn DataSource,
    resource: Resource,
) -> Result<Vec<T>, (Resource, anyhow::Error)> {
    load_collection(source, resource).map_err(|e| (resource, e))
}

fn load_data(kind: ViewKind, source: &dyn DataSource) -> Result<ViewData, (Resource, anyhow::Error)> {
    Ok(match kind {
        ViewKind::StudentDirectory => ViewData::Students(fetch(source, Resource::Students)?),
        ViewKind::ExamSchedule => ViewData::Exams(fetch(source, Resource::Exams)?),
        ViewKind::FeeList => ViewData::Fees(fetch(source, Resource::Fees)?),
        ViewKind::TeacherList => ViewData::Teachers(fetch(source, Resource::Teachers)?),
        ViewKind::PerformanceAnalytics => ViewData::Performance {
            results: fetch(source, Resource::Results)?,
            students: fetch(source, Resource::Students)?,
        },
        ViewKind::AttendanceTrends | ViewKind::AttendanceSheet => {
            let records: Vec<AttendanceRecord> = fetch(source, Resource::Attendance)?;
            for (date, grade, section) in aggregate::duplicate_attendance_keys(&records) {
                tracing::warn!(%date, %grade, %section, "duplicate attendance record; first one wins");
            }
            ViewData::Attendance(records)
        }
        ViewKind::NoticeBoard => ViewData::Notices(fetch(source, Resource::Notices)?),
    })
}

/// One-directional: `Loading` moves to `Ready` or `Failed` exactly once.
#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Ready(ViewData),
    Failed { message: String },
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::Loading => "loading",
            LoadState::Ready(_) => "ready",
            LoadState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub admission_id: String,
    pub name: String,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub medical_conditions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotice {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: NoticePriority,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub kind: ViewKind,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub criteria: CriteriaSet,
    pub reset_visible: bool,
    pub total: usize,
    pub matched: usize,
    pub rows: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct View {
    pub kind: ViewKind,
    criteria: CriteriaSet,
    state: LoadState,
    as_of: NaiveDate,
}

impl View {
    pub fn new(kind: ViewKind, criteria: CriteriaSet, as_of: NaiveDate) -> Self {
        Self {
            kind,
            criteria,
            state: LoadState::Loading,
            as_of,
        }
    }

    pub fn criteria(&self) -> &CriteriaSet {
        &self.criteria
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Fetches the view's sources. Only a loading view fetches; there is no retry.
    pub fn load(&mut self, source: &dyn DataSource) {
        if !matches!(self.state, LoadState::Loading) {
            return;
        }
        self.state = match load_data(self.kind, source) {
            Ok(data) => LoadState::Ready(data),
            Err((resource, e)) => {
                tracing::warn!(kind = ?self.kind, error = %format!("{e:#}"), "view load failed");
                LoadState::Failed {
                    message: resource.load_failed_message(),
                }
            }
        };
    }

    pub fn dispatch(&mut self, action: &CriteriaAction) -> Result<(), ViewError> {
        self.criteria = self.criteria.apply(action)?;
        Ok(())
    }

    fn students_mut(&mut self) -> Result<&mut Vec<StudentRecord>, ViewError> {
        match &mut self.state {
            LoadState::Ready(ViewData::Students(students)) => Ok(students),
            LoadState::Ready(_) => Err(ViewError::new(
                "bad_params",
                "view does not hold the student directory",
            )),
            _ => Err(ViewError::new("bad_params", "view is not ready")),
        }
    }

    /// In-memory add. Ids continue from the current maximum.
    pub fn add_student(&mut self, draft: NewStudent) -> Result<StudentRecord, ViewError> {
        for (field, value) in [
            ("name", &draft.name),
            ("admissionId", &draft.admission_id),
            ("grade", &draft.grade),
            ("section", &draft.section),
        ] {
            if value.trim().is_empty() {
                return Err(ViewError::new("bad_params", format!("missing student.{field}")));
            }
        }

        let students = self.students_mut()?;
        let admission_id = draft.admission_id.trim().to_string();
        if students.iter().any(|s| s.admission_id == admission_id) {
            return Err(ViewError::new(
                "bad_params",
                format!("admissionId {admission_id} already exists"),
            ));
        }
        let next_id = students.iter().map(|s| s.id.0).max().map(|m| m + 1).unwrap_or(1);

        let student = StudentRecord {
            id: RecordId(next_id),
            admission_id,
            name: draft.name.trim().to_string(),
            grade: draft.grade,
            section: draft.section,
            status: draft.status,
            father_name: draft.father_name,
            mother_name: draft.mother_name,
            contact: draft.contact,
            address: draft.address,
            email: draft.email,
            medical_conditions: draft.medical_conditions,
        };
        students.push(student.clone());
        Ok(student)
    }

    pub fn delete_student(&mut self, id: RecordId) -> Result<StudentRecord, ViewError> {
        let students = self.students_mut()?;
        let Some(idx) = students.iter().position(|s| s.id == id) else {
            return Err(ViewError::new("not_found", format!("student {id} not found")));
        };
        Ok(students.remove(idx))
    }

    fn notices_mut(&mut self) -> Result<&mut Vec<NoticeRecord>, ViewError> {
        match &mut self.state {
            LoadState::Ready(ViewData::Notices(notices)) => Ok(notices),
            LoadState::Ready(_) => Err(ViewError::new(
                "bad_params",
                "view does not hold the notice board",
            )),
            _ => Err(ViewError::new("bad_params", "view is not ready")),
        }
    }

    /// In-memory add; the newest notice is listed first.
    pub fn add_notice(&mut self, draft: NewNotice) -> Result<NoticeRecord, ViewError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ViewError::new("bad_params", "missing notice.title"));
        }
        let notice = NoticeRecord {
            title: title.to_string(),
            content: draft.content,
            priority: draft.priority,
            date: draft.date,
        };
        self.notices_mut()?.insert(0, notice.clone());
        Ok(notice)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let mut snap = ViewSnapshot {
            kind: self.kind,
            state: self.state.name(),
            error: None,
            criteria: self.criteria.clone(),
            reset_visible: self.criteria.is_reset_visible(),
            total: 0,
            matched: 0,
            rows: json!([]),
            aggregates: None,
        };

        let data = match &self.state {
            LoadState::Ready(data) => data,
            LoadState::Failed { message } => {
                snap.error = Some(message.clone());
                return snap;
            }
            LoadState::Loading => return snap,
        };

        let c = &self.criteria;
        match data {
            ViewData::Students(students) => {
                let rows = c.evaluate(students);
                snap.total = students.len();
                snap.matched = rows.len();
                snap.rows = json!(rows);
            }
            ViewData::Exams(exams) => {
                let rows = c.evaluate(exams);
                snap.total = exams.len();
                snap.matched = rows.len();
                snap.rows = json!(rows);
            }
            ViewData::Fees(fees) => {
                let rows = c.evaluate(fees);
                snap.total = fees.len();
                snap.matched = rows.len();
                snap.aggregates = Some(json!({
                    "feeSummary": aggregate::fee_summary(&rows, self.as_of),
                }));
                snap.rows = json!(rows);
            }
            ViewData::Teachers(teachers) => {
                let rows = c.evaluate(teachers);
                snap.total = teachers.len();
                snap.matched = rows.len();
                snap.rows = json!(rows);
            }
            ViewData::Performance { results, students } => {
                let report = performance_report(results, students, c);
                snap.total = results.len();
                snap.matched = report.results.len();
                snap.rows = json!(report.results);
                snap.aggregates = Some(json!({
                    "gradeDistribution": report.grade_distribution,
                    "topPerformers": report.top_performers,
                    "subjectAverages": report.subject_averages,
                }));
            }
            ViewData::Attendance(records) => {
                snap.total = records.len();
                if self.kind == ViewKind::AttendanceSheet {
                    let sheet = sheet_for(records, c);
                    snap.matched = sheet.records.len();
                    snap.rows = json!(sheet.records);
                    snap.aggregates = Some(json!({
                        "found": sheet.found,
                        "stats": sheet.stats,
                    }));
                } else {
                    let trend = trend_for(records, c);
                    snap.matched = trend.days.len();
                    snap.rows = json!(trend.days);
                    snap.aggregates = Some(json!({
                        "average": trend.average,
                        "bestDay": trend.best_day,
                        "worstDay": trend.worst_day,
                    }));
                }
            }
            ViewData::Notices(notices) => {
                snap.total = notices.len();
                snap.matched = notices.len();
                snap.rows = json!(notices
                    .iter()
                    .map(|n| json!({
                        "title": n.title,
                        "content": n.content,
                        "priority": n.priority,
                        "date": n.date_display(),
                    }))
                    .collect::<Vec<_>>());
            }
        }
        snap
    }
}
