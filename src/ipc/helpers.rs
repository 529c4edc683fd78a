use crate::filters::FilterError;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::records::{RecordId, SchoolConfig};
use crate::source::FixtureDir;
use crate::view::ViewError;
use chrono::NaiveDate;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

// Filter and view codes are all drawn from the same small set.
fn static_code(code: &str) -> &'static str {
    match code {
        "not_found" => "not_found",
        "load_failed" => "load_failed",
        _ => "bad_params",
    }
}

impl From<FilterError> for HandlerErr {
    fn from(e: FilterError) -> Self {
        HandlerErr::new(static_code(&e.code), e.message)
    }
}

impl From<ViewError> for HandlerErr {
    fn from(e: ViewError) -> Self {
        HandlerErr::new(static_code(&e.code), e.message)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing params.{key}")))
}

pub fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(Some)
            .ok_or_else(|| {
                HandlerErr::new("bad_params", format!("params.{key} must be YYYY-MM-DD"))
            }),
    }
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    get_optional_date(params, key)?
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing params.{key}")))
}

pub fn get_required_id(params: &serde_json::Value, key: &str) -> Result<RecordId, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::new("bad_params", format!("missing params.{key}")));
    };
    RecordId::from_json(v).ok_or_else(|| {
        HandlerErr::new(
            "bad_params",
            format!("params.{key} must be a non-negative integer"),
        )
    })
}

pub fn require_workspace(state: &AppState) -> Result<(&FixtureDir, &SchoolConfig), HandlerErr> {
    match (&state.source, &state.config) {
        (Some(source), Some(config)) => Ok((source, config)),
        _ => Err(HandlerErr::new("no_workspace", "select a workspace first")),
    }
}

/// Loader failures are logged with their context; the caller sees the generic message.
pub fn load_failed(resource: crate::source::Resource, e: anyhow::Error) -> HandlerErr {
    tracing::warn!(resource = resource.name(), error = %format!("{e:#}"), "load failed");
    HandlerErr::new("load_failed", resource.load_failed_message())
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
