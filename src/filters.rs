use crate::records::{
    AttendanceRecord, ExamRecord, FeeRecord, ResultRecord, StudentRecord, TeacherRecord,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterError {
    pub code: String,
    pub message: String,
}

impl FilterError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// A categorical field a criterion can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Grade,
    Section,
    Subject,
    Date,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Grade => "grade",
            Dimension::Section => "section",
            Dimension::Subject => "subject",
            Dimension::Date => "date",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "grade" => Some(Dimension::Grade),
            "section" => Some(Dimension::Section),
            "subject" => Some(Dimension::Subject),
            "date" => Some(Dimension::Date),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Grade => "Grade",
            Dimension::Section => "Section",
            Dimension::Subject => "Subject",
            Dimension::Date => "Date",
        }
    }

    /// The "no-op" option shown first in an optional criterion's list.
    pub fn all_value(self) -> &'static str {
        match self {
            Dimension::Grade => "All Grades",
            Dimension::Section => "All Sections",
            Dimension::Subject => "All Subjects",
            Dimension::Date => "All Dates",
        }
    }
}

/// Record shapes the evaluator can filter.
pub trait Filterable {
    /// Field matched by the free-text search. `None` never matches an active search.
    fn search_key(&self) -> Option<&str>;

    /// Field value for a categorical criterion. `None` never matches an active criterion.
    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CriterionKind {
    /// Skipped while the value equals the default.
    Optional,
    /// Always constrains; the default is only what reset restores.
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub dimension: Dimension,
    pub label: String,
    pub value: String,
    /// Allowed values in display order. Empty means free-form (dates).
    pub options: Vec<String>,
    pub default_value: String,
    pub kind: CriterionKind,
}

impl Criterion {
    pub fn optional(dimension: Dimension, values: &[String]) -> Self {
        let all = dimension.all_value().to_string();
        let mut options = Vec::with_capacity(values.len() + 1);
        options.push(all.clone());
        options.extend(values.iter().filter(|v| **v != all).cloned());
        Self {
            dimension,
            label: dimension.label().to_string(),
            value: all.clone(),
            options,
            default_value: all,
            kind: CriterionKind::Optional,
        }
    }

    pub fn required(dimension: Dimension, options: Vec<String>, initial: String) -> Self {
        Self {
            dimension,
            label: dimension.label().to_string(),
            value: initial.clone(),
            options,
            default_value: initial,
            kind: CriterionKind::Required,
        }
    }

    pub fn is_active(&self) -> bool {
        match self.kind {
            CriterionKind::Required => true,
            CriterionKind::Optional => self.value != self.default_value,
        }
    }

    pub fn differs_from_default(&self) -> bool {
        self.value != self.default_value
    }

    /// The value as it will be stored, or `None` when it is not allowed.
    /// Dates are stored zero-padded so equal days compare equal.
    pub fn canonical(&self, value: &str) -> Option<String> {
        if self.dimension == Dimension::Date {
            return NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .ok()
                .map(|d| d.to_string());
        }
        if self.options.is_empty() || self.options.iter().any(|o| o == value) {
            return Some(value.to_string());
        }
        None
    }

    pub fn matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        if !self.is_active() {
            return true;
        }
        record
            .dimension_value(self.dimension)
            .map(|v| v == self.value.as_str())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriterion {
    pub label: String,
    pub term: String,
}

/// Transitions on a [`CriteriaSet`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CriteriaAction {
    SetSearch { term: String },
    Select { dimension: Dimension, value: String },
    Reset,
}

pub fn parse_action(raw: Option<&serde_json::Value>) -> Result<CriteriaAction, FilterError> {
    let Some(raw) = raw else {
        return Err(FilterError::new("bad_params", "missing action"));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| FilterError::new("bad_params", format!("invalid action: {e}")))
}

/// Immutable filter state of one view. Every transition returns a new value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchCriterion>,
    pub criteria: Vec<Criterion>,
}

impl CriteriaSet {
    pub fn new(search_label: Option<&str>, criteria: Vec<Criterion>) -> Self {
        Self {
            search: search_label.map(|label| SearchCriterion {
                label: label.to_string(),
                term: String::new(),
            }),
            criteria,
        }
    }

    pub fn search_term(&self) -> &str {
        self.search.as_ref().map(|s| s.term.as_str()).unwrap_or("")
    }

    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        self.criteria
            .iter()
            .find(|c| c.dimension == dimension)
            .map(|c| c.value.as_str())
    }

    pub fn apply(&self, action: &CriteriaAction) -> Result<CriteriaSet, FilterError> {
        let mut next = self.clone();
        match action {
            CriteriaAction::SetSearch { term } => {
                let Some(search) = next.search.as_mut() else {
                    return Err(FilterError::new(
                        "bad_params",
                        "this view has no search criterion",
                    ));
                };
                search.term = term.clone();
            }
            CriteriaAction::Select { dimension, value } => {
                let Some(criterion) = next.criteria.iter_mut().find(|c| c.dimension == *dimension)
                else {
                    return Err(FilterError::new(
                        "bad_params",
                        format!("this view has no {} criterion", dimension.as_str()),
                    ));
                };
                let Some(stored) = criterion.canonical(value) else {
                    return Err(FilterError::new(
                        "bad_params",
                        format!("{:?} is not an allowed {}", value, dimension.as_str()),
                    ));
                };
                criterion.value = stored;
            }
            CriteriaAction::Reset => {
                if let Some(search) = next.search.as_mut() {
                    search.term.clear();
                }
                for c in &mut next.criteria {
                    c.value = c.default_value.clone();
                }
            }
        }
        Ok(next)
    }

    /// Folds a flat `filters` object (`{"search": "...", "grade": "Grade 10", ...}`)
    /// into this set. `null`, empty and `"ALL"` leave a criterion at its default.
    pub fn with_filters(&self, raw: Option<&serde_json::Value>) -> Result<CriteriaSet, FilterError> {
        let Some(raw) = raw else {
            return Ok(self.clone());
        };
        if raw.is_null() {
            return Ok(self.clone());
        }
        let Some(obj) = raw.as_object() else {
            return Err(FilterError::new("bad_params", "filters must be an object"));
        };

        let mut next = self.clone();
        for (key, v) in obj {
            if v.is_null() {
                continue;
            }
            let Some(s) = v.as_str() else {
                return Err(FilterError::new(
                    "bad_params",
                    format!("filters.{key} must be string or null"),
                ));
            };
            if key == "search" {
                next = next.apply(&CriteriaAction::SetSearch {
                    term: s.to_string(),
                })?;
                continue;
            }
            let Some(dimension) = Dimension::parse(key) else {
                return Err(FilterError::new(
                    "bad_params",
                    format!("unknown filter {key}"),
                ));
            };
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("ALL") {
                continue;
            }
            next = next.apply(&CriteriaAction::Select {
                dimension,
                value: t.to_string(),
            })?;
        }
        Ok(next)
    }

    /// Derived: the reset affordance shows when anything differs from its default.
    pub fn is_reset_visible(&self) -> bool {
        !self.search_term().is_empty() || self.criteria.iter().any(|c| c.differs_from_default())
    }

    pub fn matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        self.search_matches(record) && self.criteria.iter().all(|c| c.matches(record))
    }

    fn search_matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        let term = self.search_term();
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        record
            .search_key()
            .map(|k| k.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }

    /// Stable conjunctive filter.
    pub fn evaluate<T: Filterable + Clone>(&self, records: &[T]) -> Vec<T> {
        records
            .iter()
            .filter(|r| self.matches(*r))
            .cloned()
            .collect()
    }
}

impl Filterable for StudentRecord {
    fn search_key(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Grade => Some(Cow::Borrowed(self.grade.as_str())),
            Dimension::Section => Some(Cow::Borrowed(self.section.as_str())),
            _ => None,
        }
    }
}

impl Filterable for ExamRecord {
    fn search_key(&self) -> Option<&str> {
        Some(&self.subject)
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Grade => Some(Cow::Borrowed(self.grade.as_str())),
            Dimension::Section => Some(Cow::Borrowed(self.section.as_str())),
            Dimension::Subject => Some(Cow::Borrowed(self.subject.as_str())),
            Dimension::Date => Some(Cow::Owned(self.date.to_string())),
            _ => None,
        }
    }
}

impl Filterable for FeeRecord {
    fn search_key(&self) -> Option<&str> {
        Some(&self.student_name)
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Grade => Some(Cow::Borrowed(self.grade.as_str())),
            _ => None,
        }
    }
}

impl Filterable for TeacherRecord {
    fn search_key(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Subject => Some(Cow::Borrowed(self.subject.as_str())),
            _ => None,
        }
    }
}

impl Filterable for AttendanceRecord {
    fn search_key(&self) -> Option<&str> {
        None
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Grade => Some(Cow::Borrowed(self.grade.as_str())),
            Dimension::Section => Some(Cow::Borrowed(self.section.as_str())),
            Dimension::Date => Some(Cow::Owned(self.date.to_string())),
            _ => None,
        }
    }
}

// Results are searched by student name, which needs a lookup; see `view::NamedResult`.
impl Filterable for ResultRecord {
    fn search_key(&self) -> Option<&str> {
        None
    }

    fn dimension_value(&self, dimension: Dimension) -> Option<Cow<'_, str>> {
        match dimension {
            Dimension::Grade => Some(Cow::Borrowed(self.grade.as_str())),
            Dimension::Section => Some(Cow::Borrowed(self.section.as_str())),
            Dimension::Subject => Some(Cow::Borrowed(self.subject.as_str())),
            _ => None,
        }
    }
}
