use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Display fallback for optional contact-like fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Numeric record identifier.
///
/// Fixtures carry ids either as JSON numbers or as numeric strings; both parse
/// to the same value and comparison is plain integer equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(RecordId)
    }

    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Number(n) => n.as_u64().map(RecordId),
            serde_json::Value::String(s) => Self::parse(s),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(RecordId(n)),
            Raw::Text(s) => RecordId::parse(&s).ok_or_else(|| {
                serde::de::Error::custom(format!("id must be a non-negative integer, got {s:?}"))
            }),
        }
    }
}

fn or_not_available(v: &Option<String>) -> &str {
    v.as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NOT_AVAILABLE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: RecordId,
    pub admission_id: String,
    pub name: String,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<String>,
}

impl StudentRecord {
    pub fn contact_display(&self) -> &str {
        or_not_available(&self.contact)
    }

    pub fn father_name_display(&self) -> &str {
        or_not_available(&self.father_name)
    }

    pub fn mother_name_display(&self) -> &str {
        or_not_available(&self.mother_name)
    }

    pub fn address_display(&self) -> &str {
        or_not_available(&self.address)
    }

    pub fn medical_conditions_display(&self) -> &str {
        or_not_available(&self.medical_conditions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

fn default_remarks() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// Admission id of the student, not the numeric record id.
    pub student_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: AttendanceStatus,
    #[serde(default = "default_remarks")]
    pub remarks: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

impl AttendanceStats {
    pub fn tally(entries: &[AttendanceEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, e| {
            match e.status {
                AttendanceStatus::Present => acc.present += 1,
                AttendanceStatus::Absent => acc.absent += 1,
                AttendanceStatus::Late => acc.late += 1,
            }
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub records: Vec<AttendanceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<AttendanceStats>,
}

impl AttendanceRecord {
    /// Precomputed counts when the fixture carries them, otherwise a tally of the entries.
    pub fn stats(&self) -> AttendanceStats {
        self.stats
            .unwrap_or_else(|| AttendanceStats::tally(&self.records))
    }

    pub fn matches_key(&self, date: NaiveDate, grade: &str, section: &str) -> bool {
        self.date == date && self.grade == grade && self.section == section
    }
}

fn default_duration() -> String {
    "3 Hours".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: RecordId,
    pub subject: String,
    pub grade: String,
    pub section: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub room: String,
    #[serde(default = "default_duration")]
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub student_id: RecordId,
    pub grade: String,
    pub section: String,
    pub subject: String,
    pub marks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub student_name: String,
    pub grade: String,
    pub fee_type: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub status: FeeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoticePriority {
    High,
    Medium,
    #[default]
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRecord {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: NoticePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl NoticeRecord {
    pub fn date_display(&self) -> String {
        self.date
            .map(|d| d.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

/// Allowed value sets for the categorical criteria.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolConfig {
    pub grades: Vec<String>,
    pub sections: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_accepts_number_and_numeric_text() {
        let a: RecordId = serde_json::from_value(json!(7)).expect("number id");
        let b: RecordId = serde_json::from_value(json!("7")).expect("text id");
        assert_eq!(a, b);
        assert!(serde_json::from_value::<RecordId>(json!("seven")).is_err());
        assert_eq!(RecordId::from_json(&json!(" 12 ")), Some(RecordId(12)));
        assert_eq!(RecordId::from_json(&json!(-1)), None);
    }

    #[test]
    fn student_optional_fields_fall_back() {
        let s: StudentRecord = serde_json::from_value(json!({
            "id": 1,
            "admissionId": "ADM001",
            "name": "John Doe",
            "grade": "Grade 10",
            "section": "A",
            "contact": ""
        }))
        .expect("student");
        assert_eq!(s.status, StudentStatus::Active);
        assert_eq!(s.contact_display(), NOT_AVAILABLE);
        assert_eq!(s.medical_conditions_display(), NOT_AVAILABLE);
    }

    #[test]
    fn attendance_stats_tally_when_not_precomputed() {
        let r: AttendanceRecord = serde_json::from_value(json!({
            "date": "2025-12-20",
            "grade": "Grade 10",
            "section": "A",
            "records": [
                { "studentId": "ADM001", "status": "Present" },
                { "studentId": "ADM002", "status": "Late", "remarks": "bus" },
                { "studentId": "ADM003", "status": "Absent" }
            ]
        }))
        .expect("attendance");
        assert_eq!(r.records[0].remarks, "-");
        assert_eq!(
            r.stats(),
            AttendanceStats {
                present: 1,
                absent: 1,
                late: 1
            }
        );
    }
}
