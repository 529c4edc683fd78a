use crate::records::{RecordId, ResultRecord, StudentRecord};
use serde::Serialize;

pub const DEFAULT_MAX_MARKS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MarkCell {
    Empty,
    Valid { mark: u32 },
    /// Kept per row so the entry can be corrected; never graded.
    Invalid { input: String },
}

impl MarkCell {
    pub fn mark(&self) -> Option<u32> {
        match self {
            MarkCell::Valid { mark } => Some(*mark),
            _ => None,
        }
    }
}

pub fn parse_mark_input(raw: &str, max_marks: u32) -> MarkCell {
    let t = raw.trim();
    if t.is_empty() {
        return MarkCell::Empty;
    }
    match t.parse::<u32>() {
        Ok(mark) if mark <= max_marks => MarkCell::Valid { mark },
        _ => MarkCell::Invalid {
            input: raw.to_string(),
        },
    }
}

/// Letter shown beside an entered mark. Thresholds are exclusive, unlike the
/// analytics buckets.
pub fn entry_letter(mark: u32) -> char {
    match mark {
        m if m > 90 => 'A',
        m if m > 80 => 'B',
        m if m > 70 => 'C',
        m if m > 60 => 'D',
        m if m > 50 => 'E',
        _ => 'F',
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    pub student_id: RecordId,
    pub admission_id: String,
    pub name: String,
    pub cell: MarkCell,
    pub letter: Option<char>,
}

impl MarkRow {
    fn set(&mut self, cell: MarkCell) {
        self.letter = cell.mark().map(entry_letter);
        self.cell = cell;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksSheet {
    pub grade: String,
    pub section: String,
    pub subject: String,
    pub max_marks: u32,
    pub rows: Vec<MarkRow>,
}

impl MarksSheet {
    /// Rows for every student in (grade, section), prefilled from an existing
    /// result for the subject when there is one.
    pub fn prefill(
        students: &[StudentRecord],
        results: &[ResultRecord],
        grade: &str,
        section: &str,
        subject: &str,
        max_marks: u32,
    ) -> Self {
        let rows = students
            .iter()
            .filter(|s| s.grade == grade && s.section == section)
            .map(|s| {
                let cell = results
                    .iter()
                    .find(|r| r.student_id == s.id && r.subject == subject)
                    .map(|r| existing_cell(r.marks, max_marks))
                    .unwrap_or(MarkCell::Empty);
                let mut row = MarkRow {
                    student_id: s.id,
                    admission_id: s.admission_id.clone(),
                    name: s.name.clone(),
                    cell: MarkCell::Empty,
                    letter: None,
                };
                row.set(cell);
                row
            })
            .collect();

        Self {
            grade: grade.to_string(),
            section: section.to_string(),
            subject: subject.to_string(),
            max_marks,
            rows,
        }
    }

    pub fn bulk_set(&mut self, raw: &str) {
        let cell = parse_mark_input(raw, self.max_marks);
        for row in &mut self.rows {
            row.set(cell.clone());
        }
    }

    /// Returns false when no row belongs to `student_id`.
    pub fn set_input(&mut self, student_id: RecordId, raw: &str) -> bool {
        let cell = parse_mark_input(raw, self.max_marks);
        match self.rows.iter_mut().find(|r| r.student_id == student_id) {
            Some(row) => {
                row.set(cell);
                true
            }
            None => false,
        }
    }

    pub fn invalid_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.cell, MarkCell::Invalid { .. }))
            .count()
    }

    /// Results for the valid cells only.
    pub fn to_results(&self, stamp: &str) -> Vec<ResultRecord> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.cell.mark().map(|mark| ResultRecord {
                    student_id: row.student_id,
                    grade: self.grade.clone(),
                    section: self.section.clone(),
                    subject: self.subject.clone(),
                    marks: mark as f64,
                    date: Some(stamp.to_string()),
                })
            })
            .collect()
    }
}

fn existing_cell(marks: f64, max_marks: u32) -> MarkCell {
    if marks.fract() == 0.0 && marks >= 0.0 && marks <= max_marks as f64 {
        MarkCell::Valid { mark: marks as u32 }
    } else {
        MarkCell::Invalid {
            input: marks.to_string(),
        }
    }
}
