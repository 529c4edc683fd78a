use crate::records::{
    AttendanceEntry, AttendanceRecord, AttendanceStats, AttendanceStatus, ExamRecord, FeeRecord,
    FeeStatus, NoticeRecord, RecordId, ResultRecord, StudentRecord, StudentStatus,
    NOT_AVAILABLE,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const TOP_PERFORMER_LIMIT: usize = 5;

/// Half-up rounding to one decimal: `floor(10x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Whole-number percentage, half-up.
pub fn round_percent(x: f64) -> u32 {
    let r = (x + 0.5).floor();
    if r <= 0.0 {
        0
    } else {
        r as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

/// Distribution bucket for a mark. Lower bounds are inclusive.
pub fn bucket_for(marks: f64) -> LetterGrade {
    if marks >= 90.0 {
        LetterGrade::A
    } else if marks >= 80.0 {
        LetterGrade::B
    } else if marks >= 70.0 {
        LetterGrade::C
    } else if marks >= 60.0 {
        LetterGrade::D
    } else {
        LetterGrade::F
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
    #[serde(rename = "F")]
    pub f: usize,
}

#[cfg(test)]
impl GradeDistribution {
    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d + self.f
    }
}

pub fn grade_distribution(results: &[ResultRecord]) -> GradeDistribution {
    results
        .iter()
        .fold(GradeDistribution::default(), |mut dist, r| {
            match bucket_for(r.marks) {
                LetterGrade::A => dist.a += 1,
                LetterGrade::B => dist.b += 1,
                LetterGrade::C => dist.c += 1,
                LetterGrade::D => dist.d += 1,
                LetterGrade::F => dist.f += 1,
            }
            dist
        })
}

#[derive(Debug, Clone, Copy)]
struct MarksAccumulator {
    total: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl MarksAccumulator {
    fn new(first: f64) -> Self {
        Self {
            total: first,
            count: 1,
            min: first,
            max: first,
        }
    }

    fn push(&mut self, marks: f64) {
        self.total += marks;
        self.count += 1;
        self.min = self.min.min(marks);
        self.max = self.max.max(marks);
    }

    // Rounding can nudge a mean just past the extremes; clamp back.
    fn average(&self) -> f64 {
        round_off_1_decimal(self.total / (self.count as f64)).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: RecordId,
    pub name: String,
    pub average: f64,
}

pub fn student_display_name(students: &[StudentRecord], id: RecordId) -> String {
    students
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("ID: {id}"))
}

/// Ranked per-student averages. Groups are visited in ascending id order and the
/// sort is stable, so equal averages keep that order.
pub fn top_performers(
    results: &[ResultRecord],
    students: &[StudentRecord],
    limit: usize,
) -> Vec<RankedStudent> {
    let mut groups: BTreeMap<RecordId, MarksAccumulator> = BTreeMap::new();
    for r in results {
        groups
            .entry(r.student_id)
            .and_modify(|acc| acc.push(r.marks))
            .or_insert_with(|| MarksAccumulator::new(r.marks));
    }

    let mut ranked: Vec<RankedStudent> = groups
        .into_iter()
        .map(|(id, acc)| RankedStudent {
            student_id: id,
            name: student_display_name(students, id),
            average: acc.average(),
        })
        .collect();
    ranked.sort_by(|a, b| b.average.total_cmp(&a.average));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
}

/// One entry per subject, in the order subjects are first seen.
pub fn subject_averages(results: &[ResultRecord]) -> Vec<SubjectAverage> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, MarksAccumulator> = HashMap::new();
    for r in results {
        let subject = r.subject.as_str();
        match groups.get_mut(subject) {
            Some(acc) => acc.push(r.marks),
            None => {
                order.push(subject);
                groups.insert(subject, MarksAccumulator::new(r.marks));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|subject| {
            groups.get(subject).map(|acc| SubjectAverage {
                subject: subject.to_string(),
                average: acc.average(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    pub date: NaiveDate,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMark {
    /// `N/A` while the sentinel is still in place.
    pub date: String,
    pub percentage: u32,
}

impl DayMark {
    fn sentinel(percentage: u32) -> Self {
        Self {
            date: NOT_AVAILABLE.to_string(),
            percentage,
        }
    }
}

impl From<&DailyAttendance> for DayMark {
    fn from(d: &DailyAttendance) -> Self {
        Self {
            date: d.date.to_string(),
            percentage: d.percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTrend {
    pub grade: String,
    pub days: Vec<DailyAttendance>,
    pub average: u32,
    pub best_day: DayMark,
    pub worst_day: DayMark,
}

pub fn present_percentage(entries: &[AttendanceEntry]) -> Option<u32> {
    if entries.is_empty() {
        return None;
    }
    let present = entries
        .iter()
        .filter(|e| e.status == AttendanceStatus::Present)
        .count();
    Some(round_percent(
        100.0 * (present as f64) / (entries.len() as f64),
    ))
}

/// Daily present percentage for one grade, in source order. Records without
/// entries have no percentage and are left out.
pub fn attendance_trend(records: &[AttendanceRecord], grade: &str) -> AttendanceTrend {
    let days: Vec<DailyAttendance> = records
        .iter()
        .filter(|r| r.grade == grade)
        .filter_map(|r| {
            present_percentage(&r.records).map(|percentage| DailyAttendance {
                date: r.date,
                percentage,
            })
        })
        .collect();

    let average = if days.is_empty() {
        0
    } else {
        let sum: u32 = days.iter().map(|d| d.percentage).sum();
        round_percent((sum as f64) / (days.len() as f64))
    };

    let mut best: Option<&DailyAttendance> = None;
    let mut worst: Option<&DailyAttendance> = None;
    for d in &days {
        if best.map(|b| d.percentage > b.percentage).unwrap_or(true) {
            best = Some(d);
        }
        if worst.map(|w| d.percentage < w.percentage).unwrap_or(true) {
            worst = Some(d);
        }
    }

    AttendanceTrend {
        grade: grade.to_string(),
        average,
        best_day: best.map(DayMark::from).unwrap_or_else(|| DayMark::sentinel(0)),
        worst_day: worst
            .map(DayMark::from)
            .unwrap_or_else(|| DayMark::sentinel(100)),
        days,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSnapshot {
    pub found: bool,
    pub stats: AttendanceStats,
    pub records: Vec<AttendanceEntry>,
}

/// Composite-key lookup. A miss is an empty snapshot, not an error.
pub fn attendance_snapshot(
    records: &[AttendanceRecord],
    date: NaiveDate,
    grade: &str,
    section: &str,
) -> AttendanceSnapshot {
    match records.iter().find(|r| r.matches_key(date, grade, section)) {
        Some(r) => AttendanceSnapshot {
            found: true,
            stats: r.stats(),
            records: r.records.clone(),
        },
        None => AttendanceSnapshot {
            found: false,
            stats: AttendanceStats::default(),
            records: Vec::new(),
        },
    }
}

/// Keys that occur more than once. The lookup only ever sees the first.
pub fn duplicate_attendance_keys(records: &[AttendanceRecord]) -> Vec<(NaiveDate, String, String)> {
    let mut seen: HashMap<(NaiveDate, &str, &str), usize> = HashMap::new();
    for r in records {
        *seen
            .entry((r.date, r.grade.as_str(), r.section.as_str()))
            .or_insert(0) += 1;
    }
    let mut dups: Vec<(NaiveDate, String, String)> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|((d, g, s), _)| (d, g.to_string(), s.to_string()))
        .collect();
    dups.sort();
    dups
}

/// Percentage of "Present" entries across every record naming this admission
/// id, to two decimals. `None` when the student has no entries.
pub fn student_attendance_rate(records: &[AttendanceRecord], admission_id: &str) -> Option<f64> {
    let mut total = 0usize;
    let mut present = 0usize;
    for r in records
        .iter()
        .filter(|r| r.records.iter().any(|e| e.student_id == admission_id))
    {
        total += r.records.len();
        present += r
            .records
            .iter()
            .filter(|e| e.status == AttendanceStatus::Present)
            .count();
    }
    if total == 0 {
        return None;
    }
    Some(round_off_2_decimals(
        100.0 * (present as f64) / (total as f64),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub records: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub paid_amount: f64,
    pub outstanding_amount: f64,
    pub overdue_count: usize,
    pub as_of: NaiveDate,
}

pub fn fee_summary(fees: &[FeeRecord], as_of: NaiveDate) -> FeeSummary {
    let mut out = FeeSummary {
        records: fees.len(),
        paid_count: 0,
        unpaid_count: 0,
        paid_amount: 0.0,
        outstanding_amount: 0.0,
        overdue_count: 0,
        as_of,
    };
    for f in fees {
        match f.status {
            FeeStatus::Paid => {
                out.paid_count += 1;
                out.paid_amount += f.amount;
            }
            FeeStatus::Unpaid => {
                out.unpaid_count += 1;
                out.outstanding_amount += f.amount;
                if f.due_date < as_of {
                    out.overdue_count += 1;
                }
            }
        }
    }
    out.paid_amount = round_off_2_decimals(out.paid_amount);
    out.outstanding_amount = round_off_2_decimals(out.outstanding_amount);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub active_students: usize,
    pub avg_attendance: u32,
    pub upcoming_exams: usize,
    pub notices: usize,
    pub as_of: NaiveDate,
}

pub fn dashboard_summary(
    students: &[StudentRecord],
    attendance: &[AttendanceRecord],
    exams: &[ExamRecord],
    notices: &[NoticeRecord],
    as_of: NaiveDate,
) -> DashboardSummary {
    let entries: Vec<AttendanceEntry> = attendance
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();
    DashboardSummary {
        total_students: students.len(),
        active_students: students
            .iter()
            .filter(|s| s.status == StudentStatus::Active)
            .count(),
        avg_attendance: present_percentage(&entries).unwrap_or(0),
        upcoming_exams: exams.iter().filter(|e| e.date >= as_of).count(),
        notices: notices.len(),
        as_of,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::StudentStatus;
    use proptest::prelude::*;

    fn result(student_id: u64, subject: &str, marks: f64) -> ResultRecord {
        ResultRecord {
            student_id: RecordId(student_id),
            grade: "Grade 10".to_string(),
            section: "A".to_string(),
            subject: subject.to_string(),
            marks,
            date: None,
        }
    }

    fn student(id: u64, name: &str) -> StudentRecord {
        StudentRecord {
            id: RecordId(id),
            admission_id: format!("ADM{id:03}"),
            name: name.to_string(),
            grade: "Grade 10".to_string(),
            section: "A".to_string(),
            status: StudentStatus::Active,
            father_name: None,
            mother_name: None,
            contact: None,
            address: None,
            email: None,
            medical_conditions: None,
        }
    }

    fn entry(id: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: id.to_string(),
            name: None,
            status,
            remarks: "-".to_string(),
        }
    }

    fn day(date: &str, grade: &str, section: &str, entries: Vec<AttendanceEntry>) -> AttendanceRecord {
        AttendanceRecord {
            date: date.parse().expect("date"),
            grade: grade.to_string(),
            section: section.to_string(),
            records: entries,
            stats: None,
        }
    }

    fn scenario_results() -> Vec<ResultRecord> {
        vec![
            result(1, "Math", 95.0),
            result(1, "Science", 85.0),
            result(2, "Math", 40.0),
        ]
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(35.6818), 35.7);
        assert_eq!(round_percent(66.5), 67);
        assert_eq!(round_percent(66.4), 66);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(bucket_for(90.0), LetterGrade::A);
        assert_eq!(bucket_for(89.99), LetterGrade::B);
        assert_eq!(bucket_for(80.0), LetterGrade::B);
        assert_eq!(bucket_for(70.0), LetterGrade::C);
        assert_eq!(bucket_for(60.0), LetterGrade::D);
        assert_eq!(bucket_for(59.9), LetterGrade::F);
    }

    #[test]
    fn distribution_keeps_empty_buckets() {
        let dist = grade_distribution(&scenario_results());
        assert_eq!(
            dist,
            GradeDistribution {
                a: 1,
                b: 1,
                c: 0,
                d: 0,
                f: 1
            }
        );
        let json = serde_json::to_value(dist).expect("json");
        assert_eq!(json, serde_json::json!({ "A": 1, "B": 1, "C": 0, "D": 0, "F": 1 }));
        assert_eq!(grade_distribution(&[]).total(), 0);
    }

    #[test]
    fn top_performers_ranks_and_resolves_names() {
        let students = vec![student(1, "Ana"), student(2, "Ben")];
        let ranked = top_performers(&scenario_results(), &students, TOP_PERFORMER_LIMIT);
        let pairs: Vec<(String, f64)> = ranked.into_iter().map(|r| (r.name, r.average)).collect();
        assert_eq!(
            pairs,
            vec![("Ana".to_string(), 90.0), ("Ben".to_string(), 40.0)]
        );
    }

    #[test]
    fn top_performers_falls_back_to_id_label_and_truncates() {
        let results: Vec<ResultRecord> = (1..=7).map(|i| result(i, "Math", 50.0 + i as f64)).collect();
        let ranked = top_performers(&results, &[student(7, "Gus")], TOP_PERFORMER_LIMIT);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].name, "Gus");
        assert_eq!(ranked[1].name, "ID: 6");
        assert_eq!(ranked[4].student_id, RecordId(3));
    }

    #[test]
    fn top_performer_ties_keep_ascending_id_order() {
        let results = vec![result(9, "Math", 80.0), result(3, "Math", 80.0)];
        let ranked = top_performers(&results, &[], TOP_PERFORMER_LIMIT);
        assert_eq!(ranked[0].student_id, RecordId(3));
        assert_eq!(ranked[1].student_id, RecordId(9));
    }

    #[test]
    fn subject_averages_in_first_seen_order() {
        let mut results = scenario_results();
        results.push(result(3, "Science", 70.0));
        let avgs = subject_averages(&results);
        assert_eq!(
            avgs,
            vec![
                SubjectAverage {
                    subject: "Math".into(),
                    average: 67.5
                },
                SubjectAverage {
                    subject: "Science".into(),
                    average: 77.5
                },
            ]
        );
    }

    #[test]
    fn trend_uses_sentinels_only_without_data() {
        let empty = attendance_trend(&[], "Grade 10");
        assert_eq!(empty.average, 0);
        assert_eq!(empty.best_day, DayMark::sentinel(0));
        assert_eq!(empty.worst_day, DayMark::sentinel(100));

        let records = vec![
            day(
                "2025-12-18",
                "Grade 10",
                "A",
                vec![entry("a", AttendanceStatus::Absent)],
            ),
            day(
                "2025-12-19",
                "Grade 11",
                "A",
                vec![entry("b", AttendanceStatus::Present)],
            ),
        ];
        let t = attendance_trend(&records, "Grade 10");
        assert_eq!(t.days.len(), 1);
        assert_eq!(t.best_day.date, "2025-12-18");
        assert_eq!(t.best_day.percentage, 0);
        assert_eq!(t.worst_day.date, "2025-12-18");
    }

    #[test]
    fn trend_best_and_worst_days() {
        let records = vec![
            day(
                "2025-12-18",
                "Grade 10",
                "A",
                vec![
                    entry("a", AttendanceStatus::Present),
                    entry("b", AttendanceStatus::Present),
                    entry("c", AttendanceStatus::Late),
                ],
            ),
            day("2025-12-19", "Grade 10", "B", vec![]),
            day(
                "2025-12-20",
                "Grade 10",
                "A",
                vec![
                    entry("a", AttendanceStatus::Present),
                    entry("b", AttendanceStatus::Present),
                ],
            ),
        ];
        let t = attendance_trend(&records, "Grade 10");
        let pct: Vec<u32> = t.days.iter().map(|d| d.percentage).collect();
        assert_eq!(pct, vec![67, 100]);
        assert_eq!(t.average, 84);
        assert_eq!(t.best_day.date, "2025-12-20");
        assert_eq!(t.worst_day.date, "2025-12-18");
    }

    #[test]
    fn snapshot_hit_and_miss() {
        let mut hit = day(
            "2025-12-20",
            "Grade 10",
            "A",
            vec![
                entry("ADM001", AttendanceStatus::Present),
                entry("ADM002", AttendanceStatus::Present),
                entry("ADM003", AttendanceStatus::Absent),
            ],
        );
        hit.stats = Some(AttendanceStats {
            present: 2,
            absent: 1,
            late: 0,
        });
        let records = vec![hit];
        let date: NaiveDate = "2025-12-20".parse().expect("date");

        let found = attendance_snapshot(&records, date, "Grade 10", "A");
        assert!(found.found);
        assert_eq!(
            found.stats,
            AttendanceStats {
                present: 2,
                absent: 1,
                late: 0
            }
        );
        assert_eq!(found.records.len(), 3);

        let missing = attendance_snapshot(&records, date, "Grade 10", "B");
        assert!(!missing.found);
        assert_eq!(missing.stats, AttendanceStats::default());
        assert!(missing.records.is_empty());
    }

    #[test]
    fn duplicate_keys_are_reported() {
        let records = vec![
            day("2025-12-20", "Grade 10", "A", vec![]),
            day("2025-12-20", "Grade 10", "A", vec![]),
            day("2025-12-20", "Grade 10", "B", vec![]),
        ];
        let dups = duplicate_attendance_keys(&records);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].2, "A");
    }

    #[test]
    fn student_rate_counts_whole_records_containing_student() {
        let records = vec![
            day(
                "2025-12-18",
                "Grade 10",
                "A",
                vec![
                    entry("ADM001", AttendanceStatus::Present),
                    entry("ADM002", AttendanceStatus::Absent),
                    entry("ADM003", AttendanceStatus::Present),
                ],
            ),
            day(
                "2025-12-19",
                "Grade 10",
                "B",
                vec![entry("ADM009", AttendanceStatus::Present)],
            ),
        ];
        assert_eq!(student_attendance_rate(&records, "ADM001"), Some(66.67));
        assert_eq!(student_attendance_rate(&records, "ADM404"), None);
    }

    #[test]
    fn fee_summary_splits_paid_and_overdue() {
        let fee = |amount: f64, due: &str, status: FeeStatus| FeeRecord {
            id: None,
            student_name: "John Doe".into(),
            grade: "Grade 10".into(),
            fee_type: "Tuition".into(),
            amount,
            due_date: due.parse().expect("date"),
            status,
        };
        let fees = vec![
            fee(500.0, "2025-01-10", FeeStatus::Paid),
            fee(250.5, "2025-01-10", FeeStatus::Unpaid),
            fee(100.0, "2025-03-01", FeeStatus::Unpaid),
        ];
        let s = fee_summary(&fees, "2025-02-01".parse().expect("date"));
        assert_eq!(s.paid_count, 1);
        assert_eq!(s.unpaid_count, 2);
        assert_eq!(s.paid_amount, 500.0);
        assert_eq!(s.outstanding_amount, 350.5);
        assert_eq!(s.overdue_count, 1);
    }

    const SUBJECTS: &[&str] = &["Math", "Science", "English"];

    fn result_strategy() -> impl Strategy<Value = ResultRecord> {
        (
            1u64..8,
            prop::sample::select(SUBJECTS),
            0u32..=100,
        )
            .prop_map(|(id, subject, marks)| result(id, subject, marks as f64))
    }

    proptest! {
        #[test]
        fn bucket_counts_sum_to_input(results in prop::collection::vec(result_strategy(), 0..60)) {
            prop_assert_eq!(grade_distribution(&results).total(), results.len());
        }

        #[test]
        fn averages_stay_within_contributing_marks(results in prop::collection::vec(result_strategy(), 1..60)) {
            for avg in subject_averages(&results) {
                let marks: Vec<f64> = results
                    .iter()
                    .filter(|r| r.subject == avg.subject)
                    .map(|r| r.marks)
                    .collect();
                let lo = marks.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = marks.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(avg.average >= lo && avg.average <= hi);
            }
            for ranked in top_performers(&results, &[], usize::MAX) {
                let marks: Vec<f64> = results
                    .iter()
                    .filter(|r| r.student_id == ranked.student_id)
                    .map(|r| r.marks)
                    .collect();
                let lo = marks.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = marks.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(ranked.average >= lo && ranked.average <= hi);
            }
        }

        #[test]
        fn aggregation_is_pure(results in prop::collection::vec(result_strategy(), 0..40)) {
            prop_assert_eq!(subject_averages(&results), subject_averages(&results));
            prop_assert_eq!(
                top_performers(&results, &[], TOP_PERFORMER_LIMIT),
                top_performers(&results, &[], TOP_PERFORMER_LIMIT)
            );
        }
    }
}
