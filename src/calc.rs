//! Aggregation engine: report models computed from rows already fetched out
//! of the store.
//!
//! Everything here is a pure function of its arguments. Two averaging
//! conventions coexist and both are intentional:
//! - class averages are the mean of the (rounded) per-student percentages;
//! - subject comparison and rankings use the ratio of summed marks.

use crate::grading::{self, Grade, PassStatus};
use crate::model::{AssessmentType, MarkRow, Student, Subject};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Students listed in a class report's top-performers block.
pub const CLASS_TOP_COUNT: usize = 3;

fn serialize_grade_or_na<S: Serializer>(g: &Option<Grade>, s: S) -> Result<S::Ok, S::Error> {
    match g {
        Some(g) => s.serialize_str(g.as_str()),
        None => s.serialize_str("N/A"),
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn asc(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / (values.len() as f64)
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    grading::round2(part as f64 / whole as f64 * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDetail {
    pub mark_id: String,
    pub subject: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub assessment_date: NaiveDate,
    pub assessment_type: AssessmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_name: String,
    pub total_subjects: usize,
    pub total_marks_obtained: f64,
    pub total_max_marks: f64,
    pub overall_percentage: f64,
    #[serde(serialize_with = "serialize_grade_or_na")]
    pub overall_grade: Option<Grade>,
    pub pass_fail_status: PassStatus,
    pub subject_details: Vec<SubjectDetail>,
}

/// Report card for one student from that student's mark rows.
///
/// Each detail line is graded on its own mark; the overall figures use the
/// summed marks.
pub fn student_summary(marks: &[MarkRow]) -> StudentSummary {
    let Some(first) = marks.first() else {
        return StudentSummary {
            student_name: String::new(),
            total_subjects: 0,
            total_marks_obtained: 0.0,
            total_max_marks: 0.0,
            overall_percentage: 0.0,
            overall_grade: None,
            pass_fail_status: PassStatus::NoData,
            subject_details: Vec::new(),
        };
    };

    let total_obtained: f64 = marks.iter().map(|m| m.marks_obtained).sum();
    let total_max: f64 = marks.iter().map(|m| m.max_marks).sum();
    let overall = grading::percentage(total_obtained, total_max);

    let subject_details = marks
        .iter()
        .map(|m| {
            let pct = grading::percentage(m.marks_obtained, m.max_marks);
            SubjectDetail {
                mark_id: m.mark_id.clone(),
                subject: m.subject_name.clone(),
                marks_obtained: m.marks_obtained,
                max_marks: m.max_marks,
                percentage: pct,
                grade: grading::grade(pct),
                assessment_date: m.assessment_date,
                assessment_type: m.assessment_type,
            }
        })
        .collect();

    StudentSummary {
        student_name: first.student_name.clone(),
        total_subjects: marks.len(),
        total_marks_obtained: total_obtained,
        total_max_marks: total_max,
        overall_percentage: overall,
        overall_grade: Some(grading::grade(overall)),
        pass_fail_status: PassStatus::from_percentage(overall),
        subject_details,
    }
}

/// One student's summed marks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTotals {
    pub student_id: String,
    pub name: String,
    pub class_label: String,
    pub section: String,
    pub total_obtained: f64,
    pub total_max: f64,
    pub total_subjects: usize,
    pub percentage: f64,
    pub grade: Grade,
}

/// Per-student ratio-of-sums totals in roster order. Students without any
/// marks (zero summed maximum) are left out; marks of students outside the
/// roster are ignored.
pub fn student_totals(roster: &[Student], marks: &[MarkRow]) -> Vec<StudentTotals> {
    let mut sums: HashMap<&str, (f64, f64, usize)> = HashMap::new();
    for m in marks {
        let e = sums.entry(m.student_id.as_str()).or_insert((0.0, 0.0, 0));
        e.0 += m.marks_obtained;
        e.1 += m.max_marks;
        e.2 += 1;
    }

    roster
        .iter()
        .filter_map(|s| {
            let (obtained, max, count) = sums.get(s.id.as_str()).copied()?;
            if max <= 0.0 {
                return None;
            }
            let pct = grading::percentage(obtained, max);
            Some(StudentTotals {
                student_id: s.id.clone(),
                name: s.name.clone(),
                class_label: s.class_label.clone(),
                section: s.section.clone(),
                total_obtained: obtained,
                total_max: max,
                total_subjects: count,
                percentage: pct,
                grade: grading::grade(pct),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAnalytics {
    pub class_label: String,
    pub section: Option<String>,
    pub total_students: usize,
    pub students_with_marks: usize,
    pub class_average: f64,
    pub pass_count: usize,
    pub fail_count: usize,
    pub pass_percentage: f64,
    pub top_performers: Vec<StudentTotals>,
    pub student_summaries: Vec<StudentTotals>,
}

/// Class (optionally one section) report.
///
/// Student summaries are ordered by total obtained marks, highest first,
/// keeping roster order among equals. The top performers block re-sorts
/// that list by percentage with a stable sort and keeps the first three.
/// Students without marks are not counted anywhere, `total_students`
/// included.
pub fn class_analytics(
    class_label: &str,
    section: Option<&str>,
    roster: &[Student],
    marks: &[MarkRow],
) -> ClassAnalytics {
    let cohort: Vec<Student> = roster
        .iter()
        .filter(|s| s.class_label == class_label)
        .filter(|s| section.map(|sec| s.section == sec).unwrap_or(true))
        .cloned()
        .collect();

    let mut summaries = student_totals(&cohort, marks);
    summaries.sort_by(|a, b| desc(a.total_obtained, b.total_obtained));

    let with_marks = summaries.len();
    let percentages: Vec<f64> = summaries.iter().map(|s| s.percentage).collect();
    let pass_count = summaries
        .iter()
        .filter(|s| grading::is_pass(s.percentage))
        .count();

    let mut top = summaries.clone();
    top.sort_by(|a, b| desc(a.percentage, b.percentage));
    top.truncate(CLASS_TOP_COUNT);

    ClassAnalytics {
        class_label: class_label.to_string(),
        section: section.map(str::to_string),
        total_students: with_marks,
        students_with_marks: with_marks,
        class_average: grading::round2(mean(&percentages)),
        pass_count,
        fail_count: with_marks - pass_count,
        pass_percentage: share(pass_count, with_marks),
        top_performers: top,
        student_summaries: summaries,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject_id: String,
    pub subject: String,
    pub total_assessments: usize,
    pub avg_marks: f64,
    pub avg_percentage: f64,
    pub highest_marks: f64,
    pub lowest_marks: f64,
    pub grade: Grade,
}

/// Per-subject comparison, best average first. Subjects with no marks are
/// omitted.
pub fn subject_comparison(subjects: &[Subject], marks: &[MarkRow]) -> Vec<SubjectPerformance> {
    let mut by_subject: HashMap<&str, Vec<&MarkRow>> = HashMap::new();
    for m in marks {
        by_subject.entry(m.subject_id.as_str()).or_default().push(m);
    }

    let mut out: Vec<SubjectPerformance> = subjects
        .iter()
        .filter_map(|sub| {
            let rows = by_subject.get(sub.id.as_str())?;
            if rows.is_empty() {
                return None;
            }
            let obtained: Vec<f64> = rows.iter().map(|m| m.marks_obtained).collect();
            let total_obtained: f64 = obtained.iter().sum();
            let total_max: f64 = rows.iter().map(|m| m.max_marks).sum();
            let avg_pct = grading::percentage(total_obtained, total_max);
            let highest = obtained.iter().copied().fold(f64::MIN, f64::max);
            let lowest = obtained.iter().copied().fold(f64::MAX, f64::min);
            Some(SubjectPerformance {
                subject_id: sub.id.clone(),
                subject: sub.name.clone(),
                total_assessments: rows.len(),
                avg_marks: grading::round2(mean(&obtained)),
                avg_percentage: avg_pct,
                highest_marks: highest,
                lowest_marks: lowest,
                grade: grading::grade(avg_pct),
            })
        })
        .collect();

    out.sort_by(|a, b| desc(a.avg_percentage, b.avg_percentage));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub rank: usize,
    #[serde(flatten)]
    pub totals: StudentTotals,
}

/// Leaderboard: descending percentage, 1-based ranks without gaps. Equal
/// percentages keep their input order and still get distinct ranks.
pub fn top_performers(totals: &[StudentTotals], limit: usize) -> Vec<RankedStudent> {
    let mut sorted = totals.to_vec();
    sorted.sort_by(|a, b| desc(a.percentage, b.percentage));
    sorted
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, totals)| RankedStudent { rank: i + 1, totals })
        .collect()
}

/// Students strictly below `threshold`, lowest percentage first.
pub fn failing_students(totals: &[StudentTotals], threshold: f64) -> Vec<StudentTotals> {
    let mut out: Vec<StudentTotals> = totals
        .iter()
        .filter(|t| t.percentage < threshold)
        .cloned()
        .collect();
    out.sort_by(|a, b| asc(a.percentage, b.percentage));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

fn count_grades<I: IntoIterator<Item = Grade>>(grades: I) -> Vec<GradeCount> {
    let mut counts: HashMap<Grade, usize> = HashMap::new();
    for g in grades {
        *counts.entry(g).or_default() += 1;
    }
    Grade::ALL
        .iter()
        .map(|g| GradeCount {
            grade: *g,
            count: counts.get(g).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDistribution {
    pub grade_counts: Vec<GradeCount>,
    pub student_grades: Vec<StudentTotals>,
    pub total_students: usize,
}

pub fn grade_distribution(roster: &[Student], marks: &[MarkRow]) -> GradeDistribution {
    let students = student_totals(roster, marks);
    GradeDistribution {
        grade_counts: count_grades(students.iter().map(|s| s.grade)),
        total_students: students.len(),
        student_grades: students,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortPerformance {
    pub class_label: String,
    pub section: String,
    pub total_students: usize,
    pub students_with_marks: usize,
    pub total_assessments: usize,
    pub avg_percentage: f64,
    pub pass_count: usize,
    pub pass_percentage: f64,
}

/// One row per (class, section) present in the roster, in label order.
/// `avg_percentage` averages individual marks; pass counts are per student.
pub fn class_wise_performance(roster: &[Student], marks: &[MarkRow]) -> Vec<CohortPerformance> {
    let mut cohorts: BTreeMap<(&str, &str), Vec<Student>> = BTreeMap::new();
    for s in roster {
        cohorts
            .entry((s.class_label.as_str(), s.section.as_str()))
            .or_default()
            .push(s.clone());
    }

    cohorts
        .into_iter()
        .map(|((class_label, section), members)| {
            let cohort_marks: Vec<MarkRow> = marks
                .iter()
                .filter(|m| members.iter().any(|s| s.id == m.student_id))
                .cloned()
                .collect();
            let per_mark: Vec<f64> = cohort_marks
                .iter()
                .map(|m| grading::percentage(m.marks_obtained, m.max_marks))
                .collect();
            let totals = student_totals(&members, &cohort_marks);
            let pass_count = totals
                .iter()
                .filter(|t| grading::is_pass(t.percentage))
                .count();
            CohortPerformance {
                class_label: class_label.to_string(),
                section: section.to_string(),
                total_students: members.len(),
                students_with_marks: totals.len(),
                total_assessments: cohort_marks.len(),
                avg_percentage: grading::round2(mean(&per_mark)),
                pass_count,
                pass_percentage: share(pass_count, totals.len()),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub assessment_date: NaiveDate,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTrend {
    pub subject: String,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTrends {
    pub has_data: bool,
    pub total_assessments: usize,
    pub subject_trends: Vec<SubjectTrend>,
}

/// One student's marks grouped by subject, newest first within each group.
/// Groups appear in the order of their most recent mark.
pub fn student_trends(marks: &[MarkRow]) -> StudentTrends {
    let mut sorted: Vec<&MarkRow> = marks.iter().collect();
    sorted.sort_by(|a, b| b.assessment_date.cmp(&a.assessment_date));

    let mut trends: Vec<SubjectTrend> = Vec::new();
    for m in sorted {
        let point = TrendPoint {
            marks_obtained: m.marks_obtained,
            max_marks: m.max_marks,
            assessment_date: m.assessment_date,
            percentage: grading::percentage(m.marks_obtained, m.max_marks),
        };
        match trends.iter_mut().find(|t| t.subject == m.subject_name) {
            Some(t) => t.points.push(point),
            None => trends.push(SubjectTrend {
                subject: m.subject_name.clone(),
                points: vec![point],
            }),
        }
    }

    StudentTrends {
        has_data: !marks.is_empty(),
        total_assessments: marks.len(),
        subject_trends: trends,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_students: usize,
    pub total_subjects: usize,
    pub total_assessments: usize,
    pub students_with_marks: usize,
    pub overall_average: f64,
    pub pass_rate: f64,
    pub mark_grade_counts: Vec<GradeCount>,
}

/// Dashboard figures. Averages and the pass rate are taken over individual
/// marks.
pub fn overview(students: &[Student], subjects: &[Subject], marks: &[MarkRow]) -> OverviewStats {
    let per_mark: Vec<f64> = marks
        .iter()
        .map(|m| grading::percentage(m.marks_obtained, m.max_marks))
        .collect();
    let passing = per_mark.iter().filter(|p| grading::is_pass(**p)).count();
    let mut with_marks: Vec<&str> = marks.iter().map(|m| m.student_id.as_str()).collect();
    with_marks.sort_unstable();
    with_marks.dedup();

    OverviewStats {
        total_students: students.len(),
        total_subjects: subjects.len(),
        total_assessments: marks.len(),
        students_with_marks: with_marks.len(),
        overall_average: grading::round2(mean(&per_mark)),
        pass_rate: share(passing, marks.len()),
        mark_grade_counts: count_grades(per_mark.iter().map(|p| grading::grade(*p))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub total_subjects: usize,
    pub subjects_with_marks: usize,
    pub most_popular_subject: String,
    pub most_popular_count: usize,
}

pub fn subject_stats(subjects: &[Subject], marks: &[MarkRow]) -> SubjectStats {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in marks {
        *counts.entry(m.subject_id.as_str()).or_default() += 1;
    }

    let mut best: Option<(&Subject, usize)> = None;
    for sub in subjects {
        let n = counts.get(sub.id.as_str()).copied().unwrap_or(0);
        if n > 0 && best.map(|(_, b)| n > b).unwrap_or(true) {
            best = Some((sub, n));
        }
    }

    SubjectStats {
        total_subjects: subjects.len(),
        subjects_with_marks: subjects
            .iter()
            .filter(|s| counts.contains_key(s.id.as_str()))
            .count(),
        most_popular_subject: best
            .map(|(s, _)| s.name.clone())
            .unwrap_or_else(|| "N/A".to_string()),
        most_popular_count: best.map(|(_, n)| n).unwrap_or(0),
    }
}
