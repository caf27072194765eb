use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One numeric answer by one subject, pre-joined with question, category,
/// survey, and student metadata. Rows whose raw value is non-numeric are
/// dropped during extraction and never reach this type.
#[derive(Debug, Clone)]
pub struct ResponseRow {
    pub score: f64,
    pub is_advisor_entry: bool,
    pub updated_at: DateTime<Utc>,
    pub category_id: i64,
    pub category_name: String,
    pub question_text: String,
    pub survey_id: i64,
    pub survey_title: String,
    pub survey_semester: String,
    pub track: String,
    pub student_id: i64,
    pub advisor_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct StudentRef {
    pub id: i64,
    pub name: String,
    pub track: String,
    pub advisor_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AdvisorRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SurveyAssignment {
    pub survey_id: i64,
    pub student_id: i64,
    pub submitted: bool,
}

/// The one bulk snapshot read per invocation. Everything downstream is a
/// pure computation over this value; nothing mutates it.
#[derive(Debug, Clone, Default)]
pub struct ReportDataset {
    pub rows: Vec<ResponseRow>,
    pub students: Vec<StudentRef>,
    pub advisors: Vec<AdvisorRef>,
    pub categories: Vec<CategoryRef>,
    pub assignments: Vec<SurveyAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Admin,
    Advisor,
    Student,
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub role: ViewerRole,
    pub id: Option<i64>,
    /// Restrict an advisor viewer to their own advisees instead of the
    /// whole roster.
    pub own_advisees_only: bool,
    /// Minutes east of UTC, used when bucketing the monthly timeline.
    pub utc_offset_minutes: i32,
}

/// The student and advisor identifiers a viewer is permitted to see,
/// computed once per invocation and passed down explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    pub student_ids: BTreeSet<i64>,
    pub advisor_ids: BTreeSet<i64>,
}

/// Raw filter input as it arrives from the outside (query parameters or
/// CLI flags): arbitrary strings, nothing validated yet.
#[derive(Debug, Clone, Default)]
pub struct RawFilters {
    pub track: Option<String>,
    pub semester: Option<String>,
    pub survey: Option<String>,
    pub category: Option<String>,
    pub student: Option<String>,
    pub advisor: Option<String>,
    pub competency: Option<String>,
}

/// Sanitized filter selection. A `None` field means "no constraint";
/// resolution never fails, it only degrades bad input to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSelection {
    pub track: Option<String>,
    pub semester: Option<String>,
    pub survey_id: Option<i64>,
    /// Canonical report domain slug resolved from a category id or name.
    pub domain: Option<String>,
    pub student_id: Option<i64>,
    pub advisor_id: Option<i64>,
    /// Taxonomy competency slug.
    pub competency: Option<String>,
}

// ---- payload view models ----

#[derive(Debug, Clone, Serialize)]
pub struct OptionItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonOption {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyOption {
    pub id: i64,
    pub name: String,
    pub semester: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub tracks: Vec<OptionItem>,
    pub semesters: Vec<OptionItem>,
    pub advisors: Vec<PersonOption>,
    pub categories: Vec<OptionItem>,
    pub surveys: Vec<SurveyOption>,
    pub students: Vec<PersonOption>,
    pub competencies: Vec<OptionItem>,
}

/// A dashboard summary card. Cards are only emitted when a value exists,
/// so `value` is never null in serialized output.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkCard {
    pub key: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub month: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub alignment_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Benchmark {
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub alignment_percent: Option<f64>,
    pub completion_rate: Option<f64>,
    pub goal_attainment_percent: Option<f64>,
    pub program_goal_percent: f64,
    pub sample_size_student: usize,
    pub sample_size_advisor: usize,
    pub cards: Vec<BenchmarkCard>,
    pub timeline: Vec<TimelinePoint>,
}

/// Achieved / not-met / not-assessed partition for one grouping. The three
/// counts always sum to `total_students`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Attainment {
    pub achieved_count: usize,
    pub not_met_count: usize,
    pub not_assessed_count: usize,
    pub achieved_percent: Option<f64>,
    pub not_met_percent: Option<f64>,
    pub not_assessed_percent: Option<f64>,
    pub total_students: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseBreakdown {
    pub survey_id: i64,
    pub title: String,
    pub semester: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub submissions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub id: String,
    pub name: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub gap: Option<f64>,
    pub change: Option<f64>,
    pub status: &'static str,
    #[serde(flatten)]
    pub attainment: Attainment,
    pub courses: Vec<CourseBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetencyItem {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub domain_name: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub gap: Option<f64>,
    #[serde(flatten)]
    pub attainment: Attainment,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetencyDetail {
    pub domains: Vec<DomainRef>,
    pub items: Vec<CompetencyItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub track: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub gap: Option<f64>,
    pub submissions: usize,
    #[serde(flatten)]
    pub attainment: Attainment,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub survey_id: i64,
    pub title: String,
    pub semester: String,
    pub student_average: Option<f64>,
    pub advisor_average: Option<f64>,
    pub gap: Option<f64>,
    pub submissions: usize,
    #[serde(flatten)]
    pub attainment: Attainment,
}

/// The full bundle consumed by spreadsheet and PDF exporters.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPayload {
    pub generated_at: DateTime<Utc>,
    pub filters: FilterSelection,
    pub benchmark: Benchmark,
    pub competency_summary: Vec<DomainSummary>,
    pub competency_detail: CompetencyDetail,
    pub course_summary: Vec<CourseSummary>,
    pub track_summary: Vec<TrackSummary>,
}
