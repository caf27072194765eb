//! The reporting aggregator: one viewer's scoped snapshot plus one
//! resolved filter selection in, denormalized dashboard payloads out.
//! Pure and request-scoped; an instance is built per invocation and
//! discarded, so nothing here can leak between viewers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::models::{
    Attainment, Benchmark, BenchmarkCard, CompetencyDetail, CompetencyItem, CourseBreakdown,
    CourseSummary, DomainRef, DomainSummary, ExportPayload, FilterOptions, FilterSelection,
    OptionItem, PersonOption, ReportDataset, ResponseRow, StudentRef, SurveyOption, TrackSummary,
};
use crate::stats;
use crate::taxonomy;

pub struct Aggregator<'a> {
    filters: &'a FilterSelection,
    dataset: &'a ReportDataset,
    /// Rows surviving the filter selection; the single source of truth
    /// for every builder.
    rows: Vec<&'a ResponseRow>,
    /// Accessible students surviving the roster-level filters; the
    /// denominator behind every `total_students`.
    eligible: Vec<&'a StudentRef>,
    now: DateTime<Utc>,
    tz: FixedOffset,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        dataset: &'a ReportDataset,
        filters: &'a FilterSelection,
        now: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> Self {
        let tz = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        let rows = dataset.rows.iter().filter(|row| filters.matches(row)).collect();
        let eligible = dataset
            .students
            .iter()
            .filter(|student| filters.matches_student(student))
            .collect();

        Aggregator { filters, dataset, rows, eligible, now, tz }
    }

    /// The option universe comes from the viewer's full accessible
    /// dataset, not the filtered rows, so a user can always broaden
    /// their current selection.
    pub fn filter_options(&self) -> FilterOptions {
        let mut tracks: BTreeSet<&str> = self
            .dataset
            .students
            .iter()
            .map(|student| student.track.as_str())
            .collect();
        tracks.extend(self.dataset.rows.iter().map(|row| row.track.as_str()));

        let semesters: BTreeSet<&str> = self
            .dataset
            .rows
            .iter()
            .map(|row| row.survey_semester.as_str())
            .collect();

        let mut surveys: BTreeMap<i64, (&str, &str)> = BTreeMap::new();
        for row in &self.dataset.rows {
            surveys
                .entry(row.survey_id)
                .or_insert((row.survey_title.as_str(), row.survey_semester.as_str()));
        }

        let present_domains: BTreeSet<&'static str> = self
            .dataset
            .categories
            .iter()
            .filter_map(|category| taxonomy::domain_for_category(&category.name))
            .collect();

        FilterOptions {
            tracks: tracks
                .into_iter()
                .map(|track| OptionItem { id: taxonomy::slugify(track), name: track.to_string() })
                .collect(),
            semesters: semesters
                .into_iter()
                .map(|semester| OptionItem {
                    id: taxonomy::slugify(semester),
                    name: semester.to_string(),
                })
                .collect(),
            advisors: self
                .dataset
                .advisors
                .iter()
                .map(|advisor| PersonOption { id: advisor.id, name: advisor.name.clone() })
                .collect(),
            categories: taxonomy::REPORT_DOMAINS
                .iter()
                .filter(|domain| present_domains.contains(*domain))
                .map(|domain| OptionItem {
                    id: taxonomy::slugify(domain),
                    name: domain.to_string(),
                })
                .collect(),
            surveys: surveys
                .into_iter()
                .map(|(id, (title, semester))| SurveyOption {
                    id,
                    name: title.to_string(),
                    semester: semester.to_string(),
                })
                .collect(),
            students: self
                .dataset
                .students
                .iter()
                .map(|student| PersonOption { id: student.id, name: student.name.clone() })
                .collect(),
            competencies: taxonomy::TAXONOMY
                .iter()
                .map(|competency| OptionItem {
                    id: taxonomy::slugify(competency.title),
                    name: competency.title.to_string(),
                })
                .collect(),
        }
    }

    pub fn benchmark(&self) -> Benchmark {
        let student = student_scores(&self.rows);
        let advisor = advisor_scores(&self.rows);
        let student_average = stats::average(&student);
        let advisor_average = stats::average(&advisor);
        let alignment = stats::alignment_percent(student_average, advisor_average);
        let completion = self.completion_rate();
        let goal = self.goal_attainment_percent();

        let mut cards = Vec::new();
        if let Some(value) = student_average {
            cards.push(card("student_average", "Student self-rating average", value, "score", None));
        }
        if let Some(value) = advisor_average {
            cards.push(card("advisor_average", "Advisor rating average", value, "score", None));
        }
        if let Some(value) = alignment {
            cards.push(card("alignment", "Student/advisor alignment", value, "percent", None));
        }
        if let Some(value) = completion {
            cards.push(card("completion", "Survey completion rate", value, "percent", None));
        }
        if let Some(value) = goal {
            cards.push(card(
                "goal_attainment",
                "Students meeting competency goal",
                value,
                "percent",
                Some(stats::PROGRAM_GOAL_PERCENT),
            ));
        }

        Benchmark {
            student_average,
            advisor_average,
            alignment_percent: alignment,
            completion_rate: completion,
            goal_attainment_percent: goal,
            program_goal_percent: stats::PROGRAM_GOAL_PERCENT,
            sample_size_student: student.len(),
            sample_size_advisor: advisor.len(),
            cards,
            timeline: stats::monthly_timeline(&self.rows, self.tz),
        }
    }

    /// One rollup per canonical report domain present in the filtered
    /// rows, sorted by descending student average. Rows in categories
    /// outside the canonical domains do not appear here at all.
    pub fn competency_summary(&self) -> Vec<DomainSummary> {
        let mut groups: BTreeMap<&'static str, Vec<&ResponseRow>> = BTreeMap::new();
        for row in self.rows.iter().copied() {
            if let Some(domain) = taxonomy::domain_for_category(&row.category_name) {
                groups.entry(domain).or_default().push(row);
            }
        }

        let mut entries: Vec<DomainSummary> = groups
            .into_iter()
            .map(|(domain, rows)| self.domain_entry(domain, &rows))
            .collect();
        entries.sort_by(|a, b| {
            let left = b.student_average.unwrap_or(f64::NEG_INFINITY);
            let right = a.student_average.unwrap_or(f64::NEG_INFINITY);
            left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }

    /// Every taxonomy competency in fixed order, sparse or not. Advisor
    /// ratings arrive at category granularity, so each item's advisor
    /// average is the advisor average of its owning domain.
    pub fn competency_detail(&self) -> CompetencyDetail {
        let mut advisor_by_domain: HashMap<&'static str, Vec<f64>> = HashMap::new();
        for row in self.rows.iter().filter(|row| row.is_advisor_entry) {
            if let Some(domain) = taxonomy::domain_for_category(&row.category_name) {
                advisor_by_domain.entry(domain).or_default().push(row.score);
            }
        }

        let mut student_by_competency: HashMap<&'static str, Vec<&ResponseRow>> = HashMap::new();
        for row in self.rows.iter().copied().filter(|row| !row.is_advisor_entry) {
            if let Some(competency) = taxonomy::match_competency(&row.question_text) {
                student_by_competency
                    .entry(competency.title)
                    .or_default()
                    .push(row);
            }
        }

        let total_students = self.eligible.len();
        let items = taxonomy::TAXONOMY
            .iter()
            .map(|competency| {
                let competency_rows = student_by_competency
                    .get(competency.title)
                    .cloned()
                    .unwrap_or_default();
                let student_average = stats::average(&student_scores(&competency_rows));
                let advisor_average = advisor_by_domain
                    .get(competency.domain)
                    .and_then(|scores| stats::average(scores));
                let attainment =
                    stats::attainment(&per_student_scores(&competency_rows), total_students);

                CompetencyItem {
                    id: taxonomy::slugify(competency.title),
                    name: competency.title.to_string(),
                    domain_id: taxonomy::slugify(competency.domain),
                    domain_name: competency.domain.to_string(),
                    student_average,
                    advisor_average,
                    gap: gap(student_average, advisor_average),
                    attainment,
                }
            })
            .collect();

        CompetencyDetail {
            domains: taxonomy::REPORT_DOMAINS
                .iter()
                .map(|domain| DomainRef {
                    id: taxonomy::slugify(domain),
                    name: domain.to_string(),
                })
                .collect(),
            items,
        }
    }

    /// One rollup per distinct track in the filtered rows, sorted by
    /// track name. Denominators come from the accessible roster, so a
    /// track's students with no rows surface as not-assessed.
    pub fn track_summary(&self) -> Vec<TrackSummary> {
        let mut groups: BTreeMap<&str, Vec<&ResponseRow>> = BTreeMap::new();
        for row in self.rows.iter().copied() {
            groups.entry(row.track.as_str()).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(track, rows)| {
                let track_ids: BTreeSet<i64> = self
                    .eligible
                    .iter()
                    .filter(|student| student.track == track)
                    .map(|student| student.id)
                    .collect();
                let student_average = stats::average(&student_scores(&rows));
                let advisor_average = stats::average(&advisor_scores(&rows));
                let attainment =
                    stats::attainment(&per_student_scores(&rows), track_ids.len());

                TrackSummary {
                    id: taxonomy::slugify(track),
                    track: track.to_string(),
                    student_average,
                    advisor_average,
                    gap: gap(student_average, advisor_average),
                    submissions: self.submitted_count(&track_ids, None),
                    attainment,
                }
            })
            .collect()
    }

    /// One rollup per distinct survey in the filtered rows, sorted by
    /// title. Denominators are the accessible students assigned to that
    /// survey.
    pub fn course_summary(&self) -> Vec<CourseSummary> {
        let mut groups: BTreeMap<i64, (&str, &str, Vec<&ResponseRow>)> = BTreeMap::new();
        for row in self.rows.iter().copied() {
            groups
                .entry(row.survey_id)
                .or_insert((row.survey_title.as_str(), row.survey_semester.as_str(), Vec::new()))
                .2
                .push(row);
        }

        let eligible_ids = self.eligible_ids();
        let mut entries: Vec<CourseSummary> = groups
            .into_iter()
            .map(|(survey_id, (title, semester, rows))| {
                let assigned: BTreeSet<i64> = self
                    .dataset
                    .assignments
                    .iter()
                    .filter(|a| a.survey_id == survey_id && eligible_ids.contains(&a.student_id))
                    .map(|a| a.student_id)
                    .collect();

                let mut per_student = per_student_scores(&rows);
                per_student.retain(|student_id, _| assigned.contains(student_id));

                let student_average = stats::average(&student_scores(&rows));
                let advisor_average = stats::average(&advisor_scores(&rows));

                CourseSummary {
                    survey_id,
                    title: title.to_string(),
                    semester: semester.to_string(),
                    student_average,
                    advisor_average,
                    gap: gap(student_average, advisor_average),
                    submissions: self.submitted_count(&assigned, Some(survey_id)),
                    attainment: stats::attainment(&per_student, assigned.len()),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        entries
    }

    pub fn export_payload(&self) -> ExportPayload {
        ExportPayload {
            generated_at: self.now,
            filters: self.filters.clone(),
            benchmark: self.benchmark(),
            competency_summary: self.competency_summary(),
            competency_detail: self.competency_detail(),
            course_summary: self.course_summary(),
            track_summary: self.track_summary(),
        }
    }

    fn domain_entry(&self, domain: &'static str, rows: &[&'a ResponseRow]) -> DomainSummary {
        let student_average = stats::average(&student_scores(rows));
        let advisor_average = stats::average(&advisor_scores(rows));
        let attainment = stats::attainment(&per_student_scores(rows), self.eligible.len());

        DomainSummary {
            id: taxonomy::slugify(domain),
            name: domain.to_string(),
            student_average,
            advisor_average,
            gap: gap(student_average, advisor_average),
            change: stats::trend_percent(rows, self.now),
            status: status_for(&attainment),
            attainment,
            courses: self.course_breakdown(rows),
        }
    }

    fn course_breakdown(&self, rows: &[&'a ResponseRow]) -> Vec<CourseBreakdown> {
        let mut groups: BTreeMap<i64, (&str, &str, Vec<&ResponseRow>)> = BTreeMap::new();
        for row in rows.iter().copied() {
            groups
                .entry(row.survey_id)
                .or_insert((row.survey_title.as_str(), row.survey_semester.as_str(), Vec::new()))
                .2
                .push(row);
        }

        let eligible_ids = self.eligible_ids();
        groups
            .into_iter()
            .map(|(survey_id, (title, semester, survey_rows))| CourseBreakdown {
                survey_id,
                title: title.to_string(),
                semester: semester.to_string(),
                student_average: stats::average(&student_scores(&survey_rows)),
                advisor_average: stats::average(&advisor_scores(&survey_rows)),
                submissions: self
                    .dataset
                    .assignments
                    .iter()
                    .filter(|a| {
                        a.survey_id == survey_id
                            && a.submitted
                            && eligible_ids.contains(&a.student_id)
                    })
                    .count(),
            })
            .collect()
    }

    fn completion_rate(&self) -> Option<f64> {
        let eligible_ids = self.eligible_ids();
        let assigned: Vec<_> = self
            .dataset
            .assignments
            .iter()
            .filter(|a| eligible_ids.contains(&a.student_id))
            .filter(|a| self.filters.survey_id.map_or(true, |id| a.survey_id == id))
            .collect();
        let submitted = assigned.iter().filter(|a| a.submitted).count();
        stats::safe_percent(submitted as f64, assigned.len() as f64)
    }

    /// Percent of accessible students whose per-competency self-rating
    /// averages clear the program goal across the full taxonomy.
    fn goal_attainment_percent(&self) -> Option<f64> {
        let mut by_student: HashMap<i64, HashMap<&'static str, Vec<f64>>> = HashMap::new();
        for row in self.rows.iter().filter(|row| !row.is_advisor_entry) {
            if let Some(competency) = taxonomy::match_competency(&row.question_text) {
                by_student
                    .entry(row.student_id)
                    .or_default()
                    .entry(competency.title)
                    .or_default()
                    .push(row.score);
            }
        }

        let meeting = self
            .eligible
            .iter()
            .filter(|student| {
                by_student.get(&student.id).is_some_and(|by_competency| {
                    let averages: Vec<f64> = by_competency
                        .values()
                        .filter_map(|scores| stats::average(scores))
                        .collect();
                    stats::meets_goal(&averages, taxonomy::TAXONOMY.len())
                })
            })
            .count();

        stats::safe_percent(meeting as f64, self.eligible.len() as f64)
    }

    fn submitted_count(&self, student_ids: &BTreeSet<i64>, survey_id: Option<i64>) -> usize {
        self.dataset
            .assignments
            .iter()
            .filter(|a| {
                a.submitted
                    && student_ids.contains(&a.student_id)
                    && survey_id.map_or(true, |id| a.survey_id == id)
                    && self.filters.survey_id.map_or(true, |id| a.survey_id == id)
            })
            .count()
    }

    fn eligible_ids(&self) -> BTreeSet<i64> {
        self.eligible.iter().map(|student| student.id).collect()
    }
}

fn card(
    key: &'static str,
    label: &'static str,
    value: f64,
    unit: &'static str,
    goal: Option<f64>,
) -> BenchmarkCard {
    BenchmarkCard { key, label, value, unit, goal }
}

fn gap(student: Option<f64>, advisor: Option<f64>) -> Option<f64> {
    Some(student? - advisor?)
}

fn status_for(attainment: &Attainment) -> &'static str {
    match attainment.achieved_percent {
        None => "no_data",
        Some(p) if p >= stats::PROGRAM_GOAL_PERCENT => "on_target",
        Some(p) if p >= 50.0 => "progressing",
        _ => "needs_attention",
    }
}

fn student_scores(rows: &[&ResponseRow]) -> Vec<f64> {
    rows.iter()
        .filter(|row| !row.is_advisor_entry)
        .map(|row| row.score)
        .collect()
}

fn advisor_scores(rows: &[&ResponseRow]) -> Vec<f64> {
    rows.iter()
        .filter(|row| row.is_advisor_entry)
        .map(|row| row.score)
        .collect()
}

/// Each assessed student's own self-rating scores within a grouping.
fn per_student_scores(rows: &[&ResponseRow]) -> HashMap<i64, Vec<f64>> {
    let mut map: HashMap<i64, Vec<f64>> = HashMap::new();
    for row in rows.iter().filter(|row| !row.is_advisor_entry) {
        map.entry(row.student_id).or_default().push(row.score);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdvisorRef, CategoryRef, SurveyAssignment};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn row(
        student_id: i64,
        score: f64,
        is_advisor_entry: bool,
        category_name: &str,
        question_text: &str,
        survey_id: i64,
        track: &str,
        days_ago: i64,
    ) -> ResponseRow {
        ResponseRow {
            score,
            is_advisor_entry,
            updated_at: now() - Duration::days(days_ago),
            category_id: 1,
            category_name: category_name.to_string(),
            question_text: question_text.to_string(),
            survey_id,
            survey_title: format!("Survey {survey_id}"),
            survey_semester: "Spring 2026".to_string(),
            track: track.to_string(),
            student_id,
            advisor_id: Some(10),
        }
    }

    fn student(id: i64, name: &str, track: &str) -> StudentRef {
        StudentRef {
            id,
            name: name.to_string(),
            track: track.to_string(),
            advisor_id: Some(10),
        }
    }

    fn dataset(rows: Vec<ResponseRow>) -> ReportDataset {
        ReportDataset {
            rows,
            students: vec![
                student(1, "Avery Lee", "Residential"),
                student(2, "Jules Moreno", "Executive"),
                student(3, "Kiara Patel", "Residential"),
            ],
            advisors: vec![AdvisorRef { id: 10, name: "Dana Okafor".to_string() }],
            categories: vec![
                CategoryRef { id: 1, name: "Knowledge & Inquiry".to_string() },
                CategoryRef { id: 2, name: "Leadership & Practice".to_string() },
                CategoryRef { id: 3, name: "Evidence Portfolio".to_string() },
            ],
            assignments: vec![
                SurveyAssignment { survey_id: 1, student_id: 1, submitted: true },
                SurveyAssignment { survey_id: 1, student_id: 2, submitted: true },
                SurveyAssignment { survey_id: 1, student_id: 3, submitted: false },
            ],
        }
    }

    fn no_filters() -> FilterSelection {
        FilterSelection::default()
    }

    #[test]
    fn benchmark_averages_split_by_source() {
        let data = dataset(vec![
            row(1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(2, 5.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Executive", 5),
            row(1, 3.0, true, "Knowledge & Inquiry", "Knowledge & Inquiry", 1, "Residential", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let benchmark = agg.benchmark();
        assert_eq!(benchmark.student_average, Some(4.5));
        assert_eq!(benchmark.advisor_average, Some(3.0));
        assert_eq!(benchmark.sample_size_student, 2);
        assert_eq!(benchmark.sample_size_advisor, 1);
    }

    #[test]
    fn benchmark_omits_cards_without_values() {
        let data = dataset(vec![row(
            1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5,
        )]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let benchmark = agg.benchmark();
        assert_eq!(benchmark.advisor_average, None);
        assert_eq!(benchmark.alignment_percent, None);
        let keys: Vec<&str> = benchmark.cards.iter().map(|c| c.key).collect();
        assert!(keys.contains(&"student_average"));
        assert!(!keys.contains(&"advisor_average"));
        assert!(!keys.contains(&"alignment"));
    }

    #[test]
    fn empty_universe_yields_empty_payloads_not_errors() {
        let data = ReportDataset::default();
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let benchmark = agg.benchmark();
        assert!(benchmark.cards.is_empty());
        assert_eq!(benchmark.student_average, None);
        assert!(agg.competency_summary().is_empty());
        assert!(agg.track_summary().is_empty());
        // detail still lists the full taxonomy
        assert_eq!(agg.competency_detail().items.len(), 17);
    }

    #[test]
    fn non_canonical_categories_count_in_benchmark_only() {
        let data = dataset(vec![
            row(1, 2.0, false, "Evidence Portfolio", "Portfolio Evidence", 1, "Residential", 5),
            row(2, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Executive", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        // benchmark sees both rows
        assert_eq!(agg.benchmark().student_average, Some(3.0));

        // the summary only sees the canonical domain
        let summary = agg.competency_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].name, "Knowledge & Inquiry");

        // and the option list never offers the stray category
        let options = agg.filter_options();
        assert!(options.categories.iter().all(|c| c.name != "Evidence Portfolio"));
    }

    #[test]
    fn detail_always_lists_seventeen_competencies_in_order() {
        let data = dataset(vec![row(
            1, 4.5, false, "Leadership & Practice", "Project Management Reflection", 1,
            "Residential", 5,
        )]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let detail = agg.competency_detail();
        assert_eq!(detail.items.len(), 17);
        assert_eq!(detail.domains.len(), 4);
        for (item, competency) in detail.items.iter().zip(taxonomy::TAXONOMY.iter()) {
            assert_eq!(item.name, competency.title);
        }

        let project_management = detail
            .items
            .iter()
            .find(|item| item.id == "project_management")
            .unwrap();
        assert_eq!(project_management.student_average, Some(4.5));
        assert_eq!(project_management.attainment.achieved_count, 1);

        // untouched competencies carry nulls and a full not-assessed count
        let critical_thinking = detail
            .items
            .iter()
            .find(|item| item.id == "critical_thinking")
            .unwrap();
        assert_eq!(critical_thinking.student_average, None);
        assert_eq!(critical_thinking.attainment.not_assessed_count, 3);
    }

    #[test]
    fn detail_advisor_average_comes_from_owning_domain() {
        let data = dataset(vec![
            row(1, 4.0, false, "Leadership & Practice", "Project Management", 1, "Residential", 5),
            row(1, 3.0, true, "Leadership & Practice", "Leadership & Practice", 1, "Residential", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let detail = agg.competency_detail();
        let item = detail
            .items
            .iter()
            .find(|item| item.id == "project_management")
            .unwrap();
        assert_eq!(item.advisor_average, Some(3.0));
        assert_eq!(item.gap, Some(1.0));
    }

    #[test]
    fn attainment_partition_holds_per_track() {
        // two Residential students accessible, only one assessed
        let data = dataset(vec![
            row(1, 4.5, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(2, 2.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Executive", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let tracks = agg.track_summary();
        assert_eq!(tracks.len(), 2);
        // BTreeMap grouping: Executive sorts before Residential
        assert_eq!(tracks[0].track, "Executive");
        assert_eq!(tracks[1].track, "Residential");

        for track in &tracks {
            let att = &track.attainment;
            assert_eq!(
                att.achieved_count + att.not_met_count + att.not_assessed_count,
                att.total_students
            );
        }
        let residential = &tracks[1];
        assert_eq!(residential.attainment.total_students, 2);
        assert_eq!(residential.attainment.achieved_count, 1);
        assert_eq!(residential.attainment.not_assessed_count, 1);
    }

    #[test]
    fn summary_sorts_by_descending_student_average() {
        let data = dataset(vec![
            row(1, 3.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(1, 5.0, false, "Leadership & Practice", "Project Management", 1, "Residential", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let summary = agg.competency_summary();
        assert_eq!(summary[0].name, "Leadership & Practice");
        assert_eq!(summary[1].name, "Knowledge & Inquiry");
    }

    #[test]
    fn completion_rate_covers_the_accessible_assignment_set() {
        let data = dataset(vec![row(
            1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5,
        )]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        // 2 of 3 assignments submitted
        let completion = agg.benchmark().completion_rate.unwrap();
        assert!((completion - 66.666_666_666_666_67).abs() < 1e-9);
    }

    #[test]
    fn course_summary_uses_assigned_students_as_denominator() {
        let data = dataset(vec![
            row(1, 4.5, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let courses = agg.course_summary();
        assert_eq!(courses.len(), 1);
        let course = &courses[0];
        assert_eq!(course.attainment.total_students, 3);
        assert_eq!(course.attainment.achieved_count, 1);
        assert_eq!(course.attainment.not_assessed_count, 2);
        assert_eq!(course.submissions, 2);
    }

    #[test]
    fn filter_options_ignore_the_applied_filters() {
        let data = dataset(vec![
            row(1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(2, 3.0, false, "Knowledge & Inquiry", "Critical Thinking", 2, "Executive", 5),
        ]);
        let filters = FilterSelection {
            track: Some("Residential".to_string()),
            ..FilterSelection::default()
        };
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let options = agg.filter_options();
        let tracks: Vec<&str> = options.tracks.iter().map(|t| t.name.as_str()).collect();
        assert!(tracks.contains(&"Residential"));
        assert!(tracks.contains(&"Executive"));
        assert_eq!(options.surveys.len(), 2);
        assert_eq!(options.competencies.len(), 17);
    }

    #[test]
    fn track_filter_narrows_rows_but_keeps_partition() {
        let data = dataset(vec![
            row(1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(2, 3.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Executive", 5),
        ]);
        let filters = FilterSelection {
            track: Some("Residential".to_string()),
            ..FilterSelection::default()
        };
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let benchmark = agg.benchmark();
        assert_eq!(benchmark.student_average, Some(4.0));

        let summary = agg.competency_summary();
        assert_eq!(summary.len(), 1);
        // both Residential students in the denominator, one not assessed
        assert_eq!(summary[0].attainment.total_students, 2);
        assert_eq!(summary[0].attainment.not_assessed_count, 1);
    }

    #[test]
    fn export_payload_composes_every_section() {
        let data = dataset(vec![
            row(1, 4.0, false, "Knowledge & Inquiry", "Critical Thinking", 1, "Residential", 5),
            row(1, 3.5, true, "Knowledge & Inquiry", "Knowledge & Inquiry", 1, "Residential", 5),
        ]);
        let filters = no_filters();
        let agg = Aggregator::new(&data, &filters, now(), 0);

        let payload = agg.export_payload();
        assert_eq!(payload.generated_at, now());
        assert_eq!(payload.competency_detail.items.len(), 17);
        assert_eq!(payload.track_summary.len(), 1);
        assert_eq!(payload.course_summary.len(), 1);
        assert!(!payload.benchmark.cards.is_empty());
    }
}
