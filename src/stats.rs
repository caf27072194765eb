//! Shared numeric vocabulary for every payload builder. "No data" is
//! always `None`, never `0.0` — dashboards render a dash for `None` and a
//! real zero would read as a score.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::models::{Attainment, ResponseRow, TimelinePoint};

/// Score a subject must average to count as having achieved a competency.
pub const TARGET_SCORE: f64 = 4.0;
/// Fraction of taxonomy competencies a student must achieve to meet the
/// program competency goal.
pub const GOAL_THRESHOLD: f64 = 0.85;
/// Program-level goal displayed next to the goal-attainment card.
pub const PROGRAM_GOAL_PERCENT: f64 = 80.0;

/// Widest disagreement a 1-5 rating scale allows. Gaps clamp here so the
/// alignment percent bottoms out at zero instead of going negative.
const MAX_RATING_GAP: f64 = 4.0;

const TREND_WINDOW_DAYS: i64 = 90;
const TIMELINE_MONTHS: usize = 3;

pub fn average(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn safe_percent(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator * 100.0)
}

/// How closely a student self-rating and an advisor rating agree on the
/// 5-point scale: identical averages score 100, the widest possible gap
/// scores 0. `None` if either side has no data.
pub fn alignment_percent(student: Option<f64>, advisor: Option<f64>) -> Option<f64> {
    let gap = (student? - advisor?).abs().min(MAX_RATING_GAP);
    Some((MAX_RATING_GAP - gap) / MAX_RATING_GAP * 100.0)
}

/// Whether one student's per-competency averages clear the program goal:
/// at least `GOAL_THRESHOLD` of the `competency_count`-item set must
/// average at or above `TARGET_SCORE`.
pub fn meets_goal(per_competency_averages: &[f64], competency_count: usize) -> bool {
    if competency_count == 0 {
        return false;
    }
    let achieved = per_competency_averages
        .iter()
        .filter(|avg| **avg >= TARGET_SCORE)
        .count();
    achieved as f64 / competency_count as f64 >= GOAL_THRESHOLD
}

/// Partition a grouping's students into achieved / not-met / not-assessed.
/// `per_student_scores` holds each assessed student's own scores within the
/// grouping; `total_students` is the full accessible denominator, so
/// students absent from the map land in `not_assessed`.
pub fn attainment(per_student_scores: &HashMap<i64, Vec<f64>>, total_students: usize) -> Attainment {
    let mut achieved = 0usize;
    let mut not_met = 0usize;

    for scores in per_student_scores.values() {
        match average(scores) {
            Some(avg) if avg >= TARGET_SCORE => achieved += 1,
            Some(_) => not_met += 1,
            None => {}
        }
    }

    let assessed = achieved + not_met;
    let not_assessed = total_students.saturating_sub(assessed);
    let total = total_students as f64;

    Attainment {
        achieved_count: achieved,
        not_met_count: not_met,
        not_assessed_count: not_assessed,
        achieved_percent: safe_percent(achieved as f64, total),
        not_met_percent: safe_percent(not_met as f64, total),
        not_assessed_percent: safe_percent(not_assessed as f64, total),
        total_students,
    }
}

/// Percent change between the trailing 90-day window and the 90 days
/// before that. `None` when either window is empty or the baseline mean
/// is zero.
pub fn trend_percent(rows: &[&ResponseRow], now: DateTime<Utc>) -> Option<f64> {
    let window = Duration::days(TREND_WINDOW_DAYS);
    let recent_cutoff = now - window;
    let previous_cutoff = recent_cutoff - window;

    let recent: Vec<f64> = rows
        .iter()
        .filter(|row| row.updated_at > recent_cutoff)
        .map(|row| row.score)
        .collect();
    let previous: Vec<f64> = rows
        .iter()
        .filter(|row| row.updated_at > previous_cutoff && row.updated_at <= recent_cutoff)
        .map(|row| row.score)
        .collect();

    let recent_mean = average(&recent)?;
    let previous_mean = average(&previous)?;
    if previous_mean == 0.0 {
        return None;
    }
    Some((recent_mean - previous_mean) / previous_mean * 100.0)
}

/// Bucket rows by calendar month in the viewer's time zone and keep the
/// 3 most recent months present, ascending. Month keys format as
/// `YYYY-MM`, so lexicographic order is chronological order.
pub fn monthly_timeline(rows: &[&ResponseRow], tz: FixedOffset) -> Vec<TimelinePoint> {
    let mut months: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

    for row in rows {
        let month = row.updated_at.with_timezone(&tz).format("%Y-%m").to_string();
        let bucket = months.entry(month).or_default();
        if row.is_advisor_entry {
            bucket.1.push(row.score);
        } else {
            bucket.0.push(row.score);
        }
    }

    let skip = months.len().saturating_sub(TIMELINE_MONTHS);
    months
        .into_iter()
        .skip(skip)
        .map(|(month, (student, advisor))| {
            let student_average = average(&student);
            let advisor_average = average(&advisor);
            TimelinePoint {
                month,
                alignment_percent: alignment_percent(student_average, advisor_average),
                student_average,
                advisor_average,
            }
        })
        .collect()
}
