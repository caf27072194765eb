//! Flat renderings of the aggregated payloads for bulk export: the full
//! JSON bundle plus CSV tables for spreadsheet consumers.

use std::path::Path;

use anyhow::Context;

use crate::models::{CompetencyDetail, ExportPayload, TrackSummary};

pub fn write_json(payload: &ExportPayload, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn detail_csv(detail: &CompetencyDetail) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "competency",
        "domain",
        "student_average",
        "advisor_average",
        "gap",
        "achieved",
        "not_met",
        "not_assessed",
        "total_students",
    ])?;

    for item in &detail.items {
        writer.write_record([
            item.name.clone(),
            item.domain_name.clone(),
            fmt_opt(item.student_average),
            fmt_opt(item.advisor_average),
            fmt_opt(item.gap),
            item.attainment.achieved_count.to_string(),
            item.attainment.not_met_count.to_string(),
            item.attainment.not_assessed_count.to_string(),
            item.attainment.total_students.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv buffer: {err}"))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn track_csv(tracks: &[TrackSummary]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "track",
        "student_average",
        "advisor_average",
        "gap",
        "submissions",
        "achieved",
        "not_met",
        "not_assessed",
        "total_students",
    ])?;

    for track in tracks {
        writer.write_record([
            track.track.clone(),
            fmt_opt(track.student_average),
            fmt_opt(track.advisor_average),
            fmt_opt(track.gap),
            track.submissions.to_string(),
            track.attainment.achieved_count.to_string(),
            track.attainment.not_met_count.to_string(),
            track.attainment.not_assessed_count.to_string(),
            track.attainment.total_students.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv buffer: {err}"))?;
    Ok(String::from_utf8(bytes)?)
}

/// Missing values render as empty cells, never as zero.
fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}
