//! Row-source collaborator. All reads are bulk reads with the access
//! scope pushed into SQL; the aggregator never goes back to the store
//! mid-computation.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};

use crate::models::{
    AccessScope, AdvisorRef, CategoryRef, ReportDataset, ResponseRow, StudentRef, SurveyAssignment,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Accept a raw response value as a score only if it looks like a plain
/// integer or decimal (optional leading minus). Free text, evidence
/// links, and blanks yield no score; they are excluded, never zero.
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !looks_numeric(trimmed) {
        return None;
    }
    trimmed.parse().ok()
}

fn looks_numeric(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    if unsigned.is_empty() {
        return false;
    }
    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match fraction {
        None => true,
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
    }
}

pub async fn fetch_roster(pool: &PgPool) -> anyhow::Result<(Vec<StudentRef>, Vec<AdvisorRef>)> {
    let student_rows = sqlx::query(
        "SELECT id, full_name, track, advisor_id \
         FROM competency_reports.students ORDER BY full_name",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch student roster")?;

    let students = student_rows
        .into_iter()
        .map(|row| StudentRef {
            id: row.get("id"),
            name: row.get("full_name"),
            track: row.get("track"),
            advisor_id: row.get("advisor_id"),
        })
        .collect();

    let advisor_rows = sqlx::query(
        "SELECT id, full_name FROM competency_reports.advisors ORDER BY full_name",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch advisor roster")?;

    let advisors = advisor_rows
        .into_iter()
        .map(|row| AdvisorRef { id: row.get("id"), name: row.get("full_name") })
        .collect();

    Ok((students, advisors))
}

pub async fn fetch_categories(pool: &PgPool) -> anyhow::Result<Vec<CategoryRef>> {
    let rows = sqlx::query("SELECT id, name FROM competency_reports.categories ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to fetch categories")?;

    Ok(rows
        .into_iter()
        .map(|row| CategoryRef { id: row.get("id"), name: row.get("name") })
        .collect())
}

/// Assemble the per-invocation snapshot: the scoped roster plus the
/// normalized rows from both sources and the assignment universe.
pub async fn fetch_dataset(
    pool: &PgPool,
    scope: &AccessScope,
    students: Vec<StudentRef>,
    advisors: Vec<AdvisorRef>,
    categories: Vec<CategoryRef>,
) -> anyhow::Result<ReportDataset> {
    let student_ids: Vec<i64> = scope.student_ids.iter().copied().collect();

    let students: Vec<StudentRef> = students
        .into_iter()
        .filter(|student| scope.student_ids.contains(&student.id))
        .collect();
    let advisors: Vec<AdvisorRef> = advisors
        .into_iter()
        .filter(|advisor| scope.advisor_ids.contains(&advisor.id))
        .collect();

    let mut rows = fetch_student_rows(pool, &student_ids).await?;
    rows.extend(fetch_advisor_rows(pool, &student_ids).await?);
    let assignments = fetch_assignments(pool, &student_ids).await?;

    Ok(ReportDataset { rows, students, advisors, categories, assignments })
}

async fn fetch_student_rows(pool: &PgPool, student_ids: &[i64]) -> anyhow::Result<Vec<ResponseRow>> {
    let records = sqlx::query(
        "SELECT r.student_id, r.raw_value, r.updated_at, \
                q.prompt, c.id AS category_id, c.name AS category_name, \
                s.id AS survey_id, s.title AS survey_title, s.semester AS survey_semester, \
                st.track, st.advisor_id \
         FROM competency_reports.responses r \
         JOIN competency_reports.questions q ON q.id = r.question_id \
         JOIN competency_reports.categories c ON c.id = q.category_id \
         JOIN competency_reports.surveys s ON s.id = q.survey_id \
         JOIN competency_reports.students st ON st.id = r.student_id \
         WHERE r.student_id = ANY($1)",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch student responses")?;

    let mut rows = Vec::new();
    for record in records {
        let raw_value: String = record.get("raw_value");
        let Some(score) = parse_score(&raw_value) else {
            continue;
        };
        rows.push(ResponseRow {
            score,
            is_advisor_entry: false,
            updated_at: record.get("updated_at"),
            category_id: record.get("category_id"),
            category_name: record.get("category_name"),
            question_text: record.get("prompt"),
            survey_id: record.get("survey_id"),
            survey_title: record.get("survey_title"),
            survey_semester: record.get("survey_semester"),
            track: record.get("track"),
            student_id: record.get("student_id"),
            advisor_id: record.get("advisor_id"),
        });
    }
    Ok(rows)
}

async fn fetch_advisor_rows(pool: &PgPool, student_ids: &[i64]) -> anyhow::Result<Vec<ResponseRow>> {
    let records = sqlx::query(
        "SELECT a.student_id, a.advisor_id, a.raw_value, a.updated_at, \
                c.id AS category_id, c.name AS category_name, \
                s.id AS survey_id, s.title AS survey_title, s.semester AS survey_semester, \
                st.track \
         FROM competency_reports.advisor_category_scores a \
         JOIN competency_reports.categories c ON c.id = a.category_id \
         JOIN competency_reports.surveys s ON s.id = a.survey_id \
         JOIN competency_reports.students st ON st.id = a.student_id \
         WHERE a.student_id = ANY($1)",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch advisor category scores")?;

    let mut rows = Vec::new();
    for record in records {
        let raw_value: String = record.get("raw_value");
        let Some(score) = parse_score(&raw_value) else {
            continue;
        };
        // advisor entries carry category granularity; the category name
        // doubles as the question text
        let category_name: String = record.get("category_name");
        rows.push(ResponseRow {
            score,
            is_advisor_entry: true,
            updated_at: record.get("updated_at"),
            category_id: record.get("category_id"),
            question_text: category_name.clone(),
            category_name,
            survey_id: record.get("survey_id"),
            survey_title: record.get("survey_title"),
            survey_semester: record.get("survey_semester"),
            track: record.get("track"),
            student_id: record.get("student_id"),
            advisor_id: record.get("advisor_id"),
        });
    }
    Ok(rows)
}

async fn fetch_assignments(
    pool: &PgPool,
    student_ids: &[i64],
) -> anyhow::Result<Vec<SurveyAssignment>> {
    let records = sqlx::query(
        "SELECT survey_id, student_id, submitted \
         FROM competency_reports.survey_assignments \
         WHERE student_id = ANY($1)",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch survey assignments")?;

    Ok(records
        .into_iter()
        .map(|record| SurveyAssignment {
            survey_id: record.get("survey_id"),
            student_id: record.get("student_id"),
            submitted: record.get("submitted"),
        })
        .collect())
}

async fn upsert_advisor(pool: &PgPool, name: &str, email: &str) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO competency_reports.advisors (full_name, email)
        VALUES ($1, $2)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_student(
    pool: &PgPool,
    name: &str,
    email: &str,
    track: &str,
    advisor_id: i64,
) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO competency_reports.students (full_name, email, track, advisor_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, track = EXCLUDED.track,
            advisor_id = EXCLUDED.advisor_id
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(track)
    .bind(advisor_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_category(pool: &PgPool, name: &str) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO competency_reports.categories (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_survey(pool: &PgPool, title: &str, semester: &str) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO competency_reports.surveys (title, semester)
        VALUES ($1, $2)
        ON CONFLICT (title, semester) DO UPDATE SET title = EXCLUDED.title
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(semester)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

async fn upsert_question(
    pool: &PgPool,
    survey_id: i64,
    category_id: i64,
    prompt: &str,
) -> anyhow::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO competency_reports.questions (survey_id, category_id, prompt)
        VALUES ($1, $2, $3)
        ON CONFLICT (survey_id, prompt) DO UPDATE SET category_id = EXCLUDED.category_id
        RETURNING id
        "#,
    )
    .bind(survey_id)
    .bind(category_id)
    .bind(prompt)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

/// Insert a small realistic dataset: two tracks, two semesters, both row
/// sources, a category outside the canonical domains, and a few
/// non-numeric response values. Safe to run repeatedly.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let dana = upsert_advisor(pool, "Dana Okafor", "dana.okafor@program.edu").await?;
    let sam = upsert_advisor(pool, "Sam Whitfield", "sam.whitfield@program.edu").await?;

    let avery =
        upsert_student(pool, "Avery Lee", "avery.lee@program.edu", "Residential", dana).await?;
    let jules =
        upsert_student(pool, "Jules Moreno", "jules.moreno@program.edu", "Executive", sam).await?;
    let kiara =
        upsert_student(pool, "Kiara Patel", "kiara.patel@program.edu", "Residential", dana).await?;
    let noor =
        upsert_student(pool, "Noor Haddad", "noor.haddad@program.edu", "Executive", sam).await?;

    let knowledge = upsert_category(pool, "Knowledge & Inquiry").await?;
    let research = upsert_category(pool, "Research & Scholarship").await?;
    let communication = upsert_category(pool, "Communication & Collaboration").await?;
    let leadership = upsert_category(pool, "Leadership & Practice").await?;
    let portfolio = upsert_category(pool, "Evidence Portfolio").await?;

    let fall = upsert_survey(pool, "Annual Competency Self-Assessment", "Fall 2025").await?;
    let spring = upsert_survey(pool, "Mid-Year Competency Check-In", "Spring 2026").await?;

    let prompts = [
        (fall, knowledge, "Critical Thinking Reflection"),
        (fall, knowledge, "Ethical Reasoning Reflection"),
        (fall, research, "Research Design Reflection"),
        (fall, communication, "Written Communication Reflection"),
        (fall, leadership, "Project Management Reflection"),
        (fall, portfolio, "Evidence of Practice"),
        (spring, knowledge, "Critical Thinking Reflection"),
        (spring, research, "Data Analysis Reflection"),
        (spring, communication, "Oral Communication Reflection"),
        (spring, leadership, "Reflective Practice Reflection"),
    ];

    let mut question_ids = Vec::new();
    for (survey_id, category_id, prompt) in prompts {
        question_ids.push((survey_id, prompt, upsert_question(pool, survey_id, category_id, prompt).await?));
    }

    for (survey_id, student_id, submitted) in [
        (fall, avery, true),
        (fall, jules, true),
        (fall, kiara, false),
        (fall, noor, true),
        (spring, avery, true),
        (spring, jules, false),
        (spring, kiara, true),
        (spring, noor, false),
    ] {
        sqlx::query(
            r#"
            INSERT INTO competency_reports.survey_assignments (survey_id, student_id, submitted)
            VALUES ($1, $2, $3)
            ON CONFLICT (survey_id, student_id) DO UPDATE SET submitted = EXCLUDED.submitted
            "#,
        )
        .bind(survey_id)
        .bind(student_id)
        .bind(submitted)
        .execute(pool)
        .await?;
    }

    let now = Utc::now();
    let responses: [(&str, i64, i64, &str, i64); 12] = [
        ("Critical Thinking Reflection", fall, avery, "4", 130),
        ("Ethical Reasoning Reflection", fall, avery, "5", 130),
        ("Research Design Reflection", fall, jules, "3.5", 125),
        ("Written Communication Reflection", fall, jules, "4.5", 120),
        ("Project Management Reflection", fall, kiara, "3", 120),
        ("Evidence of Practice", fall, kiara, "See attached portfolio", 120),
        ("Critical Thinking Reflection", spring, avery, "4.5", 40),
        ("Data Analysis Reflection", spring, avery, "4", 35),
        ("Oral Communication Reflection", spring, jules, "n/a", 30),
        ("Reflective Practice Reflection", spring, kiara, "5", 25),
        ("Critical Thinking Reflection", spring, noor, "3", 10),
        ("Data Analysis Reflection", spring, noor, "4.25", 5),
    ];

    for (prompt, survey_id, student_id, raw_value, days_ago) in responses {
        let question_id = question_ids
            .iter()
            .find(|(qs, qp, _)| *qs == survey_id && *qp == prompt)
            .map(|(_, _, id)| *id)
            .context("seed prompt missing")?;
        insert_response(pool, question_id, student_id, raw_value, now - Duration::days(days_ago))
            .await?;
    }

    let advisor_scores: [(i64, i64, i64, i64, &str, i64); 6] = [
        (dana, avery, fall, knowledge, "4", 125),
        (dana, avery, spring, leadership, "3.5", 20),
        (dana, kiara, fall, research, "3", 120),
        (sam, jules, fall, communication, "4.5", 115),
        (sam, jules, spring, knowledge, "4", 30),
        (sam, noor, spring, research, "3.75", 15),
    ];
    for (advisor_id, student_id, survey_id, category_id, raw_value, days_ago) in advisor_scores {
        sqlx::query(
            r#"
            INSERT INTO competency_reports.advisor_category_scores
            (advisor_id, student_id, survey_id, category_id, raw_value, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (advisor_id, student_id, survey_id, category_id) DO UPDATE
            SET raw_value = EXCLUDED.raw_value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(advisor_id)
        .bind(student_id)
        .bind(survey_id)
        .bind(category_id)
        .bind(raw_value)
        .bind(now - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn insert_response(
    pool: &PgPool,
    question_id: i64,
    student_id: i64,
    raw_value: &str,
    updated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO competency_reports.responses (question_id, student_id, raw_value, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (question_id, student_id) DO UPDATE
        SET raw_value = EXCLUDED.raw_value, updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(question_id)
    .bind(student_id)
    .bind(raw_value)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}
