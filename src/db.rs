use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::BulletinError;
use crate::models::{AssessmentKind, GradeRecord, StudentIdentity, Term};
use crate::roster;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    school: &str,
    class_name: &str,
    full_name: &str,
    registration_id: &str,
) -> anyhow::Result<Uuid> {
    let school_id: Uuid = sqlx::query(
        r#"
        INSERT INTO scolatek.schools (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(school)
    .fetch_one(pool)
    .await?
    .get("id");

    let class_id: Uuid = sqlx::query(
        r#"
        INSERT INTO scolatek.classes (id, school_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (school_id, name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(school_id)
    .bind(class_name)
    .fetch_one(pool)
    .await?
    .get("id");

    let student_id: Uuid = sqlx::query(
        r#"
        INSERT INTO scolatek.students (id, class_id, full_name, registration_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (registration_id) DO UPDATE
        SET full_name = EXCLUDED.full_name, class_id = EXCLUDED.class_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(class_id)
    .bind(full_name)
    .bind(registration_id)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(student_id)
}

async fn insert_grade(
    pool: &PgPool,
    student_id: Uuid,
    record: &GradeRecord,
    term: Term,
    recorded_on: Option<NaiveDate>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO scolatek.grades
        (id, student_id, subject_name, kind, score, term, recorded_on, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, CURRENT_DATE), $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(&record.subject_name)
    .bind(record.kind.to_string())
    .bind(record.score)
    .bind(term.number())
    .bind(recorded_on)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let school = "Lycée ScolaTek de Dakar";
    let students = vec![
        ("6e A", "Awa Diallo", "STK-2026-001"),
        ("6e A", "Moussa Ndiaye", "STK-2026-002"),
        ("6e A", "Fatou Sarr", "STK-2026-003"),
    ];

    // (registration id, subject, kind, score, term)
    let grades = vec![
        ("STK-2026-001", "Français", AssessmentKind::Class, 14.0, Term::First),
        ("STK-2026-001", "Français", AssessmentKind::Exam, 16.0, Term::First),
        ("STK-2026-001", "Mathématiques", AssessmentKind::Class, 15.5, Term::First),
        ("STK-2026-001", "Mathématiques", AssessmentKind::Exam, 13.0, Term::First),
        ("STK-2026-001", "EPS", AssessmentKind::Class, 17.0, Term::First),
        ("STK-2026-001", "Français", AssessmentKind::Class, 15.0, Term::Second),
        ("STK-2026-001", "Français", AssessmentKind::Exam, 14.5, Term::Second),
        ("STK-2026-001", "Mathématiques", AssessmentKind::Exam, 12.0, Term::Second),
        ("STK-2026-002", "Français", AssessmentKind::Class, 9.0, Term::First),
        ("STK-2026-002", "Français", AssessmentKind::Exam, 8.5, Term::First),
        ("STK-2026-002", "Anglais", AssessmentKind::Class, 11.0, Term::First),
        ("STK-2026-002", "Histoire", AssessmentKind::Exam, 10.0, Term::First),
        ("STK-2026-002", "Français", AssessmentKind::Class, 10.0, Term::Second),
        ("STK-2026-002", "Anglais", AssessmentKind::Exam, 9.5, Term::Second),
        ("STK-2026-003", "Sciences", AssessmentKind::Class, 12.0, Term::First),
        ("STK-2026-003", "Sciences", AssessmentKind::Exam, 13.5, Term::First),
        ("STK-2026-003", "Arts", AssessmentKind::Class, 18.0, Term::First),
        ("STK-2026-003", "Sciences", AssessmentKind::Class, 14.0, Term::Second),
        ("STK-2026-003", "Géographie", AssessmentKind::Exam, 11.0, Term::Second),
    ];

    let recorded_on = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let mut ids = std::collections::HashMap::new();
    for (class_name, full_name, registration_id) in students {
        let id = upsert_student(pool, school, class_name, full_name, registration_id).await?;
        ids.insert(registration_id, id);
    }

    for (index, (registration_id, subject, kind, score, term)) in grades.into_iter().enumerate() {
        let student_id = *ids
            .get(registration_id)
            .context("seed grade references an unknown student")?;
        let record = GradeRecord::new(subject, kind, score);
        let source_key = format!("seed-{:03}", index + 1);
        insert_grade(pool, student_id, &record, term, Some(recorded_on), &source_key).await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let rows = roster::read_rows(csv_path)?;
    let mut inserted = 0usize;

    for (row, term) in rows {
        let student_id = upsert_student(
            pool,
            &row.school,
            &row.class_name,
            &row.full_name,
            &row.registration_id,
        )
        .await?;

        let source_key = row
            .source_key
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_grade(pool, student_id, &row.record(), term, None, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

const STUDENT_COLUMNS: &str = "SELECT st.id, st.full_name, st.registration_id, \
     c.name AS class_name, sc.name AS school_name \
     FROM scolatek.students st \
     JOIN scolatek.classes c ON c.id = st.class_id \
     JOIN scolatek.schools sc ON sc.id = c.school_id";

/// A student together with the name of the school they are enrolled in.
fn student_from_row(row: &sqlx::postgres::PgRow) -> (String, StudentIdentity) {
    (
        row.get("school_name"),
        StudentIdentity {
            id: row.get("id"),
            full_name: row.get("full_name"),
            class_name: row.get("class_name"),
            registration_id: row.get("registration_id"),
        },
    )
}

/// Explicit registration ids come back in the order given; a class selection
/// is ordered by name. `school` narrows either form to one school.
pub async fn fetch_students(
    pool: &PgPool,
    school: Option<&str>,
    class_name: Option<&str>,
    registration_ids: &[String],
) -> anyhow::Result<Vec<(String, StudentIdentity)>> {
    if !registration_ids.is_empty() {
        let query = format!(
            "{STUDENT_COLUMNS} WHERE st.registration_id = $1 \
             AND ($2::text IS NULL OR sc.name = $2)"
        );
        let mut students = Vec::with_capacity(registration_ids.len());
        for registration_id in registration_ids {
            let row = sqlx::query(&query)
                .bind(registration_id)
                .bind(school)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| BulletinError::MissingInput(format!("student `{registration_id}`")))?;
            students.push(student_from_row(&row));
        }
        return Ok(students);
    }

    let class_name = class_name
        .ok_or_else(|| BulletinError::MissingInput("a class or student selection".to_string()))?;
    let query = format!(
        "{STUDENT_COLUMNS} WHERE c.name = $1 AND ($2::text IS NULL OR sc.name = $2) \
         ORDER BY st.full_name"
    );
    let rows = sqlx::query(&query)
        .bind(class_name)
        .bind(school)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn fetch_grades(
    pool: &PgPool,
    student_id: Uuid,
    term: Term,
) -> anyhow::Result<Vec<GradeRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT subject_name, kind, score
        FROM scolatek.grades
        WHERE student_id = $1 AND term = $2
        ORDER BY seq
        "#,
    )
    .bind(student_id)
    .bind(term.number())
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let kind: String = row.get("kind");
        records.push(GradeRecord {
            subject_name: row.get("subject_name"),
            kind: AssessmentKind::from(kind.as_str()),
            score: row.get("score"),
        });
    }

    Ok(records)
}
