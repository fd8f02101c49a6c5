use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AcademicLevel, GradingPeriod, HonorCriterion, HonorType, LevelKey, PeriodType, RawGrade,
    Student,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn fetch_level(pool: &PgPool, key: &str) -> anyhow::Result<AcademicLevel> {
    let parsed = LevelKey::parse(key)?;
    let row = sqlx::query("SELECT id, key, name FROM honors.academic_levels WHERE key = $1")
        .bind(parsed.as_str())
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("academic level '{key}' is not configured"))?;

    Ok(AcademicLevel {
        id: row.get("id"),
        key: parsed,
        name: row.get("name"),
    })
}

pub async fn fetch_level_by_id(pool: &PgPool, level_id: Uuid) -> anyhow::Result<AcademicLevel> {
    let row = sqlx::query("SELECT id, key, name FROM honors.academic_levels WHERE id = $1")
        .bind(level_id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("academic level {level_id} is not configured"))?;

    let key: String = row.get("key");
    Ok(AcademicLevel {
        id: row.get("id"),
        key: LevelKey::parse(&key)?,
        name: row.get("name"),
    })
}

/// All periods configured for a level, ordered by sort_order. The engine
/// decides which of these are input periods; calculated periods are never
/// requested as grade sources.
pub async fn fetch_periods(pool: &PgPool, level_id: Uuid) -> anyhow::Result<Vec<GradingPeriod>> {
    let rows = sqlx::query(
        "SELECT id, code, period_type, parent_id, weight, sort_order, is_active, is_calculated \
         FROM honors.grading_periods \
         WHERE academic_level_id = $1 \
         ORDER BY sort_order, code",
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    let mut periods = Vec::new();
    for row in rows {
        let period_type: String = row.get("period_type");
        periods.push(GradingPeriod {
            id: row.get("id"),
            code: row.get("code"),
            period_type: PeriodType::parse(&period_type)?,
            parent_id: row.get("parent_id"),
            weight: row.get("weight"),
            sort_order: row.get("sort_order"),
            is_active: row.get("is_active"),
            is_calculated: row.get("is_calculated"),
        });
    }
    Ok(periods)
}

/// Criteria for a level in insertion (seq) order. The ordering is part of
/// the contract: Senior High persists the last satisfied criterion.
pub async fn fetch_criteria(pool: &PgPool, level_id: Uuid) -> anyhow::Result<Vec<HonorCriterion>> {
    let rows = sqlx::query(
        "SELECT c.id, c.academic_level_id, c.min_gpa, c.max_gpa, c.min_grade, c.min_grade_all, \
         c.min_year, c.max_year, c.require_consistent_honor, \
         t.id AS honor_type_id, t.key AS honor_type_key, t.name AS honor_type_name \
         FROM honors.honor_criteria c \
         JOIN honors.honor_types t ON t.id = c.honor_type_id \
         WHERE c.academic_level_id = $1 \
         ORDER BY c.seq",
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    let mut criteria = Vec::new();
    for row in rows {
        criteria.push(HonorCriterion {
            id: row.get("id"),
            academic_level_id: row.get("academic_level_id"),
            honor_type: HonorType {
                id: row.get("honor_type_id"),
                key: row.get("honor_type_key"),
                name: row.get("honor_type_name"),
            },
            min_gpa: row.get("min_gpa"),
            max_gpa: row.get("max_gpa"),
            min_grade: row.get("min_grade"),
            min_grade_all: row.get("min_grade_all"),
            min_year: row.get("min_year"),
            max_year: row.get("max_year"),
            require_consistent_honor: row.get("require_consistent_honor"),
        });
    }
    Ok(criteria)
}

pub async fn fetch_students(pool: &PgPool, level_id: Uuid) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, student_number, name, academic_level_id, year_level, is_active \
         FROM honors.students \
         WHERE academic_level_id = $1 AND is_active \
         ORDER BY student_number",
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(student_from_row).collect())
}

pub async fn fetch_student(pool: &PgPool, student_number: &str) -> anyhow::Result<Student> {
    let row = sqlx::query(
        "SELECT id, student_number, name, academic_level_id, year_level, is_active \
         FROM honors.students WHERE student_number = $1",
    )
    .bind(student_number)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student with number '{student_number}'"))?;

    Ok(student_from_row(row))
}

fn student_from_row(row: sqlx::postgres::PgRow) -> Student {
    Student {
        id: row.get("id"),
        student_number: row.get("student_number"),
        name: row.get("name"),
        academic_level_id: row.get("academic_level_id"),
        year_level: row.get("year_level"),
        is_active: row.get("is_active"),
    }
}

/// Raw grades for one student restricted to the requested input periods.
pub async fn fetch_grades(
    pool: &PgPool,
    student_id: Uuid,
    school_year: &str,
    period_ids: &[Uuid],
) -> anyhow::Result<Vec<RawGrade>> {
    let rows = sqlx::query(
        "SELECT student_id, subject_id, grading_period_id, school_year, grade \
         FROM honors.student_grades \
         WHERE student_id = $1 AND school_year = $2 AND grading_period_id = ANY($3)",
    )
    .bind(student_id)
    .bind(school_year)
    .bind(period_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RawGrade {
            student_id: row.get("student_id"),
            subject_id: row.get("subject_id"),
            grading_period_id: row.get("grading_period_id"),
            school_year: row.get("school_year"),
            value: row.get("grade"),
        })
        .collect())
}

/// Result sink: at most one active record per (student, honor type, level,
/// school year). Always written as pending; approval happens elsewhere.
pub async fn upsert_result(
    pool: &PgPool,
    student_id: Uuid,
    honor_type_id: Uuid,
    level_id: Uuid,
    school_year: &str,
    gpa: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO honors.honor_results
        (id, student_id, honor_type_id, academic_level_id, school_year, gpa, status, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', NOW())
        ON CONFLICT (student_id, honor_type_id, academic_level_id, school_year) DO UPDATE
        SET gpa = EXCLUDED.gpa, status = 'pending', updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(honor_type_id)
    .bind(level_id)
    .bind(school_year)
    .bind(gpa)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let levels = vec![
        (
            Uuid::parse_str("5b1f0a4e-7c2d-4e8a-9b3f-1a2c3d4e5f01")?,
            "elementary",
            "Elementary",
        ),
        (
            Uuid::parse_str("5b1f0a4e-7c2d-4e8a-9b3f-1a2c3d4e5f02")?,
            "junior_highschool",
            "Junior High School",
        ),
        (
            Uuid::parse_str("5b1f0a4e-7c2d-4e8a-9b3f-1a2c3d4e5f03")?,
            "senior_highschool",
            "Senior High School",
        ),
        (
            Uuid::parse_str("5b1f0a4e-7c2d-4e8a-9b3f-1a2c3d4e5f04")?,
            "college",
            "College",
        ),
    ];

    for (id, key, name) in levels {
        sqlx::query(
            r#"
            INSERT INTO honors.academic_levels (id, key, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(name)
        .execute(pool)
        .await?;
    }

    // (level, code, period_type, parent_code, weight, sort, is_calculated)
    let periods: Vec<(&str, &str, &str, Option<&str>, Option<f64>, i32, bool)> = vec![
        ("elementary", "Q1", "quarter", None, None, 1, false),
        ("elementary", "Q2", "quarter", None, None, 2, false),
        ("elementary", "Q3", "quarter", None, None, 3, false),
        ("elementary", "Q4", "quarter", None, None, 4, false),
        ("junior_highschool", "Q1", "quarter", None, None, 1, false),
        ("junior_highschool", "Q2", "quarter", None, None, 2, false),
        ("junior_highschool", "Q3", "quarter", None, None, 3, false),
        ("junior_highschool", "Q4", "quarter", None, None, 4, false),
        ("senior_highschool", "S1", "semester", None, None, 1, false),
        ("senior_highschool", "S2", "semester", None, None, 5, false),
        ("senior_highschool", "S1-MT", "midterm", Some("S1"), Some(1.0), 2, false),
        ("senior_highschool", "S1-PF", "prefinal", Some("S1"), Some(1.0), 3, false),
        ("senior_highschool", "S1-FN", "final", Some("S1"), Some(1.0), 4, false),
        ("senior_highschool", "S2-MT", "midterm", Some("S2"), Some(1.0), 6, false),
        ("senior_highschool", "S2-PF", "prefinal", Some("S2"), Some(1.0), 7, false),
        ("senior_highschool", "S2-FN", "final", Some("S2"), Some(1.0), 8, false),
        ("senior_highschool", "FA", "final", None, None, 9, true),
        ("college", "S1-MT", "midterm", None, Some(1.0), 1, false),
        ("college", "S1-FN", "final", None, Some(1.0), 2, false),
        ("college", "S2-MT", "midterm", None, Some(1.0), 3, false),
        ("college", "S2-FN", "final", None, Some(1.0), 4, false),
    ];

    for (level_key, code, period_type, parent_code, weight, sort_order, is_calculated) in periods {
        let level_id: Uuid =
            sqlx::query("SELECT id FROM honors.academic_levels WHERE key = $1")
                .bind(level_key)
                .fetch_one(pool)
                .await?
                .get("id");

        let parent_id: Option<Uuid> = match parent_code {
            Some(parent) => Some(
                sqlx::query(
                    "SELECT id FROM honors.grading_periods \
                     WHERE academic_level_id = $1 AND code = $2",
                )
                .bind(level_id)
                .bind(parent)
                .fetch_one(pool)
                .await?
                .get("id"),
            ),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO honors.grading_periods
            (id, academic_level_id, code, period_type, parent_id, weight, sort_order, is_active, is_calculated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
            ON CONFLICT (academic_level_id, code) DO UPDATE
            SET period_type = EXCLUDED.period_type, parent_id = EXCLUDED.parent_id,
                weight = EXCLUDED.weight, sort_order = EXCLUDED.sort_order,
                is_calculated = EXCLUDED.is_calculated
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(level_id)
        .bind(code)
        .bind(period_type)
        .bind(parent_id)
        .bind(weight)
        .bind(sort_order)
        .bind(is_calculated)
        .execute(pool)
        .await?;
    }

    let subjects = vec![
        ("elementary", "MATH", "Mathematics"),
        ("elementary", "SCI", "Science"),
        ("junior_highschool", "MATH", "Mathematics"),
        ("junior_highschool", "SCI", "Science"),
        ("senior_highschool", "GENMATH", "General Mathematics"),
        ("senior_highschool", "ELS", "Earth and Life Science"),
        ("college", "CALC1", "Calculus I"),
        ("college", "PHYS1", "Physics I"),
    ];

    for (level_key, code, name) in subjects {
        let level_id: Uuid =
            sqlx::query("SELECT id FROM honors.academic_levels WHERE key = $1")
                .bind(level_key)
                .fetch_one(pool)
                .await?
                .get("id");
        sqlx::query(
            r#"
            INSERT INTO honors.subjects (id, academic_level_id, code, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (academic_level_id, code) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(level_id)
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let honor_types = vec![
        ("with_honors", "With Honors"),
        ("with_high_honors", "With High Honors"),
        ("with_highest_honors", "With Highest Honors"),
        ("deans_list", "Dean's List"),
    ];

    for (key, name) in honor_types {
        sqlx::query(
            r#"
            INSERT INTO honors.honor_types (id, key, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(name)
        .execute(pool)
        .await?;
    }

    // (level, honor type, min_gpa, max_gpa, min_grade, min_grade_all,
    //  min_year, max_year, require_consistent_honor)
    #[allow(clippy::type_complexity)]
    let criteria: Vec<(
        &str,
        &str,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<i32>,
        Option<i32>,
        bool,
    )> = vec![
        ("elementary", "with_honors", Some(90.0), None, Some(90.0), None, None, None, false),
        ("elementary", "with_high_honors", Some(95.0), None, Some(95.0), None, None, None, false),
        ("elementary", "with_highest_honors", Some(98.0), None, Some(98.0), None, None, None, false),
        ("junior_highschool", "with_honors", Some(90.0), None, Some(88.0), None, None, None, false),
        ("junior_highschool", "with_high_honors", Some(95.0), None, Some(90.0), None, None, None, true),
        ("senior_highschool", "with_honors", Some(2.0), None, None, None, None, None, false),
        ("senior_highschool", "with_high_honors", Some(1.75), None, None, Some(2.0), None, None, false),
        ("senior_highschool", "with_highest_honors", Some(1.5), None, None, Some(1.75), None, None, true),
        ("college", "deans_list", Some(1.75), None, Some(2.25), None, Some(2), None, true),
    ];

    for (level_key, honor_key, min_gpa, max_gpa, min_grade, min_grade_all, min_year, max_year, consistent) in
        criteria
    {
        let level_id: Uuid =
            sqlx::query("SELECT id FROM honors.academic_levels WHERE key = $1")
                .bind(level_key)
                .fetch_one(pool)
                .await?
                .get("id");
        let honor_type_id: Uuid =
            sqlx::query("SELECT id FROM honors.honor_types WHERE key = $1")
                .bind(honor_key)
                .fetch_one(pool)
                .await?
                .get("id");

        sqlx::query(
            r#"
            INSERT INTO honors.honor_criteria
            (id, academic_level_id, honor_type_id, min_gpa, max_gpa, min_grade, min_grade_all,
             min_year, max_year, require_consistent_honor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (academic_level_id, honor_type_id) DO UPDATE
            SET min_gpa = EXCLUDED.min_gpa, max_gpa = EXCLUDED.max_gpa,
                min_grade = EXCLUDED.min_grade, min_grade_all = EXCLUDED.min_grade_all,
                min_year = EXCLUDED.min_year, max_year = EXCLUDED.max_year,
                require_consistent_honor = EXCLUDED.require_consistent_honor
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(level_id)
        .bind(honor_type_id)
        .bind(min_gpa)
        .bind(max_gpa)
        .bind(min_grade)
        .bind(min_grade_all)
        .bind(min_year)
        .bind(max_year)
        .bind(consistent)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("2025-0001", "Liam Navarro", "elementary", None::<&str>),
        ("2025-0002", "Mia Santos", "junior_highschool", None),
        ("2025-0003", "Noah Reyes", "senior_highschool", None),
        ("2025-0004", "Ava Dela Cruz", "college", Some("second_year")),
    ];

    for (number, name, level_key, year_level) in students {
        let level_id: Uuid =
            sqlx::query("SELECT id FROM honors.academic_levels WHERE key = $1")
                .bind(level_key)
                .fetch_one(pool)
                .await?
                .get("id");
        sqlx::query(
            r#"
            INSERT INTO honors.students
            (id, student_number, name, academic_level_id, year_level, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (student_number) DO UPDATE
            SET name = EXCLUDED.name, academic_level_id = EXCLUDED.academic_level_id,
                year_level = EXCLUDED.year_level
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(number)
        .bind(name)
        .bind(level_id)
        .bind(year_level)
        .execute(pool)
        .await?;
    }

    // (student, subject, period, grade) for school year 2025-2026
    let grades: Vec<(&str, &str, &str, f64)> = vec![
        ("2025-0001", "MATH", "Q1", 96.0),
        ("2025-0001", "MATH", "Q2", 95.0),
        ("2025-0001", "MATH", "Q3", 97.0),
        ("2025-0001", "MATH", "Q4", 96.0),
        ("2025-0001", "SCI", "Q1", 95.0),
        ("2025-0001", "SCI", "Q2", 96.0),
        ("2025-0001", "SCI", "Q3", 95.0),
        ("2025-0001", "SCI", "Q4", 96.0),
        ("2025-0002", "MATH", "Q1", 92.0),
        ("2025-0002", "MATH", "Q2", 94.0),
        ("2025-0002", "MATH", "Q3", 89.0),
        ("2025-0002", "MATH", "Q4", 93.0),
        ("2025-0002", "SCI", "Q1", 92.0),
        ("2025-0002", "SCI", "Q2", 94.0),
        ("2025-0002", "SCI", "Q3", 89.0),
        ("2025-0002", "SCI", "Q4", 93.0),
        ("2025-0003", "GENMATH", "S1-MT", 1.75),
        ("2025-0003", "GENMATH", "S1-PF", 1.5),
        ("2025-0003", "GENMATH", "S1-FN", 1.75),
        ("2025-0003", "GENMATH", "S2-MT", 2.0),
        ("2025-0003", "GENMATH", "S2-PF", 1.75),
        ("2025-0003", "GENMATH", "S2-FN", 1.5),
        ("2025-0003", "ELS", "S1-MT", 2.0),
        ("2025-0003", "ELS", "S1-PF", 1.75),
        ("2025-0003", "ELS", "S1-FN", 2.0),
        ("2025-0003", "ELS", "S2-MT", 1.75),
        ("2025-0003", "ELS", "S2-PF", 2.0),
        ("2025-0003", "ELS", "S2-FN", 1.75),
        ("2025-0004", "CALC1", "S1-MT", 1.5),
        ("2025-0004", "CALC1", "S1-FN", 1.75),
        ("2025-0004", "CALC1", "S2-MT", 1.5),
        ("2025-0004", "CALC1", "S2-FN", 1.25),
        ("2025-0004", "PHYS1", "S1-MT", 2.0),
        ("2025-0004", "PHYS1", "S1-FN", 1.75),
        ("2025-0004", "PHYS1", "S2-MT", 1.75),
        ("2025-0004", "PHYS1", "S2-FN", 2.0),
    ];

    for (student_number, subject_code, period_code, grade) in grades {
        insert_grade(pool, student_number, subject_code, period_code, "2025-2026", grade).await?;
    }

    Ok(())
}

async fn insert_grade(
    pool: &PgPool,
    student_number: &str,
    subject_code: &str,
    period_code: &str,
    school_year: &str,
    grade: f64,
) -> anyhow::Result<bool> {
    let row = sqlx::query(
        "SELECT id, academic_level_id FROM honors.students WHERE student_number = $1",
    )
    .bind(student_number)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student with number '{student_number}'"))?;
    let student_id: Uuid = row.get("id");
    let level_id: Uuid = row.get("academic_level_id");

    let subject_id: Uuid = sqlx::query(
        "SELECT id FROM honors.subjects WHERE academic_level_id = $1 AND code = $2",
    )
    .bind(level_id)
    .bind(subject_code)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no subject '{subject_code}' for this level"))?
    .get("id");

    let period_id: Uuid = sqlx::query(
        "SELECT id FROM honors.grading_periods WHERE academic_level_id = $1 AND code = $2",
    )
    .bind(level_id)
    .bind(period_code)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no grading period '{period_code}' for this level"))?
    .get("id");

    let result = sqlx::query(
        r#"
        INSERT INTO honors.student_grades
        (id, student_id, subject_id, grading_period_id, school_year, grade)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id, subject_id, grading_period_id, school_year) DO UPDATE
        SET grade = EXCLUDED.grade
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(subject_id)
    .bind(period_id)
    .bind(school_year)
    .bind(grade)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Raw-grade CSV ingest. Columns: student_number, subject, period, school_year, grade.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_number: String,
        subject: String,
        period: String,
        school_year: String,
        grade: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let inserted = insert_grade(
            pool,
            &row.student_number,
            &row.subject,
            &row.period,
            &row.school_year,
            row.grade,
        )
        .await?;
        if inserted {
            imported += 1;
        }
    }

    Ok(imported)
}
