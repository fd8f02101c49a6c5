use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate;
use crate::consistency;
use crate::db;
use crate::level::{LevelProfile, year_level_number};
use crate::matcher;
use crate::models::{
    AcademicLevel, EngineError, GradingPeriod, HonorCriterion, LevelKey, Qualification,
    QualificationResult, RawGrade, Student,
};
use crate::selector;

/// Everything level-wide the calculation needs, fetched once and shared
/// across every student in a batch.
#[derive(Debug, Clone)]
pub struct LevelSnapshot {
    pub level: AcademicLevel,
    pub profile: LevelProfile,
    pub periods: Vec<GradingPeriod>,
    pub criteria: Vec<HonorCriterion>,
}

impl LevelSnapshot {
    pub async fn load(pool: &PgPool, level: &AcademicLevel) -> anyhow::Result<Self> {
        let periods = db::fetch_periods(pool, level.id).await?;
        let criteria = db::fetch_criteria(pool, level.id).await?;
        Ok(LevelSnapshot {
            level: level.clone(),
            profile: LevelProfile::for_level(level.key),
            periods,
            criteria,
        })
    }

    pub fn input_period_ids(&self) -> Vec<Uuid> {
        aggregate::input_periods(&self.profile, &self.periods)
            .iter()
            .map(|p| p.id)
            .collect()
    }
}

/// The pure four-stage pipeline for one student: aggregate, consistency
/// check, criterion matching, selection. Deterministic, no I/O, safe to run
/// for many students concurrently over independent snapshots.
pub fn calculate_from_snapshot(
    snapshot: &LevelSnapshot,
    grades: &[RawGrade],
    year_level: Option<&str>,
) -> Result<QualificationResult, EngineError> {
    for criterion in &snapshot.criteria {
        if criterion.academic_level_id.is_none() {
            return Err(EngineError::CriterionWithoutLevel(criterion.id));
        }
    }

    let profile = &snapshot.profile;
    let agg = match aggregate::aggregate(profile, &snapshot.periods, grades) {
        Ok(agg) => agg,
        Err(empty) => return Ok(QualificationResult::not_applicable(empty.reason())),
    };

    if snapshot.criteria.is_empty() {
        return Ok(QualificationResult::not_applicable("No honor criteria found"));
    }

    let year_number = match (profile.key, year_level) {
        (LevelKey::College, Some(year_level)) => Some(year_level_number(year_level)?),
        _ => None,
    };

    // Grades outside the input period set never reach the matcher, matching
    // what the aggregator counted.
    let counted_ids: std::collections::HashSet<Uuid> =
        snapshot.input_period_ids().into_iter().collect();
    let counted: Vec<RawGrade> = grades
        .iter()
        .filter(|g| counted_ids.contains(&g.grading_period_id))
        .cloned()
        .collect();

    let consistency = consistency::check(profile, &agg.periods);

    let mut satisfied: Vec<(HonorCriterion, Qualification)> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    for criterion in &snapshot.criteria {
        let outcome = matcher::evaluate(
            profile,
            criterion,
            &agg,
            &counted,
            year_number,
            &consistency,
        );
        if outcome.qualified {
            satisfied.push((
                criterion.clone(),
                Qualification {
                    honor_type: criterion.honor_type.clone(),
                    criterion_id: criterion.id,
                    gpa: agg.average,
                    min_grade: agg.min_value,
                    max_grade: agg.max_value,
                    breakdown: agg.periods.clone(),
                },
            ));
        } else {
            failures.push(format!(
                "{}: {}",
                criterion.honor_type.name,
                outcome.reason()
            ));
        }
    }

    let qualifications = selector::select(profile.policy, satisfied);
    let qualified = !qualifications.is_empty();
    Ok(QualificationResult {
        qualified,
        qualifications,
        average_grade: Some(agg.average),
        min_grade: Some(agg.min_value),
        max_grade: Some(agg.max_value),
        total_subjects: agg.total_subjects,
        reason: if qualified {
            None
        } else {
            Some(failures.join(" | "))
        },
    })
}

/// Calculates one student's qualification for a school year.
pub async fn calculate(
    pool: &PgPool,
    student: &Student,
    level: &AcademicLevel,
    school_year: &str,
) -> anyhow::Result<QualificationResult> {
    let snapshot = LevelSnapshot::load(pool, level).await?;
    let grades = db::fetch_grades(
        pool,
        student.id,
        school_year,
        &snapshot.input_period_ids(),
    )
    .await?;
    let result = calculate_from_snapshot(&snapshot, &grades, student.year_level.as_deref())?;
    Ok(result)
}

/// Batch entry point: every active student of the level, collect and
/// continue. One student's failure is logged and never aborts the batch.
pub async fn calculate_for_level(
    pool: &PgPool,
    level: &AcademicLevel,
    school_year: &str,
) -> anyhow::Result<Vec<(Student, QualificationResult)>> {
    let snapshot = LevelSnapshot::load(pool, level).await?;
    let students = db::fetch_students(pool, level.id).await?;
    let period_ids = snapshot.input_period_ids();

    let mut results = Vec::new();
    for student in students {
        let grades = match db::fetch_grades(pool, student.id, school_year, &period_ids).await {
            Ok(grades) => grades,
            Err(err) => {
                tracing::warn!(
                    student = %student.student_number,
                    error = %err,
                    "skipping student: grade fetch failed"
                );
                continue;
            }
        };
        match calculate_from_snapshot(&snapshot, &grades, student.year_level.as_deref()) {
            Ok(result) => results.push((student, result)),
            Err(err) => {
                tracing::warn!(
                    student = %student.student_number,
                    error = %err,
                    "skipping student: calculation failed"
                );
            }
        }
    }
    Ok(results)
}

/// Maps retained qualifications into persisted pending-approval records.
/// The engine never self-approves; the sink always writes 'pending'.
pub async fn persist_result(
    pool: &PgPool,
    snapshot: &LevelSnapshot,
    student: &Student,
    school_year: &str,
    result: &QualificationResult,
) -> anyhow::Result<usize> {
    let chosen = selector::to_persist(snapshot.profile.policy, &result.qualifications);
    for qualification in chosen {
        db::upsert_result(
            pool,
            student.id,
            qualification.honor_type.id,
            snapshot.level.id,
            school_year,
            qualification.gpa,
        )
        .await?;
    }
    Ok(chosen.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HonorType, PeriodType};

    fn level(key: LevelKey) -> AcademicLevel {
        AcademicLevel {
            id: Uuid::new_v4(),
            key,
            name: key.as_str().to_string(),
        }
    }

    fn quarter(code: &str, sort_order: i32) -> GradingPeriod {
        GradingPeriod {
            id: Uuid::new_v4(),
            code: code.to_string(),
            period_type: PeriodType::Quarter,
            parent_id: None,
            weight: None,
            sort_order,
            is_active: true,
            is_calculated: false,
        }
    }

    fn semester_leaf(code: &str, period_type: PeriodType) -> GradingPeriod {
        GradingPeriod {
            id: Uuid::new_v4(),
            code: code.to_string(),
            period_type,
            parent_id: None,
            weight: None,
            sort_order: 0,
            is_active: true,
            is_calculated: false,
        }
    }

    fn criterion(level_id: Uuid, name: &str) -> HonorCriterion {
        HonorCriterion {
            id: Uuid::new_v4(),
            academic_level_id: Some(level_id),
            honor_type: HonorType {
                id: Uuid::new_v4(),
                key: name.to_lowercase().replace(' ', "_"),
                name: name.to_string(),
            },
            min_gpa: None,
            max_gpa: None,
            min_grade: None,
            min_grade_all: None,
            min_year: None,
            max_year: None,
            require_consistent_honor: false,
        }
    }

    fn grade(period: &GradingPeriod, value: f64) -> RawGrade {
        RawGrade {
            student_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            grading_period_id: period.id,
            school_year: "2025-2026".to_string(),
            value,
        }
    }

    fn snapshot(
        key: LevelKey,
        periods: Vec<GradingPeriod>,
        criteria: Vec<HonorCriterion>,
    ) -> LevelSnapshot {
        let level = level(key);
        LevelSnapshot {
            profile: LevelProfile::for_level(level.key),
            level,
            periods,
            criteria,
        }
    }

    #[test]
    fn zero_grades_yields_not_qualified_without_error() {
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2)];
        let level_id = Uuid::new_v4();
        let snap = snapshot(
            LevelKey::Elementary,
            periods,
            vec![criterion(level_id, "With Honors")],
        );

        let result = calculate_from_snapshot(&snap, &[], None).unwrap();
        assert!(!result.qualified);
        assert_eq!(result.reason.as_deref(), Some("No grades found"));
    }

    #[test]
    fn no_periods_yields_not_qualified_without_error() {
        let snap = snapshot(LevelKey::Elementary, Vec::new(), Vec::new());
        let result = calculate_from_snapshot(&snap, &[], None).unwrap();
        assert!(!result.qualified);
        assert_eq!(result.reason.as_deref(), Some("No grading periods found"));
    }

    #[test]
    fn elementary_student_receives_exactly_one_honor() {
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2), quarter("Q3", 3), quarter("Q4", 4)];
        let grades: Vec<RawGrade> = periods.iter().map(|p| grade(p, 96.0)).collect();

        let level_id = Uuid::new_v4();
        let mut with_honors = criterion(level_id, "With Honors");
        with_honors.min_grade = Some(90.0);
        let mut high_honors = criterion(level_id, "With High Honors");
        high_honors.min_grade = Some(95.0);

        let snap = snapshot(LevelKey::Elementary, periods, vec![with_honors, high_honors]);
        let result = calculate_from_snapshot(&snap, &grades, None).unwrap();

        assert!(result.qualified);
        assert_eq!(result.qualifications.len(), 1);
        assert_eq!(result.qualifications[0].honor_type.name, "With High Honors");
        assert_eq!(result.average_grade, Some(96.0));
    }

    #[test]
    fn consistency_gate_dominates_a_passing_blend() {
        let periods = vec![
            semester_leaf("S1-MT", PeriodType::Midterm),
            semester_leaf("S2-MT", PeriodType::Midterm),
        ];
        // Semester 1 at 2.9, semester 2 at 3.5: blend 3.2.
        let grades = vec![grade(&periods[0], 2.9), grade(&periods[1], 3.5)];

        let level_id = Uuid::new_v4();
        let mut consistent_tier = criterion(level_id, "With Consistent Honors");
        consistent_tier.min_gpa = Some(3.5);
        consistent_tier.require_consistent_honor = true;
        let mut plain_tier = criterion(level_id, "With Honors");
        plain_tier.min_gpa = Some(3.5);

        let snap = snapshot(
            LevelKey::SeniorHighschool,
            periods,
            vec![consistent_tier, plain_tier],
        );
        let result = calculate_from_snapshot(&snap, &grades, None).unwrap();

        // The blended 3.2 passes both GPA bounds, but only the criterion
        // without the consistency requirement survives.
        assert!(result.qualified);
        assert_eq!(result.qualifications.len(), 1);
        assert_eq!(result.qualifications[0].honor_type.name, "With Honors");
    }

    #[test]
    fn college_year_gate_flows_from_student_year_level() {
        let periods = vec![
            semester_leaf("S1-MT", PeriodType::Midterm),
            semester_leaf("S1-FN", PeriodType::Final),
        ];
        let grades = vec![grade(&periods[0], 1.5), grade(&periods[1], 1.5)];

        let level_id = Uuid::new_v4();
        let mut deans_list = criterion(level_id, "Deans List");
        deans_list.min_gpa = Some(1.75);
        deans_list.min_year = Some(2);

        let snap = snapshot(LevelKey::College, periods, vec![deans_list]);

        let sophomore = calculate_from_snapshot(&snap, &grades, Some("second_year")).unwrap();
        assert!(sophomore.qualified);

        let freshman = calculate_from_snapshot(&snap, &grades, Some("first_year")).unwrap();
        assert!(!freshman.qualified);
    }

    #[test]
    fn unknown_year_level_is_a_contract_error() {
        let periods = vec![semester_leaf("S1-MT", PeriodType::Midterm)];
        let grades = vec![grade(&periods[0], 1.5)];
        let snap = snapshot(
            LevelKey::College,
            periods,
            vec![criterion(Uuid::new_v4(), "Deans List")],
        );

        let err = calculate_from_snapshot(&snap, &grades, Some("sixth_form")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownYearLevel(_)));
    }

    #[test]
    fn criterion_without_level_is_a_contract_error() {
        let periods = vec![quarter("Q1", 1)];
        let grades = vec![grade(&periods[0], 95.0)];
        let mut orphan = criterion(Uuid::new_v4(), "With Honors");
        orphan.academic_level_id = None;

        let snap = snapshot(LevelKey::Elementary, periods, vec![orphan]);
        let err = calculate_from_snapshot(&snap, &grades, None).unwrap_err();
        assert!(matches!(err, EngineError::CriterionWithoutLevel(_)));
    }

    #[test]
    fn no_criteria_yields_not_qualified_without_error() {
        let periods = vec![quarter("Q1", 1)];
        let grades = vec![grade(&periods[0], 95.0)];
        let snap = snapshot(LevelKey::Elementary, periods, Vec::new());

        let result = calculate_from_snapshot(&snap, &grades, None).unwrap();
        assert!(!result.qualified);
        assert_eq!(result.reason.as_deref(), Some("No honor criteria found"));
    }

    #[test]
    fn failed_criteria_report_accumulated_reasons() {
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2)];
        let grades = vec![grade(&periods[0], 88.0), grade(&periods[1], 85.0)];

        let level_id = Uuid::new_v4();
        let mut with_honors = criterion(level_id, "With Honors");
        with_honors.min_gpa = Some(90.0);
        with_honors.min_grade = Some(90.0);

        let snap = snapshot(LevelKey::JuniorHighschool, periods, vec![with_honors]);
        let result = calculate_from_snapshot(&snap, &grades, None).unwrap();

        assert!(!result.qualified);
        let reason = result.reason.unwrap();
        assert!(reason.starts_with("With Honors:"));
        assert!(reason.contains("minimum GPA"));
        assert!(reason.contains("minimum grade"));
    }
}
