use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::level::{LevelProfile, PeriodStrategy};
use crate::models::{Aggregate, GradingPeriod, PeriodAverage, PeriodType, RawGrade};

/// Expected empty states. These never raise; the orchestrator turns them
/// into a non-qualified result carrying the reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotApplicable {
    NoPeriods,
    NoGrades,
    NoWeight,
}

impl NotApplicable {
    pub fn reason(&self) -> &'static str {
        match self {
            NotApplicable::NoPeriods => "No grading periods found",
            NotApplicable::NoGrades => "No grades found",
            NotApplicable::NoWeight => "No semester averages could be calculated",
        }
    }
}

/// Round half away from zero to two decimals. Matches `f64::round`, which
/// rounds halfway cases away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Canonical quarter codes for Elementary/JHS. F4 is a legacy alias for Q4.
fn quarter_semester(code: &str) -> Option<u8> {
    match code {
        "Q1" | "Q2" => Some(1),
        "Q3" | "Q4" | "F4" => Some(2),
        _ => None,
    }
}

/// The input (source) periods for a level: active, never calculated, and
/// shaped by the level's grouping strategy. Calculated periods such as a
/// derived Final Average are excluded here so they can never be read back
/// as raw sources.
pub fn input_periods(profile: &LevelProfile, periods: &[GradingPeriod]) -> Vec<GradingPeriod> {
    periods
        .iter()
        .filter(|p| p.is_active && !p.is_calculated)
        .filter(|p| match profile.strategy {
            PeriodStrategy::Quarters => {
                p.period_type == PeriodType::Quarter && quarter_semester(&p.code).is_some()
            }
            PeriodStrategy::WeightedSemesters => matches!(
                p.period_type,
                PeriodType::Quarter | PeriodType::Midterm | PeriodType::Prefinal | PeriodType::Final
            ),
        })
        .cloned()
        .collect()
}

/// Semester bucket for a period under the weighted-semester strategy: the
/// parent semester's code decides when a parent exists, otherwise the
/// period's own code prefix (S1*/S2*).
fn semester_bucket(period: &GradingPeriod, all_periods: &[GradingPeriod]) -> u8 {
    let code = period
        .parent_id
        .and_then(|parent| all_periods.iter().find(|p| p.id == parent))
        .map(|parent| parent.code.as_str())
        .unwrap_or(period.code.as_str());
    if code.starts_with("S2") {
        2
    } else {
        1
    }
}

/// Reduce raw grades into per-period averages, an overall scalar average,
/// and the numeric extremes across all counted periods. The worst/best of
/// the extremes is direction-dependent and resolved by the caller through
/// `ScaleDirection`.
pub fn aggregate(
    profile: &LevelProfile,
    periods: &[GradingPeriod],
    grades: &[RawGrade],
) -> Result<Aggregate, NotApplicable> {
    let sources = input_periods(profile, periods);
    if sources.is_empty() {
        return Err(NotApplicable::NoPeriods);
    }

    let mut by_period: HashMap<Uuid, Vec<&RawGrade>> = HashMap::new();
    for grade in grades {
        by_period.entry(grade.grading_period_id).or_default().push(grade);
    }

    let mut period_averages: Vec<PeriodAverage> = Vec::new();
    let mut min_value = f64::MAX;
    let mut max_value = f64::MIN;
    let mut subjects: HashSet<Uuid> = HashSet::new();
    let mut grade_count = 0usize;

    for period in &sources {
        let Some(rows) = by_period.get(&period.id) else {
            continue;
        };
        if rows.is_empty() {
            continue;
        }

        let sum: f64 = rows.iter().map(|g| g.value).sum();
        let average = round2(sum / rows.len() as f64);
        for row in rows {
            min_value = min_value.min(row.value);
            max_value = max_value.max(row.value);
            subjects.insert(row.subject_id);
        }
        grade_count += rows.len();

        let semester = match profile.strategy {
            PeriodStrategy::Quarters => quarter_semester(&period.code).unwrap_or(1),
            PeriodStrategy::WeightedSemesters => semester_bucket(period, periods),
        };
        period_averages.push(PeriodAverage {
            period_id: period.id,
            code: period.code.clone(),
            semester,
            average,
            weight: period.weight(),
            grade_count: rows.len(),
        });
    }

    if period_averages.is_empty() {
        return Err(NotApplicable::NoGrades);
    }

    let average = match profile.strategy {
        // Unweighted mean of the quarter averages, so a quarter with fewer
        // subjects still counts as one full quarter.
        PeriodStrategy::Quarters => {
            let sum: f64 = period_averages.iter().map(|p| p.average).sum();
            round2(sum / period_averages.len() as f64)
        }
        PeriodStrategy::WeightedSemesters => {
            let total_weight: f64 = period_averages.iter().map(|p| p.weight).sum();
            if total_weight == 0.0 {
                return Err(NotApplicable::NoWeight);
            }
            let weighted: f64 = period_averages.iter().map(|p| p.average * p.weight).sum();
            round2(weighted / total_weight)
        }
    };

    Ok(Aggregate {
        average,
        min_value,
        max_value,
        periods: period_averages,
        total_subjects: subjects.len(),
        grade_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LevelKey;

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

    fn semester_period(code: &str, period_type: PeriodType, weight: Option<f64>) -> GradingPeriod {
        GradingPeriod {
            id: Uuid::new_v4(),
            code: code.to_string(),
            period_type,
            parent_id: None,
            weight,
            sort_order: 0,
            is_active: true,
            is_calculated: false,
        }
    }

    fn grade(period: &GradingPeriod, subject_id: Uuid, value: f64) -> RawGrade {
        RawGrade {
            student_id: Uuid::new_v4(),
            subject_id,
            grading_period_id: period.id,
            school_year: "2025-2026".to_string(),
            value,
        }
    }

    #[test]
    fn jhs_quarters_average_of_averages() {
        let profile = LevelProfile::for_level(LevelKey::JuniorHighschool);
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2), quarter("Q3", 3), quarter("Q4", 4)];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 92.0),
            grade(&periods[1], subject, 94.0),
            grade(&periods[2], subject, 89.0),
            grade(&periods[3], subject, 93.0),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.average, 92.0);
        assert_eq!(agg.min_value, 89.0);
        assert_eq!(agg.max_value, 94.0);
        assert_eq!(agg.periods.len(), 4);
        assert_eq!(agg.total_subjects, 1);
    }

    #[test]
    fn sparse_quarter_is_not_underweighted() {
        let profile = LevelProfile::for_level(LevelKey::Elementary);
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2)];
        let math = Uuid::new_v4();
        let english = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], math, 90.0),
            grade(&periods[0], english, 90.0),
            grade(&periods[1], math, 100.0),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        // (90 + 100) / 2, not (90 + 90 + 100) / 3.
        assert_eq!(agg.average, 95.0);
        assert_eq!(agg.total_subjects, 2);
        assert_eq!(agg.grade_count, 3);
    }

    #[test]
    fn f4_is_an_alias_for_q4() {
        let profile = LevelProfile::for_level(LevelKey::JuniorHighschool);
        let periods = vec![quarter("Q3", 3), quarter("F4", 4)];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 90.0),
            grade(&periods[1], subject, 94.0),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.average, 92.0);
        assert!(agg.periods.iter().all(|p| p.semester == 2));
    }

    #[test]
    fn non_canonical_quarter_codes_are_ignored() {
        let profile = LevelProfile::for_level(LevelKey::Elementary);
        let periods = vec![quarter("Q1", 1), quarter("REMEDIAL", 9)];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 90.0),
            grade(&periods[1], subject, 10.0),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.average, 90.0);
        assert_eq!(agg.grade_count, 1);
    }

    #[test]
    fn weighted_semesters_respect_period_weights() {
        let profile = LevelProfile::for_level(LevelKey::SeniorHighschool);
        let periods = vec![
            semester_period("S1-MT", PeriodType::Midterm, Some(1.0)),
            semester_period("S1-FN", PeriodType::Final, Some(2.0)),
        ];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 2.0),
            grade(&periods[1], subject, 1.25),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        // (2.0 * 1 + 1.25 * 2) / 3 = 1.5
        assert_eq!(agg.average, 1.5);
    }

    #[test]
    fn equal_weights_match_unweighted_mean() {
        let profile = LevelProfile::for_level(LevelKey::College);
        let periods = vec![
            semester_period("S1-MT", PeriodType::Midterm, Some(1.0)),
            semester_period("S1-PF", PeriodType::Prefinal, Some(1.0)),
            semester_period("S2-MT", PeriodType::Midterm, None),
        ];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 1.5),
            grade(&periods[1], subject, 2.0),
            grade(&periods[2], subject, 2.5),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.average, 2.0);
    }

    #[test]
    fn semester_buckets_follow_code_prefix() {
        let profile = LevelProfile::for_level(LevelKey::College);
        let periods = vec![
            semester_period("S1-MT", PeriodType::Midterm, None),
            semester_period("S2-FN", PeriodType::Final, None),
        ];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 2.0),
            grade(&periods[1], subject, 2.0),
        ];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.periods[0].semester, 1);
        assert_eq!(agg.periods[1].semester, 2);
    }

    #[test]
    fn semester_buckets_follow_parent_when_present() {
        let profile = LevelProfile::for_level(LevelKey::SeniorHighschool);
        let parent = GradingPeriod {
            id: Uuid::new_v4(),
            code: "S2".to_string(),
            period_type: PeriodType::Semester,
            parent_id: None,
            weight: None,
            sort_order: 2,
            is_active: true,
            is_calculated: false,
        };
        let mut leaf = semester_period("MT", PeriodType::Midterm, None);
        leaf.parent_id = Some(parent.id);
        let periods = vec![parent, leaf.clone()];
        let grades = vec![grade(&leaf, Uuid::new_v4(), 1.75)];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.periods.len(), 1);
        assert_eq!(agg.periods[0].semester, 2);
    }

    #[test]
    fn calculated_periods_never_count_as_sources() {
        let profile = LevelProfile::for_level(LevelKey::SeniorHighschool);
        let mut derived = semester_period("S1-FA", PeriodType::Final, None);
        derived.is_calculated = true;
        let live = semester_period("S1-MT", PeriodType::Midterm, None);
        let subject = Uuid::new_v4();
        let grades = vec![grade(&live, subject, 2.0), grade(&derived, subject, 1.0)];
        let periods = vec![derived, live];

        let agg = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(agg.average, 2.0);
        assert_eq!(agg.grade_count, 1);
    }

    #[test]
    fn no_periods_is_a_typed_empty_state() {
        let profile = LevelProfile::for_level(LevelKey::Elementary);
        let err = aggregate(&profile, &[], &[]).unwrap_err();
        assert_eq!(err, NotApplicable::NoPeriods);
        assert_eq!(err.reason(), "No grading periods found");
    }

    #[test]
    fn no_grades_is_a_typed_empty_state() {
        let profile = LevelProfile::for_level(LevelKey::Elementary);
        let periods = vec![quarter("Q1", 1)];
        let err = aggregate(&profile, &periods, &[]).unwrap_err();
        assert_eq!(err, NotApplicable::NoGrades);
        assert_eq!(err.reason(), "No grades found");
    }

    #[test]
    fn zero_total_weight_is_a_typed_empty_state() {
        let profile = LevelProfile::for_level(LevelKey::SeniorHighschool);
        let periods = vec![semester_period("S1-MT", PeriodType::Midterm, Some(0.0))];
        let grades = vec![grade(&periods[0], Uuid::new_v4(), 2.0)];
        let err = aggregate(&profile, &periods, &grades).unwrap_err();
        assert_eq!(err, NotApplicable::NoWeight);
        assert_eq!(err.reason(), "No semester averages could be calculated");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // Halfway cases chosen to be exactly representable in binary.
        assert_eq!(round2(92.125), 92.13);
        assert_eq!(round2(1.375), 1.38);
        assert_eq!(round2(89.994), 89.99);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let profile = LevelProfile::for_level(LevelKey::JuniorHighschool);
        let periods = vec![quarter("Q1", 1), quarter("Q2", 2), quarter("Q3", 3)];
        let subject = Uuid::new_v4();
        let grades = vec![
            grade(&periods[0], subject, 91.33),
            grade(&periods[1], subject, 88.67),
            grade(&periods[2], subject, 95.1),
        ];

        let first = aggregate(&profile, &periods, &grades).unwrap();
        let second = aggregate(&profile, &periods, &grades).unwrap();
        assert_eq!(first.average.to_bits(), second.average.to_bits());
    }
}
