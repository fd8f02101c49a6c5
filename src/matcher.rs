use crate::consistency::ConsistencyCheck;
use crate::level::LevelProfile;
use crate::models::{Aggregate, HonorCriterion, RawGrade};

/// Outcome of evaluating one criterion. Every failing sub-check contributes
/// to the reason list; nothing short-circuits, so the caller gets a full
/// diagnostic picture.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub qualified: bool,
    pub reasons: Vec<String>,
}

impl MatchOutcome {
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Evaluates one honor criterion against the student's aggregate figures.
/// Each check is skipped when its field is unset; a criterion with no
/// constraints at all trivially qualifies (the open default tier).
pub fn evaluate(
    profile: &LevelProfile,
    criterion: &HonorCriterion,
    aggregate: &Aggregate,
    grades: &[RawGrade],
    year_number: Option<i32>,
    consistency: &ConsistencyCheck,
) -> MatchOutcome {
    let direction = profile.direction;
    let mut reasons = Vec::new();

    if let Some(min_gpa) = criterion.min_gpa {
        if !direction.meets_minimum(aggregate.average, min_gpa) {
            reasons.push(format!(
                "Average grade {:.2} does not meet the minimum GPA of {:.2}",
                aggregate.average, min_gpa
            ));
        }
    }

    if let Some(max_gpa) = criterion.max_gpa {
        if !direction.meets_maximum(aggregate.average, max_gpa) {
            reasons.push(format!(
                "Average grade {:.2} exceeds the maximum GPA of {:.2}",
                aggregate.average, max_gpa
            ));
        }
    }

    if let Some(min_grade) = criterion.min_grade {
        let worst = direction.worst(aggregate.min_value, aggregate.max_value);
        if !direction.meets_minimum(worst, min_grade) {
            reasons.push(format!(
                "Lowest grade {:.2} does not meet the minimum grade of {:.2}",
                worst, min_grade
            ));
        }
    }

    if let Some(min_grade_all) = criterion.min_grade_all {
        // Stricter than min_grade: every grade row is inspected, not just
        // the precomputed extreme.
        let failing = grades
            .iter()
            .filter(|g| !direction.meets_minimum(g.value, min_grade_all))
            .count();
        if failing > 0 {
            reasons.push(format!(
                "{failing} grade(s) do not meet the minimum of {min_grade_all:.2} required across all subjects"
            ));
        }
    }

    if criterion.min_year.is_some() || criterion.max_year.is_some() {
        match year_number {
            Some(year) => {
                if let Some(min_year) = criterion.min_year {
                    if year < min_year {
                        reasons.push(format!(
                            "Year level {year} is below the minimum year {min_year}"
                        ));
                    }
                }
                if let Some(max_year) = criterion.max_year {
                    if year > max_year {
                        reasons.push(format!(
                            "Year level {year} is above the maximum year {max_year}"
                        ));
                    }
                }
            }
            None => {
                reasons.push("No year level recorded for a year-gated honor".to_string());
            }
        }
    }

    if criterion.require_consistent_honor && !consistency.consistent {
        reasons.push(format!(
            "Honor standing not maintained in: {}",
            consistency.failed_units.join(", ")
        ));
    }

    MatchOutcome {
        qualified: reasons.is_empty(),
        reasons,
    }
}
