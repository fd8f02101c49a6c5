use crate::aggregate::round2;
use crate::level::{LevelProfile, PeriodStrategy};
use crate::models::PeriodAverage;

#[derive(Debug, Clone)]
pub struct ConsistencyCheck {
    pub consistent: bool,
    pub failed_units: Vec<String>,
}

/// Verifies sustained honor performance: every constituent unit (a quarter
/// for Elementary/JHS, a semester for SHS/College) must meet the level's
/// fixed bar in isolation, no matter how strong the blended average is.
/// Units with no grades carry no evidence and are skipped.
pub fn check(profile: &LevelProfile, period_averages: &[PeriodAverage]) -> ConsistencyCheck {
    let bar = profile.consistency_bar();
    let mut failed_units = Vec::new();

    match profile.strategy {
        PeriodStrategy::Quarters => {
            for period in period_averages {
                if period.grade_count == 0 {
                    continue;
                }
                if !profile.direction.meets_minimum(period.average, bar) {
                    failed_units.push(period.code.clone());
                }
            }
        }
        PeriodStrategy::WeightedSemesters => {
            for semester in [1u8, 2u8] {
                let members: Vec<&PeriodAverage> = period_averages
                    .iter()
                    .filter(|p| p.semester == semester && p.grade_count > 0)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let total_weight: f64 = members.iter().map(|p| p.weight).sum();
                if total_weight == 0.0 {
                    continue;
                }
                let weighted: f64 = members.iter().map(|p| p.average * p.weight).sum();
                let average = round2(weighted / total_weight);
                if !profile.direction.meets_minimum(average, bar) {
                    failed_units.push(format!("Semester {semester}"));
                }
            }
        }
    }

    ConsistencyCheck {
        consistent: failed_units.is_empty(),
        failed_units,
    }
}
