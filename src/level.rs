use crate::models::{EngineError, LevelKey};
use crate::scale::ScaleDirection;

/// How a level's raw periods collapse into an overall average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStrategy {
    /// Quarter periods Q1-Q4 only; the overall average is the unweighted
    /// mean of the per-quarter averages.
    Quarters,
    /// Quarter/midterm/prefinal/final periods bucketed into two semesters;
    /// the overall average is weight-adjusted by each period's weight.
    WeightedSemesters,
}

/// How simultaneously-satisfied criteria collapse into the awarded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Keep only the criterion with the highest `min_grade` (Elementary).
    HighestMinGrade,
    /// Keep every satisfied criterion (Junior High, College).
    AllSatisfying,
    /// Keep the full ordered list, but persist only the last entry (Senior
    /// High). Load-bearing legacy convention; do not reinterpret as
    /// "first" or "highest".
    LastSatisfiedWins,
}

/// Everything level-specific the engine needs: scale direction, period
/// grouping, and tie-break policy. One parameterized engine replaces four
/// near-identical per-level services.
#[derive(Debug, Clone, Copy)]
pub struct LevelProfile {
    pub key: LevelKey,
    pub direction: ScaleDirection,
    pub strategy: PeriodStrategy,
    pub policy: SelectionPolicy,
}

impl LevelProfile {
    pub fn for_level(key: LevelKey) -> Self {
        let direction = ScaleDirection::for_level(key);
        let (strategy, policy) = match key {
            LevelKey::Elementary => (PeriodStrategy::Quarters, SelectionPolicy::HighestMinGrade),
            LevelKey::JuniorHighschool => (PeriodStrategy::Quarters, SelectionPolicy::AllSatisfying),
            LevelKey::SeniorHighschool => (
                PeriodStrategy::WeightedSemesters,
                SelectionPolicy::LastSatisfiedWins,
            ),
            LevelKey::College => (
                PeriodStrategy::WeightedSemesters,
                SelectionPolicy::AllSatisfying,
            ),
        };
        LevelProfile {
            key,
            direction,
            strategy,
            policy,
        }
    }

    /// The per-period bar a student must hold for the consistency check:
    /// average >= 90 on a 0-100 scale, average <= 3.0 on a 1.0-5.0 scale.
    pub fn consistency_bar(&self) -> f64 {
        if self.direction.is_lower_better() {
            3.0
        } else {
            90.0
        }
    }
}

/// Maps a college student's enumerated year-level string to its numeric year
/// for min_year/max_year gating. An unmappable value is a contract error,
/// not an empty state.
pub fn year_level_number(year_level: &str) -> Result<i32, EngineError> {
    match year_level.trim().to_lowercase().as_str() {
        "first_year" | "1st_year" | "1" => Ok(1),
        "second_year" | "2nd_year" | "2" => Ok(2),
        "third_year" | "3rd_year" | "3" => Ok(3),
        "fourth_year" | "4th_year" | "4" => Ok(4),
        "fifth_year" | "5th_year" | "5" => Ok(5),
        other => Err(EngineError::UnknownYearLevel(other.to_string())),
    }
}
