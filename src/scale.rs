use crate::models::LevelKey;

/// Direction of a level's grading scale. Elementary and Junior High grade on
/// 0-100 where higher is better; Senior High and College grade on 1.0-5.0
/// where lower is better. Every comparison in the engine routes through this
/// type so the direction logic lives in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    HigherIsBetter,
    LowerIsBetter,
}

impl ScaleDirection {
    pub fn for_level(key: LevelKey) -> Self {
        match key {
            LevelKey::Elementary | LevelKey::JuniorHighschool => ScaleDirection::HigherIsBetter,
            LevelKey::SeniorHighschool | LevelKey::College => ScaleDirection::LowerIsBetter,
        }
    }

    pub fn is_lower_better(&self) -> bool {
        matches!(self, ScaleDirection::LowerIsBetter)
    }

    /// The better of two grades on this scale.
    pub fn best(&self, a: f64, b: f64) -> f64 {
        if self.is_lower_better() {
            a.min(b)
        } else {
            a.max(b)
        }
    }

    /// The worse of two grades on this scale.
    pub fn worst(&self, a: f64, b: f64) -> f64 {
        if self.is_lower_better() {
            a.max(b)
        } else {
            a.min(b)
        }
    }

    /// True when `value` is at least as good as `threshold`. On a
    /// lower-is-better scale "meets the minimum" means `value <= threshold`.
    pub fn meets_minimum(&self, value: f64, threshold: f64) -> bool {
        if self.is_lower_better() {
            value <= threshold
        } else {
            value >= threshold
        }
    }

    /// True when `value` is no better than the ceiling `threshold`.
    pub fn meets_maximum(&self, value: f64, threshold: f64) -> bool {
        if self.is_lower_better() {
            value >= threshold
        } else {
            value <= threshold
        }
    }
}
