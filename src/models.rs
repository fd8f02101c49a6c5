use serde::Serialize;
use uuid::Uuid;

/// Contract violations. Expected empty states (no periods, no grades, no
/// criteria) are not errors; they surface as a non-qualified result instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown academic level key '{0}'")]
    UnknownLevelKey(String),
    #[error("unknown grading period type '{0}'")]
    UnknownPeriodType(String),
    #[error("unknown year level '{0}'")]
    UnknownYearLevel(String),
    #[error("honor criterion {0} has no academic level association")]
    CriterionWithoutLevel(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKey {
    Elementary,
    JuniorHighschool,
    SeniorHighschool,
    College,
}

impl LevelKey {
    pub fn parse(key: &str) -> Result<Self, EngineError> {
        match key {
            "elementary" => Ok(LevelKey::Elementary),
            "junior_highschool" => Ok(LevelKey::JuniorHighschool),
            "senior_highschool" => Ok(LevelKey::SeniorHighschool),
            "college" => Ok(LevelKey::College),
            other => Err(EngineError::UnknownLevelKey(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelKey::Elementary => "elementary",
            LevelKey::JuniorHighschool => "junior_highschool",
            LevelKey::SeniorHighschool => "senior_highschool",
            LevelKey::College => "college",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcademicLevel {
    pub id: Uuid,
    pub key: LevelKey,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Quarter,
    Midterm,
    Prefinal,
    Final,
    Semester,
}

impl PeriodType {
    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value {
            "quarter" => Ok(PeriodType::Quarter),
            "midterm" => Ok(PeriodType::Midterm),
            "prefinal" => Ok(PeriodType::Prefinal),
            "final" => Ok(PeriodType::Final),
            "semester" => Ok(PeriodType::Semester),
            other => Err(EngineError::UnknownPeriodType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradingPeriod {
    pub id: Uuid,
    pub code: String,
    pub period_type: PeriodType,
    pub parent_id: Option<Uuid>,
    pub weight: Option<f64>,
    pub sort_order: i32,
    pub is_active: bool,
    pub is_calculated: bool,
}

impl GradingPeriod {
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct RawGrade {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub grading_period_id: Uuid,
    pub school_year: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HonorType {
    pub id: Uuid,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct HonorCriterion {
    pub id: Uuid,
    pub academic_level_id: Option<Uuid>,
    pub honor_type: HonorType,
    pub min_gpa: Option<f64>,
    pub max_gpa: Option<f64>,
    pub min_grade: Option<f64>,
    pub min_grade_all: Option<f64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub require_consistent_honor: bool,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub student_number: String,
    pub academic_level_id: Uuid,
    pub year_level: Option<String>,
    pub is_active: bool,
}

/// One period's isolated mean, kept for the result breakdown and for the
/// consistency check.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodAverage {
    pub period_id: Uuid,
    pub code: String,
    pub semester: u8,
    pub average: f64,
    pub weight: f64,
    pub grade_count: usize,
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub average: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub periods: Vec<PeriodAverage>,
    pub total_subjects: usize,
    pub grade_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Qualification {
    pub honor_type: HonorType,
    pub criterion_id: Uuid,
    pub gpa: f64,
    pub min_grade: f64,
    pub max_grade: f64,
    pub breakdown: Vec<PeriodAverage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualificationResult {
    pub qualified: bool,
    pub qualifications: Vec<Qualification>,
    pub average_grade: Option<f64>,
    pub min_grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub total_subjects: usize,
    pub reason: Option<String>,
}

impl QualificationResult {
    pub fn not_applicable(reason: &str) -> Self {
        QualificationResult {
            qualified: false,
            qualifications: Vec::new(),
            average_grade: None,
            min_grade: None,
            max_grade: None,
            total_subjects: 0,
            reason: Some(reason.to_string()),
        }
    }
}
