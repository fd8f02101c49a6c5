use crate::level::SelectionPolicy;
use crate::models::{HonorCriterion, Qualification};

/// Prunes the matcher's satisfied list down to the set the result retains.
/// `HighestMinGrade` keeps a singleton (your best honor, not every tier you
/// clear); the other policies retain the full ordered list.
pub fn select(
    policy: SelectionPolicy,
    satisfied: Vec<(HonorCriterion, Qualification)>,
) -> Vec<Qualification> {
    match policy {
        SelectionPolicy::HighestMinGrade => {
            let mut ranked = satisfied;
            ranked.sort_by(|(a, _), (b, _)| {
                let a_min = a.min_grade.unwrap_or(f64::NEG_INFINITY);
                let b_min = b.min_grade.unwrap_or(f64::NEG_INFINITY);
                b_min
                    .partial_cmp(&a_min)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            ranked
                .into_iter()
                .map(|(_, qualification)| qualification)
                .take(1)
                .collect()
        }
        SelectionPolicy::AllSatisfying | SelectionPolicy::LastSatisfiedWins => satisfied
            .into_iter()
            .map(|(_, qualification)| qualification)
            .collect(),
    }
}

/// The slice of retained qualifications the result sink actually writes.
/// Senior High keeps its legacy convention: only the last entry of the
/// criterion-iteration-ordered list is stored as "the" honor.
pub fn to_persist(policy: SelectionPolicy, retained: &[Qualification]) -> &[Qualification] {
    match policy {
        SelectionPolicy::LastSatisfiedWins => match retained.len() {
            0 => retained,
            n => &retained[n - 1..],
        },
        SelectionPolicy::HighestMinGrade | SelectionPolicy::AllSatisfying => retained,
    }
}
