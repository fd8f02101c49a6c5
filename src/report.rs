use std::fmt::Write;

use chrono::Utc;

use crate::models::{AcademicLevel, QualificationResult, Student};

/// Honor-roll counts per honor type, ordered by count descending.
pub fn summarize_by_honor(results: &[(Student, QualificationResult)]) -> Vec<(String, usize)> {
    let mut map: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for (_, result) in results {
        for qualification in &result.qualifications {
            *map.entry(qualification.honor_type.name.clone()).or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<(String, usize)> = map.into_iter().collect();
    summaries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    summaries
}

pub fn build_report(
    level: &AcademicLevel,
    school_year: &str,
    results: &[(Student, QualificationResult)],
) -> String {
    let summaries = summarize_by_honor(results);
    let mut output = String::new();

    let _ = writeln!(output, "# Honor Roll Report");
    let _ = writeln!(
        output,
        "Generated for {} ({school_year}) on {}",
        level.name,
        Utc::now().date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Honors Awarded");

    if summaries.is_empty() {
        let _ = writeln!(output, "No students qualified for this school year.");
    } else {
        for (honor, count) in summaries.iter() {
            let _ = writeln!(output, "- {honor}: {count} student(s)");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Qualified Students");

    let qualified: Vec<&(Student, QualificationResult)> =
        results.iter().filter(|(_, r)| r.qualified).collect();
    if qualified.is_empty() {
        let _ = writeln!(output, "No students qualified for this school year.");
    } else {
        for (student, result) in qualified {
            let honors: Vec<&str> = result
                .qualifications
                .iter()
                .map(|q| q.honor_type.name.as_str())
                .collect();
            let _ = writeln!(
                output,
                "- {} ({}) average {:.2} across {} subject(s): {}",
                student.name,
                student.student_number,
                result.average_grade.unwrap_or(0.0),
                result.total_subjects,
                honors.join(", ")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Not Qualified");

    let rejected: Vec<&(Student, QualificationResult)> =
        results.iter().filter(|(_, r)| !r.qualified).collect();
    if rejected.is_empty() {
        let _ = writeln!(output, "Every calculated student qualified.");
    } else {
        for (student, result) in rejected {
            let _ = writeln!(
                output,
                "- {} ({}): {}",
                student.name,
                student.student_number,
                result.reason.as_deref().unwrap_or("no criterion satisfied")
            );
        }
    }

    output
}
