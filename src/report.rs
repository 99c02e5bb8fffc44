use std::fmt::Write;

use chrono::NaiveDate;

use crate::bulletin::round2;
use crate::models::{BulletinPage, PromotionStatus, SchoolIdentity, Term};

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMean {
    pub subject_name: String,
    pub student_count: usize,
    pub mean_average: f64,
}

/// Class mean per subject, in the order subjects first appear across pages.
pub fn summarize_by_subject(pages: &[BulletinPage]) -> Vec<SubjectMean> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: std::collections::HashMap<String, (usize, f64)> =
        std::collections::HashMap::new();

    for result in pages.iter().flat_map(|page| page.results.iter()) {
        let entry = totals
            .entry(result.subject_name.clone())
            .or_insert_with(|| {
                order.push(result.subject_name.clone());
                (0, 0.0)
            });
        entry.0 += 1;
        entry.1 += result.subject_average;
    }

    order
        .into_iter()
        .map(|subject_name| {
            let (student_count, total) = totals.get(&subject_name).copied().unwrap_or((0, 0.0));
            SubjectMean {
                mean_average: if student_count == 0 {
                    0.0
                } else {
                    round2(total / student_count as f64)
                },
                subject_name,
                student_count,
            }
        })
        .collect()
}

/// Pages sorted by overall average, best first. Ties keep input order.
pub fn rank(pages: &[BulletinPage]) -> Vec<&BulletinPage> {
    let mut ranked: Vec<&BulletinPage> = pages.iter().collect();
    ranked.sort_by(|a, b| {
        b.summary
            .overall_average
            .partial_cmp(&a.summary.overall_average)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

pub fn build_class_report(
    school: &SchoolIdentity,
    class_label: &str,
    term: Term,
    generated_on: NaiveDate,
    pages: &[BulletinPage],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {} - Class Report", school.name);
    let _ = writeln!(
        output,
        "Generated for {} ({}) on {}",
        class_label,
        term.label(),
        generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    if pages.is_empty() {
        let _ = writeln!(output, "No students in this selection.");
    } else {
        for (position, page) in rank(pages).iter().enumerate() {
            let _ = write!(
                output,
                "{}. {} ({}) overall {:.2}",
                position + 1,
                page.student.full_name,
                page.student.registration_id,
                page.summary.overall_average
            );
            if let Some(annual) = page.summary.annual {
                let _ = write!(
                    output,
                    ", annual {:.2}, {}",
                    annual.annual_average,
                    annual.status.label()
                );
            }
            let _ = writeln!(output);
        }
    }

    let subjects = summarize_by_subject(pages);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Means");

    if subjects.is_empty() {
        let _ = writeln!(output, "No grades recorded for this term.");
    } else {
        for subject in subjects.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.2} across {} students",
                subject.subject_name, subject.mean_average, subject.student_count
            );
        }
    }

    if term == Term::Second {
        let admitted = pages
            .iter()
            .filter_map(|page| page.summary.annual)
            .filter(|annual| annual.status == PromotionStatus::Admitted)
            .count();
        let _ = writeln!(output);
        let _ = writeln!(output, "## Promotion");
        let _ = writeln!(output, "- Admitted: {}", admitted);
        let _ = writeln!(output, "- Repeating: {}", pages.len() - admitted);
    }

    output
}
