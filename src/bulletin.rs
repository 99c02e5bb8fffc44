use std::collections::HashMap;

use crate::coefficients::CoefficientTable;
use crate::error::BulletinError;
use crate::models::{
    AnnualOutcome, AssessmentKind, BulletinPage, BulletinSummary, GradeRecord, PromotionStatus,
    StudentIdentity, SubjectAggregate, SubjectResult, Term,
};

pub const CLASS_WEIGHT: f64 = 0.4;
pub const EXAM_WEIGHT: f64 = 0.6;
pub const PASSING_AVERAGE: f64 = 12.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Groups records by raw subject name, keeping the order in which each
/// subject first appears.
pub fn aggregate_by_subject(records: &[GradeRecord]) -> Vec<SubjectAggregate> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut aggregates: Vec<SubjectAggregate> = Vec::new();

    for record in records {
        let index = *positions
            .entry(record.subject_name.as_str())
            .or_insert_with(|| {
                aggregates.push(SubjectAggregate {
                    subject_name: record.subject_name.clone(),
                    ..SubjectAggregate::default()
                });
                aggregates.len() - 1
            });
        let aggregate = &mut aggregates[index];

        match record.kind {
            AssessmentKind::Class => aggregate.class_scores.push(record.score),
            AssessmentKind::Exam => aggregate.exam_scores.push(record.score),
            AssessmentKind::Other(_) => {}
        }
    }

    aggregates
}

pub fn compute_subject_results(
    records: &[GradeRecord],
    table: &CoefficientTable,
) -> Vec<SubjectResult> {
    aggregate_by_subject(records)
        .into_iter()
        .map(|aggregate| {
            let class_average = mean(&aggregate.class_scores);
            let exam_average = mean(&aggregate.exam_scores);
            SubjectResult {
                coefficient: table.coefficient(&aggregate.subject_name),
                subject_average: round2(class_average * CLASS_WEIGHT + exam_average * EXAM_WEIGHT),
                subject_name: aggregate.subject_name,
                class_average,
                exam_average,
            }
        })
        .collect()
}

fn weighted_average(results: &[SubjectResult]) -> (u32, f64, f64) {
    let total_coefficients: u32 = results.iter().map(|result| result.coefficient).sum();
    let weighted_sum: f64 = results
        .iter()
        .map(|result| result.subject_average * result.coefficient as f64)
        .sum();
    let overall_average = if total_coefficients > 0 {
        round2(weighted_sum / total_coefficients as f64)
    } else {
        0.0
    };
    (total_coefficients, weighted_sum, overall_average)
}

/// `prior_term_average` is required for the second term and ignored for the
/// first. `label` only feeds the error message.
pub fn compute_summary(
    results: &[SubjectResult],
    term: Term,
    prior_term_average: Option<f64>,
    label: &str,
) -> Result<BulletinSummary, BulletinError> {
    let (total_coefficients, weighted_sum, overall_average) = weighted_average(results);

    let annual = match term {
        Term::First => None,
        Term::Second => {
            let prior = prior_term_average
                .ok_or_else(|| BulletinError::MissingPriorAverage(label.to_string()))?;
            let annual_average = round2((overall_average + prior) / 2.0);
            let status = if annual_average >= PASSING_AVERAGE {
                PromotionStatus::Admitted
            } else {
                PromotionStatus::MustRepeat
            };
            Some(AnnualOutcome {
                annual_average,
                status,
            })
        }
    };

    Ok(BulletinSummary {
        total_coefficients,
        weighted_sum,
        overall_average,
        annual,
    })
}

/// Overall average for the first term, used as the prior value of a
/// second-term bulletin.
pub fn prior_term_average(term1_records: &[GradeRecord], table: &CoefficientTable) -> f64 {
    let (_, _, overall_average) = weighted_average(&compute_subject_results(term1_records, table));
    overall_average
}

/// Prior value for a bulletin: the explicit override if given, otherwise the
/// first-term average when first-term grades exist. Always `None` for term 1.
pub fn resolve_prior_average(
    explicit: Option<f64>,
    term: Term,
    term1_records: &[GradeRecord],
    table: &CoefficientTable,
) -> Option<f64> {
    match term {
        Term::First => None,
        Term::Second => explicit.or_else(|| {
            (!term1_records.is_empty()).then(|| prior_term_average(term1_records, table))
        }),
    }
}

pub fn build_page(
    student: StudentIdentity,
    records: &[GradeRecord],
    term: Term,
    prior_term_average: Option<f64>,
    table: &CoefficientTable,
) -> Result<BulletinPage, BulletinError> {
    let results = compute_subject_results(records, table);
    let summary = compute_summary(&results, term, prior_term_average, &student.registration_id)?;
    Ok(BulletinPage {
        student,
        results,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(subject: &str, kind: AssessmentKind, score: f64) -> GradeRecord {
        GradeRecord::new(subject, kind, score)
    }

    fn sample_student() -> StudentIdentity {
        StudentIdentity {
            id: Uuid::new_v4(),
            full_name: "Awa Diallo".to_string(),
            class_name: "6e A".to_string(),
            registration_id: "STK-0001".to_string(),
        }
    }

    fn scenario_records() -> Vec<GradeRecord> {
        vec![
            record("Français", AssessmentKind::Class, 14.0),
            record("Français", AssessmentKind::Exam, 16.0),
            record("EPS", AssessmentKind::Class, 10.0),
        ]
    }

    fn result(subject: &str, coefficient: u32, subject_average: f64) -> SubjectResult {
        SubjectResult {
            subject_name: subject.to_string(),
            coefficient,
            class_average: subject_average,
            exam_average: subject_average,
            subject_average,
        }
    }

    #[test]
    fn first_term_scenario_matches_expected_averages() {
        let table = CoefficientTable::standard();
        let results = compute_subject_results(&scenario_records(), &table);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].subject_name, "Français");
        assert_eq!(results[0].coefficient, 4);
        assert_eq!(results[0].class_average, 14.0);
        assert_eq!(results[0].exam_average, 16.0);
        assert!((results[0].subject_average - 15.20).abs() < 1e-9);
        assert_eq!(results[1].subject_name, "EPS");
        assert_eq!(results[1].coefficient, 1);
        assert_eq!(results[1].exam_average, 0.0);
        assert!((results[1].subject_average - 4.00).abs() < 1e-9);

        let summary = compute_summary(&results, Term::First, None, "STK-0001").unwrap();
        assert_eq!(summary.total_coefficients, 5);
        assert!((summary.weighted_sum - 64.80).abs() < 1e-9);
        assert!((summary.overall_average - 12.96).abs() < 1e-9);
        assert!(summary.annual.is_none());
    }

    #[test]
    fn missing_kind_averages_are_zero() {
        let table = CoefficientTable::standard();
        let results = compute_subject_results(
            &[record("Anglais", AssessmentKind::Exam, 12.0)],
            &table,
        );
        assert_eq!(results[0].class_average, 0.0);
        assert!(!results[0].class_average.is_nan());
        assert!((results[0].subject_average - 7.2).abs() < 1e-9);
    }

    #[test]
    fn unrecognised_kinds_are_dropped_but_subject_kept() {
        let table = CoefficientTable::standard();
        let results = compute_subject_results(
            &[
                record("Arts", AssessmentKind::Other("oral".to_string()), 18.0),
                record("Arts", AssessmentKind::Class, 8.0),
            ],
            &table,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].class_average, 8.0);
        assert_eq!(results[0].exam_average, 0.0);
    }

    #[test]
    fn subjects_keep_encounter_order_and_raw_names() {
        let table = CoefficientTable::standard();
        let results = compute_subject_results(
            &[
                record("Sciences", AssessmentKind::Class, 11.0),
                record("Anglais", AssessmentKind::Class, 13.0),
                record("Sciences", AssessmentKind::Exam, 9.0),
                record("anglais", AssessmentKind::Exam, 15.0),
            ],
            &table,
        );
        let names: Vec<&str> = results.iter().map(|r| r.subject_name.as_str()).collect();
        assert_eq!(names, vec!["Sciences", "Anglais", "anglais"]);
        assert_eq!(results[2].coefficient, 2);
    }

    #[test]
    fn subject_average_is_rounded_weighted_mix() {
        let table = CoefficientTable::standard();
        let results = compute_subject_results(
            &[
                record("Mathématiques", AssessmentKind::Class, 13.0),
                record("Mathématiques", AssessmentKind::Class, 14.5),
                record("Mathématiques", AssessmentKind::Exam, 11.25),
            ],
            &table,
        );
        let r = &results[0];
        assert_eq!(r.class_average, 13.75);
        assert_eq!(r.subject_average, round2(13.75 * 0.4 + 11.25 * 0.6));
        assert!((r.subject_average - 12.25).abs() < 1e-9);
    }

    #[test]
    fn computation_is_repeatable() {
        let table = CoefficientTable::standard();
        let records = scenario_records();
        assert_eq!(
            compute_subject_results(&records, &table),
            compute_subject_results(&records, &table)
        );
    }

    #[test]
    fn empty_results_give_zero_overall() {
        let summary = compute_summary(&[], Term::First, None, "STK-0001").unwrap();
        assert_eq!(summary.total_coefficients, 0);
        assert_eq!(summary.weighted_sum, 0.0);
        assert_eq!(summary.overall_average, 0.0);
    }

    #[test]
    fn second_term_requires_prior_average() {
        let err = compute_summary(&[result("Arts", 1, 10.0)], Term::Second, None, "STK-0009")
            .unwrap_err();
        assert!(matches!(err, BulletinError::MissingPriorAverage(ref id) if id == "STK-0009"));
    }

    #[test]
    fn second_term_twelve_exactly_is_admitted() {
        let summary =
            compute_summary(&[result("Arts", 1, 10.0)], Term::Second, Some(14.0), "x").unwrap();
        let annual = summary.annual.unwrap();
        assert_eq!(annual.annual_average, 12.0);
        assert_eq!(annual.status, PromotionStatus::Admitted);
    }

    #[test]
    fn second_term_below_twelve_must_repeat() {
        let summary =
            compute_summary(&[result("Arts", 1, 9.5)], Term::Second, Some(14.46), "x").unwrap();
        let annual = summary.annual.unwrap();
        assert!((annual.annual_average - 11.98).abs() < 1e-9);
        assert_eq!(annual.status, PromotionStatus::MustRepeat);
    }

    #[test]
    fn first_term_ignores_prior_average() {
        let summary =
            compute_summary(&[result("Arts", 1, 9.5)], Term::First, Some(18.0), "x").unwrap();
        assert!(summary.annual.is_none());
    }

    #[test]
    fn overall_average_uses_coefficients() {
        let results = vec![result("Français", 4, 15.0), result("Inconnu", 2, 9.0)];
        let summary = compute_summary(&results, Term::First, None, "x").unwrap();
        assert_eq!(summary.total_coefficients, 6);
        assert_eq!(summary.overall_average, round2((60.0 + 18.0) / 6.0));
    }

    #[test]
    fn prior_term_average_matches_first_term_summary() {
        let table = CoefficientTable::standard();
        let prior = prior_term_average(&scenario_records(), &table);
        assert!((prior - 12.96).abs() < 1e-9);
        assert_eq!(prior_term_average(&[], &table), 0.0);
    }

    #[test]
    fn prior_average_resolution() {
        let table = CoefficientTable::standard();
        let term1 = scenario_records();
        assert_eq!(resolve_prior_average(Some(14.5), Term::First, &term1, &table), None);
        assert_eq!(resolve_prior_average(Some(14.5), Term::Second, &term1, &table), Some(14.5));
        let computed = resolve_prior_average(None, Term::Second, &term1, &table).unwrap();
        assert!((computed - 12.96).abs() < 1e-9);
        assert_eq!(resolve_prior_average(None, Term::Second, &[], &table), None);
    }

    #[test]
    fn build_page_uses_injected_table() {
        let mut subjects = HashMap::new();
        subjects.insert("EPS".to_string(), 3);
        let table = CoefficientTable::new(subjects, 1);

        let page = build_page(sample_student(), &scenario_records(), Term::First, None, &table)
            .unwrap();
        assert_eq!(page.results[0].coefficient, 1);
        assert_eq!(page.results[1].coefficient, 3);
        assert_eq!(page.summary.total_coefficients, 4);
        assert!((page.summary.overall_average - round2((15.2 + 12.0) / 4.0)).abs() < 1e-9);
    }

    #[test]
    fn rounding_is_two_decimals() {
        assert_eq!(round2(12.345_678), 12.35);
        assert_eq!(round2(4.0), 4.0);
        assert_eq!(round2(0.0), 0.0);
    }
}
