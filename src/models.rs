use std::fmt;

use uuid::Uuid;

use crate::error::BulletinError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentKind {
    Class,
    Exam,
    Other(String),
}

impl From<&str> for AssessmentKind {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "class" | "devoir" | "cc" => AssessmentKind::Class,
            "exam" | "examen" | "composition" => AssessmentKind::Exam,
            _ => AssessmentKind::Other(value.to_string()),
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentKind::Class => f.write_str("class"),
            AssessmentKind::Exam => f.write_str("exam"),
            AssessmentKind::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    First,
    Second,
}

impl Term {
    pub fn number(self) -> i32 {
        match self {
            Term::First => 1,
            Term::Second => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Term::First => "Semestre 1",
            Term::Second => "Semestre 2",
        }
    }
}

impl TryFrom<i32> for Term {
    type Error = BulletinError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Term::First),
            2 => Ok(Term::Second),
            other => Err(BulletinError::InvalidTerm(other)),
        }
    }
}

/// One grade as read from storage. Never mutated after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub subject_name: String,
    pub kind: AssessmentKind,
    pub score: f64,
}

impl GradeRecord {
    pub fn new(subject_name: impl Into<String>, kind: AssessmentKind, score: f64) -> Self {
        Self {
            subject_name: subject_name.into(),
            kind,
            score,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubjectAggregate {
    pub subject_name: String,
    pub class_scores: Vec<f64>,
    pub exam_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectResult {
    pub subject_name: String,
    pub coefficient: u32,
    pub class_average: f64,
    pub exam_average: f64,
    pub subject_average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionStatus {
    Admitted,
    MustRepeat,
}

impl PromotionStatus {
    pub fn label(self) -> &'static str {
        match self {
            PromotionStatus::Admitted => "ADMIS(E) EN CLASSE SUPÉRIEURE",
            PromotionStatus::MustRepeat => "REDOUBLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualOutcome {
    pub annual_average: f64,
    pub status: PromotionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulletinSummary {
    pub total_coefficients: u32,
    pub weighted_sum: f64,
    pub overall_average: f64,
    /// Only set for the second term.
    pub annual: Option<AnnualOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentIdentity {
    pub id: Uuid,
    pub full_name: String,
    pub class_name: String,
    pub registration_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolIdentity {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct BulletinPage {
    pub student: StudentIdentity,
    pub results: Vec<SubjectResult>,
    pub summary: BulletinSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_english_and_french_labels() {
        assert_eq!(AssessmentKind::from("Devoir"), AssessmentKind::Class);
        assert_eq!(AssessmentKind::from(" cc "), AssessmentKind::Class);
        assert_eq!(AssessmentKind::from("EXAM"), AssessmentKind::Exam);
        assert_eq!(AssessmentKind::from("composition"), AssessmentKind::Exam);
        assert_eq!(
            AssessmentKind::from("oral"),
            AssessmentKind::Other("oral".to_string())
        );
        assert_eq!(AssessmentKind::from("examen").to_string(), "exam");
    }

    #[test]
    fn only_terms_one_and_two_exist() {
        assert_eq!(Term::try_from(1).unwrap(), Term::First);
        assert_eq!(Term::try_from(2).unwrap().number(), 2);
        assert!(matches!(Term::try_from(0), Err(BulletinError::InvalidTerm(0))));
        assert!(Term::try_from(3).is_err());
    }
}
