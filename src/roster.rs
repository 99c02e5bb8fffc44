use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::BulletinError;
use crate::models::{AssessmentKind, GradeRecord, SchoolIdentity, StudentIdentity, Term};

pub const MAX_SCORE: f64 = 20.0;

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRow {
    pub school: String,
    pub class_name: String,
    pub full_name: String,
    pub registration_id: String,
    pub subject: String,
    pub kind: String,
    pub score: f64,
    pub term: i32,
    #[serde(default)]
    pub source_key: Option<String>,
}

impl GradeRow {
    pub fn validate(&self) -> Result<Term, BulletinError> {
        if self.registration_id.trim().is_empty() {
            return Err(BulletinError::MissingInput(format!(
                "registration id for `{}`",
                self.full_name
            )));
        }
        if !(0.0..=MAX_SCORE).contains(&self.score) {
            return Err(BulletinError::InvalidScore {
                subject: self.subject.clone(),
                score: self.score,
            });
        }
        Term::try_from(self.term)
    }

    pub fn record(&self) -> GradeRecord {
        GradeRecord::new(
            self.subject.clone(),
            AssessmentKind::from(self.kind.as_str()),
            self.score,
        )
    }
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub school: String,
    pub student: StudentIdentity,
    pub term1: Vec<GradeRecord>,
    pub term2: Vec<GradeRecord>,
}

impl RosterEntry {
    pub fn records(&self, term: Term) -> &[GradeRecord] {
        match term {
            Term::First => &self.term1,
            Term::Second => &self.term2,
        }
    }
}

/// The one school shared by every selected student. Spanning several schools
/// is an error.
pub fn common_school<'a>(
    schools: impl IntoIterator<Item = &'a str>,
) -> Result<SchoolIdentity, BulletinError> {
    let mut distinct: Vec<&str> = Vec::new();
    for school in schools {
        if !distinct.contains(&school) {
            distinct.push(school);
        }
    }

    match distinct.as_slice() {
        [] => Err(BulletinError::MissingInput(
            "no students matched the selection".to_string(),
        )),
        [name] => Ok(SchoolIdentity {
            name: name.to_string(),
        }),
        many => Err(BulletinError::MissingInput(format!(
            "a single school (selection spans {}); pass --school",
            many.join(", ")
        ))),
    }
}

/// Students of a grade file in first-seen order, each with records in file
/// order.
#[derive(Debug, Clone)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
}

#[derive(Debug)]
pub struct RosterSelection<'a> {
    pub school: SchoolIdentity,
    pub entries: Vec<&'a RosterEntry>,
}

impl Roster {
    /// Rows arrive already validated, paired with their term.
    pub fn from_rows(rows: Vec<(GradeRow, Term)>) -> Result<Self, BulletinError> {
        if rows.is_empty() {
            return Err(BulletinError::MissingInput("grade file has no rows".to_string()));
        }

        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<RosterEntry> = Vec::new();

        for (row, term) in rows {
            let index = *positions
                .entry(row.registration_id.clone())
                .or_insert_with(|| {
                    entries.push(RosterEntry {
                        school: row.school.clone(),
                        student: StudentIdentity {
                            id: Uuid::new_v4(),
                            full_name: row.full_name.clone(),
                            class_name: row.class_name.clone(),
                            registration_id: row.registration_id.clone(),
                        },
                        term1: Vec::new(),
                        term2: Vec::new(),
                    });
                    entries.len() - 1
                });
            let entry = &mut entries[index];
            match term {
                Term::First => entry.term1.push(row.record()),
                Term::Second => entry.term2.push(row.record()),
            }
        }

        Ok(Self { entries })
    }

    /// Narrows the roster to a school and class, or to an explicit list of
    /// registration ids. Explicit ids keep the caller's order. The result
    /// must belong to exactly one school.
    pub fn select(
        &self,
        school: Option<&str>,
        class_name: Option<&str>,
        registration_ids: &[String],
    ) -> Result<RosterSelection<'_>, BulletinError> {
        let in_school = |entry: &RosterEntry| school.map_or(true, |name| entry.school == name);

        let entries: Vec<&RosterEntry> = if !registration_ids.is_empty() {
            registration_ids
                .iter()
                .map(|id| {
                    self.entries
                        .iter()
                        .find(|entry| &entry.student.registration_id == id && in_school(*entry))
                        .ok_or_else(|| BulletinError::MissingInput(format!("student `{id}`")))
                })
                .collect::<Result<_, _>>()?
        } else {
            self.entries
                .iter()
                .filter(|entry| in_school(*entry))
                .filter(|entry| class_name.map_or(true, |name| entry.student.class_name == name))
                .collect()
        };

        let school = common_school(entries.iter().map(|entry| entry.school.as_str()))?;
        Ok(RosterSelection { school, entries })
    }
}

pub fn read_rows(csv_path: &Path) -> anyhow::Result<Vec<(GradeRow, Term)>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<GradeRow>().enumerate() {
        // header is line 1
        let row = result.with_context(|| format!("line {}", index + 2))?;
        let term = row
            .validate()
            .with_context(|| format!("line {}", index + 2))?;
        rows.push((row, term));
    }

    Ok(rows)
}

pub fn load_csv(csv_path: &Path) -> anyhow::Result<Roster> {
    let rows = read_rows(csv_path)?;
    Ok(Roster::from_rows(rows)?)
}
