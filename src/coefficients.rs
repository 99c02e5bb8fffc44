use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_COEFFICIENT: u32 = 2;

const STANDARD_COEFFICIENTS: &[(&str, u32)] = &[
    ("Français", 4),
    ("Mathématiques", 4),
    ("Anglais", 3),
    ("Sciences", 3),
    ("Histoire", 2),
    ("Géographie", 2),
    ("EPS", 1),
    ("Arts", 1),
];

/// Subject name to weight lookup. Names match exactly, unknown subjects get
/// the default weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientTable {
    subjects: HashMap<String, u32>,
    default: u32,
}

#[derive(Deserialize)]
struct CoefficientFile {
    #[serde(default)]
    default: Option<u32>,
    subjects: HashMap<String, u32>,
}

impl CoefficientTable {
    pub fn new(subjects: HashMap<String, u32>, default: u32) -> Self {
        Self { subjects, default }
    }

    pub fn standard() -> Self {
        let subjects = STANDARD_COEFFICIENTS
            .iter()
            .map(|(name, coefficient)| (name.to_string(), *coefficient))
            .collect();
        Self::new(subjects, DEFAULT_COEFFICIENT)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read coefficient table {}", path.display()))?;
        let file: CoefficientFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid coefficient table {}", path.display()))?;
        Ok(Self::new(
            file.subjects,
            file.default.unwrap_or(DEFAULT_COEFFICIENT),
        ))
    }

    pub fn coefficient(&self, subject_name: &str) -> u32 {
        self.subjects
            .get(subject_name)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for CoefficientTable {
    fn default() -> Self {
        Self::standard()
    }
}
