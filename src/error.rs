/// Errors raised while computing or rendering bulletins.
#[derive(thiserror::Error, Debug)]
pub enum BulletinError {
    /// A required input (term, student selection, identifier) was not supplied.
    #[error("missing input: {0}")]
    MissingInput(String),
    /// Terms are numbered 1 and 2.
    #[error("invalid term {0}, expected 1 or 2")]
    InvalidTerm(i32),
    /// The annual average needs the first-term overall average.
    #[error("term 2 bulletin for `{0}` requires a prior term average")]
    MissingPriorAverage(String),
    /// Scores are marked out of 20.
    #[error("score {score} for `{subject}` is outside 0..=20")]
    InvalidScore { subject: String, score: f64 },
    /// Writing to the output document failed. Fatal for the whole batch.
    #[error("failed to render bulletin: {0}")]
    Render(String),
}
