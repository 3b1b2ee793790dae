// ⚠️ Error Taxonomy - what can go wrong between raw facts and a comparison
//
// Not everything in the pipeline is an error:
// - "nothing to load" is MergeOutcome::NothingToApply
// - division by a zero mean is Ratio::Undefined
// Only the cases below surface as Err.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactError {
    /// One record could not be turned into a NormalizedFact.
    /// Recoverable: the record is rejected, the rest of the batch continues.
    #[error("malformed input at record {line}: field `{field}` {reason}")]
    MalformedInput {
        line: usize,
        field: &'static str,
        reason: String,
    },

    /// More distinct entities than palette colors. Fatal for that load.
    #[error("palette exhausted: {entities} entities but only {palette} colors available")]
    PaletteExhausted { entities: usize, palette: usize },

    #[error("entity `{0}` is not present in the working dataset")]
    UnknownEntity(String),

    #[error("no color assigned to entity `{0}`")]
    MissingColor(String),

    /// Failure reported by a FactsSource (network, rate limit, bad file...)
    #[error(transparent)]
    Source(#[from] anyhow::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FactError {
    pub fn malformed(line: usize, field: &'static str, reason: impl Into<String>) -> Self {
        FactError::MalformedInput {
            line,
            field,
            reason: reason.into(),
        }
    }

    /// Per-record problems the caller can skip over
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FactError::MalformedInput { .. })
    }
}

pub type FactResult<T> = std::result::Result<T, FactError>;
