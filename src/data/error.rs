use std::path::PathBuf;

use thiserror::Error;

/// Error structure for dataset loading and label encoding
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Unable to open file: {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Line {line}: {value:?} is not a number!")]
    Parse { line: u64, value: String },

    #[error("Line {line}: expected {expected} one-hot values, but got {got}!")]
    BadLabelWidth { line: u64, expected: usize, got: usize },

    #[error("Cannot one-hot encode label {label} with {categories} categories!")]
    LabelOutOfRange { label: usize, categories: usize },

    #[error("Invalid one-hot encoded vector size: expected {expected}, but got {got}!")]
    BadEncodingWidth { expected: usize, got: usize },

    #[error("Invalid one-hot encoded vector!")]
    NotOneHot,

    #[error("Training fraction must be in (0, 1], but got {0}!")]
    BadFraction(f64),
}
