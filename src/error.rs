//! Error types for the coexnet library.

use thiserror::Error;

/// Main error type for the library.
///
/// Every variant is a data-quality or configuration condition that the
/// caller resolves by reparameterizing the run; nothing here is retried
/// internally.
#[derive(Error, Debug)]
pub enum CoexError {
    #[error("feature filtering removed every column; relax the variance or uniqueness thresholds")]
    EmptyFeatureSet,

    #[error("feature '{feature}' has zero variance; correlation is undefined")]
    DegenerateColumn { feature: String },

    #[error(
        "no candidate power reached the scale-free fit threshold \
         (best: power {best_power} with fit index {best_fit:.3}); \
         supply an explicit soft-threshold power"
    )]
    NoScaleFreeFit { best_power: f64, best_fit: f64 },

    #[error("no module met the minimum size; every variable is unassigned")]
    NoModulesFound,

    #[error("trait '{name}' is constant across its observed samples; correlation is undefined")]
    ConstantTrait { name: String },

    #[error("trait '{name}' has only {observed} non-missing observations; at least 3 are required")]
    InsufficientObservations { name: String, observed: usize },

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("sample id mismatch: {0}")]
    SampleMismatch(String),

    #[error("unknown {kind} name '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("non-finite value for feature '{feature}' in sample '{sample}'")]
    NonFiniteValue { feature: String, sample: String },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("parse error at row {row}, column {col}: '{value}'")]
    Parse {
        row: usize,
        col: usize,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, CoexError>;
