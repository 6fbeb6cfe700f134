use std::error::Error;
use std::fmt;

/// Validation and model errors raised by the evaluation workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Classification type was neither "Binary" nor "Multiple"
    InvalidClassificationType(String),
    /// Split or hold-out fraction outside (0, 1), or one that empties a subset
    InvalidFraction { fraction: f64, n_samples: usize },
    /// Fold count below 2 or above the number of available records
    InvalidFoldCount { k: usize, n_samples: usize },
    EmptySearchSpace,
    EmptyParameter(String),
    UnknownParameter { algorithm: String, name: String },
    InvalidParameterValue { name: String, expected: &'static str },
    LengthMismatch { expected: usize, found: usize },
    EmptyInput,
    /// AUC is undefined when only one class is present
    SingleClass,
    Model(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::InvalidClassificationType(value) => write!(
                f,
                "Invalid classification type '{}': expected 'Binary' or 'Multiple'",
                value
            ),
            EvalError::InvalidFraction { fraction, n_samples } => write!(
                f,
                "Fraction {} is invalid for {} records: it must lie in (0, 1) and leave both subsets non-empty",
                fraction, n_samples
            ),
            EvalError::InvalidFoldCount { k, n_samples } => write!(
                f,
                "Cannot run {}-fold cross-validation on {} records: k must be at least 2 and at most the number of records",
                k, n_samples
            ),
            EvalError::EmptySearchSpace => write!(f, "Hyperparameter search space is empty"),
            EvalError::EmptyParameter(name) => {
                write!(f, "Hyperparameter '{}' has no candidate values", name)
            }
            EvalError::UnknownParameter { algorithm, name } => write!(
                f,
                "Unknown hyperparameter '{}' for algorithm {}",
                name, algorithm
            ),
            EvalError::InvalidParameterValue { name, expected } => write!(
                f,
                "Hyperparameter '{}' expects a value of type {}",
                name, expected
            ),
            EvalError::LengthMismatch { expected, found } => write!(
                f,
                "Length mismatch: expected {} values, found {}",
                expected, found
            ),
            EvalError::EmptyInput => write!(f, "Input contains no records"),
            EvalError::SingleClass => write!(
                f,
                "Only one class present in the labels; ROC AUC is not defined"
            ),
            EvalError::Model(msg) => write!(f, "Model error: {}", msg),
        }
    }
}

impl Error for EvalError {}

pub type Result<T> = std::result::Result<T, EvalError>;
