use thiserror::Error;

/// Failures of the concentration field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("position ({x:.4}, {y:.4}) lies outside the {resolution}x{resolution} field grid")]
    OutOfDomain { x: f64, y: f64, resolution: usize },

    #[error("implicit operator has a zero pivot at row {row}")]
    Singular { row: usize },

    #[error("invalid field grid: {0}")]
    InvalidGrid(String),
}
