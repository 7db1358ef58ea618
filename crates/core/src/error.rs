//! Error types for altermap

use thiserror::Error;

/// Main error type for altermap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band count mismatch for {what}: expected {expected}, got {actual}")]
    BandCountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Pixel count mismatch: expected {expected}, got {actual}")]
    PixelCountMismatch { expected: usize, actual: usize },

    #[error("Empty input: {what}")]
    EmptyInput { what: &'static str },

    #[error("Non-finite values in {what}")]
    NonFiniteInput { what: &'static str },

    #[error("Image too small: {rows}x{cols} (minimum {min}x{min})")]
    ImageTooSmall { rows: usize, cols: usize, min: usize },

    #[error("Singular covariance matrix {which}: {reason}")]
    SingularCovariance { which: &'static str, reason: String },

    #[error("Degenerate clustering: {0}")]
    DegenerateClustering(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error stems from caller-supplied input (shape, size,
    /// conditioning or parameter problems) rather than an internal failure.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidDimensions { .. }
                | Error::SizeMismatch { .. }
                | Error::BandCountMismatch { .. }
                | Error::PixelCountMismatch { .. }
                | Error::EmptyInput { .. }
                | Error::NonFiniteInput { .. }
                | Error::ImageTooSmall { .. }
                | Error::SingularCovariance { .. }
                | Error::InvalidParameter { .. }
        )
    }
}

/// Result type alias for altermap operations
pub type Result<T> = std::result::Result<T, Error>;
