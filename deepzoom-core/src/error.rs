use thiserror::Error;

/// Errors originating from the fractal math and iteration layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid escape radius: {0} (must be > 0.0)")]
    InvalidEscapeRadius(f64),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("precision overflow: requested magnitude exceeds the representable exponent range")]
    PrecisionOverflow,
}
