//! Error types for weak-form assembly.
//!
//! Every fallible step of the pipeline surfaces one of these variants to the
//! caller; assembly either yields a complete operator or fails with the
//! condition that was violated. Numerical degeneracy inside ACA is not an
//! error: such blocks fall back to dense storage.

use math_audio_linalg::LinalgError;
use thiserror::Error;

/// Errors that can occur while configuring or assembling an operator.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// An option has an invalid value or combination.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A space, grid or point set has no entries.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate at point {index}")]
    NonFiniteCoordinate {
        /// Index of the offending point
        index: usize,
    },

    /// Buffers or index lists do not agree in length.
    #[error("size mismatch in {context}: expected {expected}, got {found}")]
    SizeMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        found: usize,
    },

    /// A quadrature order above the supported maximum was requested.
    #[error("quadrature order {requested} is outside the supported range 1..={maximum}")]
    QuadratureOrderOutOfRange {
        /// Requested order
        requested: usize,
        /// Largest supported order
        maximum: usize,
    },

    /// The kernel needs geometric data that the grid cannot supply.
    #[error("grid cannot supply {missing} required by kernel {kernel}")]
    MissingGeometricDependency {
        /// Name of the kernel
        kernel: String,
        /// Names of the missing quantities
        missing: String,
    },

    /// The requested combination is not implemented.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Spaces combined in one operator are incompatible.
    #[error("incompatible spaces: {0}")]
    IncompatibleSpaces(String),

    /// The grid connectivity or geometry is invalid.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Error from the linear algebra layer.
    #[error(transparent)]
    Linalg(#[from] LinalgError),

    /// File system error while reading or writing configuration or diagnostics.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssemblyError {
    /// Whether the error stems from user configuration rather than from the inputs.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_)
                | Self::QuadratureOrderOutOfRange { .. }
                | Self::UnsupportedConfiguration(_)
                | Self::Json(_)
        )
    }
}

/// Result alias for assembly operations.
pub type Result<T> = std::result::Result<T, AssemblyError>;
