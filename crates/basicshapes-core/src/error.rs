//! Error types for basicshapes.

use std::path::PathBuf;

use thiserror::Error;

use crate::voxel::Dtype;

/// The main error type for basicshapes operations.
#[derive(Error, Debug)]
pub enum ShapesError {
    /// A shape has non-positive, non-finite or otherwise malformed parameters.
    #[error("invalid shape{}: {reason}", shape_position(*.index))]
    InvalidShape {
        /// Position of the shape in its input sequence, when known.
        index: Option<usize>,
        reason: String,
    },

    /// The assembler was handed no shapes.
    #[error("no shapes supplied to the assembler")]
    EmptyShapeList,

    /// Grid dimensions, spacing or origin are unusable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Output path unwritable or input path unreadable.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted data is malformed or inconsistent.
    #[error("corrupt file '{}': {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    /// A file stores a different voxel type than the one requested.
    #[error("voxel type mismatch: expected {expected}, file stores {found}")]
    DtypeMismatch { expected: Dtype, found: Dtype },

    /// Additive compositing left the range of an integer voxel type.
    #[error("voxel value overflow at flat index {index} during additive compositing")]
    VoxelOverflow { index: usize },

    /// Bad command line flags or scene file.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn shape_position(index: Option<usize>) -> String {
    index.map(|i| format!(" #{i}")).unwrap_or_default()
}

impl ShapesError {
    /// Shorthand for an [`ShapesError::InvalidShape`] without a sequence index.
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            index: None,
            reason: reason.into(),
        }
    }

    /// Attaches a sequence position to an `InvalidShape` error. Other variants pass through.
    #[must_use]
    pub fn at_shape(self, position: usize) -> Self {
        match self {
            Self::InvalidShape { reason, .. } => Self::InvalidShape {
                index: Some(position),
                reason,
            },
            other => other,
        }
    }

    /// Builds an [`ShapesError::Io`] tagged with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`ShapesError::CorruptFile`] tagged with the offending path.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for basicshapes operations.
pub type Result<T> = std::result::Result<T, ShapesError>;
