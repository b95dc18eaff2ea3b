//! Error taxonomy for the data pipeline.
//!
//! Every variant is detected eagerly (at construction or batch
//! assembly) and none of them is transient, so callers propagate
//! instead of retrying.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source data is missing required columns, has unparseable
    /// cells, or a semantic-id mapping has the wrong shape.
    #[error("Malformed input: {message}")]
    MalformedInput {
        message: String,
    },

    /// No semantic-id entry exists for this item.
    #[error("No semantic id for item {item_id}")]
    KeyNotFound {
        item_id: i64,
    },

    /// Records within one batch do not share a shape.
    #[error("Shape mismatch at record {index}: {message}")]
    ShapeMismatch {
        /// Position of the offending record in the batch
        index: usize,
        message: String,
    },

    /// A collated batch lacks a named field, or the field cannot be
    /// turned into the tensor asked for. No single record is at fault.
    #[error("Batch field '{key}': {message}")]
    BatchField {
        key: String,
        message: String,
    },

    /// Collation was asked to stack zero records.
    #[error("Cannot collate an empty batch")]
    EmptyBatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput { message: message.into() }
    }

    pub fn shape_mismatch(index: usize, message: impl Into<String>) -> Self {
        Self::ShapeMismatch { index, message: message.into() }
    }

    pub fn batch_field(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BatchField { key: key.into(), message: message.into() }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PipelineError::KeyNotFound { item_id: 42 }.to_string(),
            "No semantic id for item 42"
        );
        assert_eq!(
            PipelineError::shape_mismatch(3, "key set differs").to_string(),
            "Shape mismatch at record 3: key set differs"
        );
        assert_eq!(PipelineError::EmptyBatch.to_string(), "Cannot collate an empty batch");
        assert_eq!(
            PipelineError::batch_field("feedback", "not present").to_string(),
            "Batch field 'feedback': not present"
        );
        assert!(PipelineError::malformed("missing column 'item_id'")
            .to_string()
            .contains("item_id"));
    }
}
