//! Error types for the aspect-ratio bucket sampler

use thiserror::Error;

/// Main error type for sampler operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sampler and collaborator ids disagree
    #[error(
        "Sampler ID ({sampler}) must match BucketIndex ID ({index}) and SampleMaterializer ID ({materializer})"
    )]
    IdMismatch {
        /// Sampler id
        sampler: String,
        /// Bucket index id
        index: String,
        /// Materializer id
        materializer: String,
    },

    /// Every bucket is empty and nothing has been seen
    #[error("No samples found in dataset '{id}': {unseen} unseen, {seen} seen")]
    EmptyDataset {
        /// Dataset id
        id: String,
        /// Unseen samples across all buckets
        unseen: usize,
        /// Seen samples
        seen: usize,
    },

    /// A selected sample lacks metadata the output mode requires
    #[error("Sample '{sample_id}' is missing required metadata field '{field}'")]
    MissingMetadata {
        /// Offending sample
        sample_id: String,
        /// Missing field name
        field: String,
    },

    /// The materializer could not produce a sample payload
    #[error("Failed to hydrate sample '{sample_id}': {reason}")]
    Hydration {
        /// Sample that failed
        sample_id: String,
        /// Underlying reason
        reason: String,
    },

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for sampler operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a hydration error
    pub fn hydration(sample_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Hydration {
            sample_id: sample_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a missing metadata error
    pub fn missing_metadata(sample_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingMetadata {
            sample_id: sample_id.into(),
            field: field.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Fatal setup problems that retrying cannot fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::IdMismatch { .. } | Self::EmptyDataset { .. }
        )
    }

    /// The bucket index handed out a sample it cannot describe
    pub fn is_index_integrity(&self) -> bool {
        matches!(self, Self::MissingMetadata { .. })
    }
}
