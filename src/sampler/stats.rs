//! Human-readable sampler state summaries

use std::fmt;

use crate::bucket::BucketKey;
use crate::config::ConditioningType;
use crate::metadata::OutputMode;

/// Snapshot of the sampler's progress through the current epoch
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerStatistics {
    /// Dataset id
    pub sampler_id: String,
    /// Replica rank
    pub rank: usize,
    /// Current epoch
    pub epoch: u64,
    /// Seen samples
    pub seen: usize,
    /// Unseen samples
    pub unseen: usize,
    /// Bucket under the cursor
    pub current_bucket: Option<BucketKey>,
    /// Active buckets as `key (n samples)` labels
    pub active_buckets: Vec<String>,
    /// Exhausted buckets as `key (n samples)` labels
    pub exhausted_buckets: Vec<String>,
    /// Plural sample noun, e.g. `images`
    pub noun: &'static str,
}

impl fmt::Display for SamplerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = format!("[{} rank {}]", self.sampler_id, self.rank);
        writeln!(f, "{}    -> Epoch: {}", prefix, self.epoch)?;
        writeln!(f, "{}    -> Number of seen {}: {}", prefix, self.noun, self.seen)?;
        writeln!(f, "{}    -> Number of unseen {}: {}", prefix, self.noun, self.unseen)?;
        match &self.current_bucket {
            Some(bucket) => writeln!(f, "{}    -> Current Bucket: {}", prefix, bucket)?,
            None => writeln!(f, "{}    -> Current Bucket: none", prefix)?,
        }
        writeln!(
            f,
            "{}    -> {} Buckets: {}",
            prefix,
            self.active_buckets.len(),
            self.active_buckets.join(", ")
        )?;
        write!(
            f,
            "{}    -> {} Exhausted Buckets: {}",
            prefix,
            self.exhausted_buckets.len(),
            self.exhausted_buckets.join(", ")
        )
    }
}

/// Whole-dataset overview, independent of epoch progress
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOverview {
    /// Configured repeats
    pub repeats: usize,
    /// Samples across all buckets
    pub total_samples: usize,
    /// Number of buckets
    pub bucket_count: usize,
    /// Training resolution
    pub resolution: f64,
    /// Unit of `resolution`
    pub resolution_unit: &'static str,
    /// Output mode of the consuming model
    pub output_mode: OutputMode,
    /// Conditioning companion type
    pub conditioning_type: Option<ConditioningType>,
    /// Whether the dataset is regularisation data
    pub is_regularisation_data: bool,
    /// Plural sample noun
    pub noun: &'static str,
}

impl fmt::Display for DatasetOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Repeats: {}", self.repeats)?;
        writeln!(f, "- Total number of {}: {}", self.noun, self.total_samples)?;
        writeln!(f, "- Total number of aspect buckets: {}", self.bucket_count)?;
        writeln!(f, "- Resolution: {} {}", self.resolution, self.resolution_unit)?;
        writeln!(f, "- Output mode: {:?}", self.output_mode)?;
        write!(
            f,
            "- Used for regularisation data: {}",
            if self.is_regularisation_data { "Yes" } else { "No" }
        )?;
        if let Some(conditioning) = self.conditioning_type {
            write!(f, "\n- Conditioning type: {}", conditioning)?;
        }
        Ok(())
    }
}
