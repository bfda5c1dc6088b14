//! Sampler checkpoint state and persistence
//!
//! The state blob is a deep, self-contained snapshot: it owns copies of the
//! bucket membership and seen set so it can be written by another process.
//! Every field is optional on read so older or partial checkpoints still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::bucket::BucketKey;
use crate::error::Result;

mod store;

pub use store::{JsonFileStore, MemoryCheckpointStore};

/// Serializable sampler state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    /// Bucket membership at save time
    #[serde(default)]
    pub bucket_membership: BTreeMap<BucketKey, Vec<String>>,
    /// Active bucket order at save time
    #[serde(default)]
    pub bucket_order: Vec<BucketKey>,
    /// Buckets exhausted this epoch, in exhaustion order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhausted_buckets: Option<Vec<BucketKey>>,
    /// Batch size the sampler ran with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Cursor into `bucket_order`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bucket_index: Option<usize>,
    /// The cursor's bucket already yielded; step past it on resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_pending: Option<bool>,
    /// Samples seen this epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<BTreeSet<String>>,
    /// Epoch counter, starting at 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// When the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SamplerState {
    /// Epoch, defaulting to 1 for checkpoints without one
    pub fn epoch_or_default(&self) -> u64 {
        self.epoch.unwrap_or(1)
    }

    /// Bucket the cursor pointed at, if the index is in range
    pub fn current_bucket(&self) -> Option<&BucketKey> {
        self.current_bucket_index
            .and_then(|index| self.bucket_order.get(index))
    }

    /// Number of seen samples recorded
    pub fn seen_count(&self) -> usize {
        self.seen.as_ref().map_or(0, BTreeSet::len)
    }
}

/// Persistence for sampler state blobs
#[cfg_attr(test, mockall::automock)]
pub trait CheckpointStore: Send + Sync {
    /// Persist `state` at `address`, replacing anything there
    fn save(&self, address: &str, state: &SamplerState) -> Result<()>;

    /// Read back the state stored at `address`
    fn load(&self, address: &str) -> Result<SamplerState>;
}
