//! Bucket index abstraction
//!
//! The bucket index owns bucket membership and the per-epoch seen markers.
//! Samplers only hold a handle to it and query membership live, so the same
//! index can be inspected, mutated or persisted by its owner between pulls.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::bucket::BucketKey;
use crate::metadata::SampleMetadata;

mod memory;

pub use memory::{InMemoryBucketIndex, IndexManifest};

/// Key-to-samples mapping plus seen-state, shared by a sampler and its owner
///
/// Implementations use interior mutability; every method takes `&self` so a
/// single index can sit behind an `Arc` shared with the sampler.
pub trait BucketIndex: Send + Sync {
    /// Dataset id this index belongs to
    fn id(&self) -> &str;

    /// Root directory sample ids are relative to, if any
    fn instance_root(&self) -> Option<&Path>;

    /// All bucket keys, in a stable enumeration order
    fn bucket_keys(&self) -> Vec<BucketKey>;

    /// Sample ids currently assigned to `bucket`
    fn samples(&self, bucket: &BucketKey) -> Vec<String>;

    /// Whether `sample_id` has been yielded this epoch
    fn is_seen(&self, sample_id: &str) -> bool;

    /// Mark every id in `sample_ids` as seen
    fn mark_seen(&self, sample_ids: &[String]);

    /// Clear all seen markers
    fn reset_seen(&self);

    /// Copy of the seen set
    fn seen_snapshot(&self) -> BTreeSet<String>;

    /// Metadata recorded for `sample_id`
    fn metadata(&self, sample_id: &str) -> Option<SampleMetadata>;

    /// Number of seen samples
    fn seen_count(&self) -> usize {
        self.seen_snapshot().len()
    }

    /// Deep copy of bucket membership
    fn membership_snapshot(&self) -> BTreeMap<BucketKey, Vec<String>> {
        self.bucket_keys()
            .into_iter()
            .map(|key| {
                let samples = self.samples(&key);
                (key, samples)
            })
            .collect()
    }

    /// Total number of samples across all buckets
    fn total_samples(&self) -> usize {
        self.bucket_keys()
            .iter()
            .map(|key| self.samples(key).len())
            .sum()
    }

    /// Number of unseen samples across all buckets
    fn unseen_count(&self) -> usize {
        self.bucket_keys()
            .iter()
            .flat_map(|key| self.samples(key))
            .filter(|id| !self.is_seen(id))
            .count()
    }
}
