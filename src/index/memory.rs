//! In-memory bucket index backed by a manifest file

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BucketIndex;
use crate::bucket::BucketKey;
use crate::error::Result;
use crate::metadata::SampleMetadata;

/// Serialized form of an index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Dataset id
    pub id: String,
    /// Root directory of the dataset
    #[serde(default)]
    pub instance_root: Option<PathBuf>,
    /// Bucket key to sample ids
    #[serde(default)]
    pub buckets: BTreeMap<BucketKey, Vec<String>>,
    /// Sample id to metadata
    #[serde(default)]
    pub metadata: HashMap<String, SampleMetadata>,
}

/// Bucket index held entirely in memory
pub struct InMemoryBucketIndex {
    id: String,
    instance_root: Option<PathBuf>,
    /// Buckets in insertion order
    buckets: RwLock<Vec<(BucketKey, Vec<String>)>>,
    seen: RwLock<HashSet<String>>,
    metadata: RwLock<HashMap<String, SampleMetadata>>,
}

impl InMemoryBucketIndex {
    /// Create an empty index
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance_root: None,
            buckets: RwLock::new(Vec::new()),
            seen: RwLock::new(HashSet::new()),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Set the dataset root directory
    pub fn with_instance_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.instance_root = Some(root.into());
        self
    }

    /// Build an index from a manifest
    pub fn from_manifest(manifest: IndexManifest) -> Self {
        let mut index = Self::new(manifest.id);
        index.instance_root = manifest.instance_root;
        *index.buckets.get_mut() = manifest.buckets.into_iter().collect();
        *index.metadata.get_mut() = manifest.metadata;
        index
    }

    /// Load a manifest from a JSON or YAML file
    pub fn from_manifest_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let manifest: IndexManifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        info!(
            "Loaded bucket index '{}' with {} buckets from {:?}",
            manifest.id,
            manifest.buckets.len(),
            path
        );
        Ok(Self::from_manifest(manifest))
    }

    /// Export the current membership and metadata
    pub fn to_manifest(&self) -> IndexManifest {
        IndexManifest {
            id: self.id.clone(),
            instance_root: self.instance_root.clone(),
            buckets: self.buckets.read().iter().cloned().collect(),
            metadata: self.metadata.read().clone(),
        }
    }

    /// Replace the samples of `bucket`, creating it if needed
    pub fn insert_bucket(&self, bucket: impl Into<BucketKey>, samples: Vec<String>) {
        let bucket = bucket.into();
        let mut buckets = self.buckets.write();
        match buckets.iter_mut().find(|(key, _)| *key == bucket) {
            Some((_, existing)) => *existing = samples,
            None => buckets.push((bucket, samples)),
        }
    }

    /// Assign a sample to `bucket`, removing it from any other bucket
    pub fn add_sample(
        &self,
        bucket: impl Into<BucketKey>,
        sample_id: impl Into<String>,
        metadata: Option<SampleMetadata>,
    ) {
        let bucket = bucket.into();
        let sample_id = sample_id.into();
        self.remove_sample(&sample_id);

        {
            let mut buckets = self.buckets.write();
            match buckets.iter_mut().find(|(key, _)| *key == bucket) {
                Some((_, samples)) => samples.push(sample_id.clone()),
                None => buckets.push((bucket, vec![sample_id.clone()])),
            }
        }

        if let Some(metadata) = metadata {
            self.metadata.write().insert(sample_id, metadata);
        }
    }

    /// Remove a sample from whichever bucket holds it
    pub fn remove_sample(&self, sample_id: &str) -> bool {
        let mut removed = false;
        for (bucket, samples) in self.buckets.write().iter_mut() {
            let before = samples.len();
            samples.retain(|id| id != sample_id);
            if samples.len() != before {
                debug!("Removed {} from bucket {}", sample_id, bucket);
                removed = true;
            }
        }
        removed
    }

    /// Record metadata for a sample
    pub fn set_metadata(&self, sample_id: impl Into<String>, metadata: SampleMetadata) {
        self.metadata.write().insert(sample_id.into(), metadata);
    }
}

impl BucketIndex for InMemoryBucketIndex {
    fn id(&self) -> &str {
        &self.id
    }

    fn instance_root(&self) -> Option<&Path> {
        self.instance_root.as_deref()
    }

    fn bucket_keys(&self) -> Vec<BucketKey> {
        self.buckets.read().iter().map(|(key, _)| key.clone()).collect()
    }

    fn samples(&self, bucket: &BucketKey) -> Vec<String> {
        self.buckets
            .read()
            .iter()
            .find(|(key, _)| key == bucket)
            .map(|(_, samples)| samples.clone())
            .unwrap_or_default()
    }

    fn is_seen(&self, sample_id: &str) -> bool {
        self.seen.read().contains(sample_id)
    }

    fn mark_seen(&self, sample_ids: &[String]) {
        let mut seen = self.seen.write();
        seen.extend(sample_ids.iter().cloned());
    }

    fn reset_seen(&self) {
        self.seen.write().clear();
    }

    fn seen_snapshot(&self) -> BTreeSet<String> {
        self.seen.read().iter().cloned().collect()
    }

    fn seen_count(&self) -> usize {
        self.seen.read().len()
    }

    fn metadata(&self, sample_id: &str) -> Option<SampleMetadata> {
        self.metadata.read().get(sample_id).cloned()
    }
}
