//! Bucketed aspect-ratio sampler
//!
//! `BucketSampler` walks the buckets of a [`BucketIndex`] in rotation and
//! yields batches of exactly `batch_size` same-bucket samples. Full batches
//! are drawn without replacement from unseen samples; a bucket that can no
//! longer fill a batch is backfilled with replacement draws from its whole
//! population and then retired until the next epoch. When every bucket is
//! retired the sampler resets the seen markers, bumps the epoch and reports
//! [`SamplerEvent::DatasetExhausted`].
//!
//! # Example
//!
//! ```rust,ignore
//! let mut sampler = BucketSamplerBuilder::new()
//!     .config(SamplerConfig::new("photos", 4))
//!     .index(index)
//!     .materializer(materializer)
//!     .build()?;
//!
//! loop {
//!     match sampler.next_batch().await? {
//!         SamplerEvent::Batch(batch) => train_step(batch),
//!         SamplerEvent::DatasetExhausted { .. } => break,
//!     }
//! }
//! ```

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::bucket::BucketKey;
use crate::checkpoint::{CheckpointStore, JsonFileStore, SamplerState};
use crate::config::{ConditioningType, SamplerConfig};
use crate::error::{Error, Result};
use crate::index::BucketIndex;
use crate::materializer::{SampleMaterializer, SamplePayload};
use crate::metadata::SampleMetadata;

mod assembly;
mod rotation;
mod stats;

#[cfg(test)]
mod tests;

pub use rotation::BucketRotation;
pub use stats::{DatasetOverview, SamplerStatistics};

use assembly::{hydrate_all, plan_draw, unseen_samples, DrawPlan};

/// Result of pulling from the sampler
#[derive(Debug)]
pub enum SamplerEvent {
    /// A complete batch
    Batch(Batch),
    /// Every bucket was exhausted; seen markers were cleared and a new epoch began
    DatasetExhausted {
        /// Dataset that ran out
        sampler_id: String,
        /// Epoch that just started
        epoch: u64,
    },
}

impl SamplerEvent {
    /// The batch, if this event carries one
    pub fn into_batch(self) -> Option<Batch> {
        match self {
            SamplerEvent::Batch(batch) => Some(batch),
            SamplerEvent::DatasetExhausted { .. } => None,
        }
    }

    /// Whether this is the end-of-epoch signal
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SamplerEvent::DatasetExhausted { .. })
    }
}

/// One hydrated sample
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Sample id
    pub sample_id: String,
    /// Resolved metadata
    pub metadata: SampleMetadata,
    /// Hydrated content
    pub payload: SamplePayload,
    /// Drawn with replacement to fill a short bucket
    pub backfilled: bool,
}

/// Conditioning sample paired with a primary item
#[derive(Debug, Clone)]
pub struct ConditioningItem {
    /// Primary sample this pairs with
    pub source_id: String,
    /// Conditioning sample id
    pub sample_id: String,
    /// Conditioning kind
    pub kind: ConditioningType,
    /// Metadata from the conditioning index
    pub metadata: SampleMetadata,
    /// Hydrated content
    pub payload: SamplePayload,
}

/// A batch of same-bucket samples
#[derive(Debug, Clone)]
pub struct Batch {
    /// Bucket every item was drawn from
    pub bucket: BucketKey,
    /// Epoch the batch belongs to
    pub epoch: u64,
    /// Primary items, exactly `batch_size` of them
    pub items: Vec<BatchItem>,
    /// Conditioning items, one per primary item in the same order, or empty
    pub conditioning: Vec<ConditioningItem>,
}

impl Batch {
    /// Number of primary items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Primary sample ids in batch order
    pub fn sample_ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.sample_id.as_str()).collect()
    }

    /// Number of items drawn with replacement
    pub fn backfilled(&self) -> usize {
        self.items.iter().filter(|item| item.backfilled).count()
    }
}

/// Random sample for validation runs
#[derive(Debug, Clone)]
pub struct ValidationSample {
    /// Short name, `{dataset}_{n}`
    pub shortname: String,
    /// Caption to prompt with, if the materializer resolved one
    pub prompt: Option<String>,
    /// The sample itself
    pub item: BatchItem,
}

/// Dataset supplying conditioning companions by shared relative path
#[derive(Clone)]
pub struct ConditioningSource {
    kind: ConditioningType,
    index: Arc<dyn BucketIndex>,
    materializer: Arc<dyn SampleMaterializer>,
}

impl ConditioningSource {
    /// Create a conditioning source; index and materializer ids must agree
    pub fn new(
        kind: ConditioningType,
        index: Arc<dyn BucketIndex>,
        materializer: Arc<dyn SampleMaterializer>,
    ) -> Result<Self> {
        if index.id() != materializer.id() {
            return Err(Error::config(format!(
                "Conditioning index ID ({}) must match its SampleMaterializer ID ({})",
                index.id(),
                materializer.id()
            )));
        }
        Ok(Self {
            kind,
            index,
            materializer,
        })
    }

    /// Conditioning kind
    pub fn kind(&self) -> ConditioningType {
        self.kind
    }

    /// Conditioning id for a primary sample
    ///
    /// The primary id is made relative to `primary_root`, stripped of leading
    /// slashes and joined onto this source's root.
    pub fn resolve_path(&self, primary_root: Option<&Path>, sample_id: &str) -> String {
        let relative = match primary_root.and_then(|root| root.to_str()) {
            Some(root) if !root.is_empty() => sample_id.rsplit(root).next().unwrap_or(sample_id),
            _ => sample_id,
        };
        let relative = relative.trim_start_matches('/');
        match self.index.instance_root() {
            Some(root) => root.join(relative).to_string_lossy().into_owned(),
            None => relative.to_string(),
        }
    }
}

/// Builder for [`BucketSampler`]
#[derive(Default)]
pub struct BucketSamplerBuilder {
    config: Option<SamplerConfig>,
    index: Option<Arc<dyn BucketIndex>>,
    materializer: Option<Arc<dyn SampleMaterializer>>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    conditioning: Option<ConditioningSource>,
}

impl BucketSamplerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampler configuration
    pub fn config(mut self, config: SamplerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the bucket index
    pub fn index(mut self, index: Arc<dyn BucketIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the sample materializer
    pub fn materializer(mut self, materializer: Arc<dyn SampleMaterializer>) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Set the checkpoint store; defaults to [`JsonFileStore`]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Pair every item with a conditioning companion
    pub fn conditioning(mut self, source: ConditioningSource) -> Self {
        self.conditioning = Some(source);
        self
    }

    /// Build the sampler
    pub fn build(self) -> Result<BucketSampler> {
        let config = self
            .config
            .ok_or_else(|| Error::config("Sampler config is required"))?;
        let index = self
            .index
            .ok_or_else(|| Error::config("Bucket index is required"))?;
        let materializer = self
            .materializer
            .ok_or_else(|| Error::config("Sample materializer is required"))?;

        let mut sampler = BucketSampler::new(config, index, materializer)?;
        if let Some(store) = self.checkpoint_store {
            sampler.checkpoint_store = store;
        }
        if let Some(source) = self.conditioning {
            sampler.attach_conditioning(source)?;
        }
        Ok(sampler)
    }
}

/// Resumable sampler yielding fixed-size, single-bucket batches
pub struct BucketSampler {
    config: SamplerConfig,
    index: Arc<dyn BucketIndex>,
    materializer: Arc<dyn SampleMaterializer>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    conditioning: Option<ConditioningSource>,
    conditioning_type: Option<ConditioningType>,
    rotation: BucketRotation,
    epoch: u64,
    /// The last batch came from the current bucket; step before the next draw
    advance_pending: bool,
    rng: StdRng,
}

impl BucketSampler {
    /// Create a sampler over `index`, hydrating through `materializer`
    pub fn new(
        config: SamplerConfig,
        index: Arc<dyn BucketIndex>,
        materializer: Arc<dyn SampleMaterializer>,
    ) -> Result<Self> {
        config.validate()?;
        if config.id != index.id() || config.id != materializer.id() {
            return Err(Error::IdMismatch {
                sampler: config.id.clone(),
                index: index.id().to_string(),
                materializer: materializer.id().to_string(),
            });
        }
        let conditioning_type = config.conditioning()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(config.rank as u64)),
            None => StdRng::from_os_rng(),
        };
        let rotation = BucketRotation::new(index.bucket_keys());

        info!(
            "Created sampler '{}' (rank {}) with batch_size={} over {} buckets",
            config.id,
            config.rank,
            config.batch_size,
            rotation.active_len()
        );

        Ok(Self {
            config,
            index,
            materializer,
            checkpoint_store: Arc::new(JsonFileStore::new()),
            conditioning: None,
            conditioning_type,
            rotation,
            epoch: 1,
            advance_pending: false,
            rng,
        })
    }

    /// Pair every yielded item with a conditioning companion from `source`
    pub fn attach_conditioning(&mut self, source: ConditioningSource) -> Result<()> {
        if let Some(configured) = self.conditioning_type {
            if configured != source.kind() {
                return Err(Error::config(format!(
                    "Conditioning source is '{}' but sampler '{}' is configured for '{}'",
                    source.kind(),
                    self.config.id,
                    configured
                )));
            }
        }
        self.conditioning_type = Some(source.kind());
        self.conditioning = Some(source);
        Ok(())
    }

    /// Dataset id
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Sampler configuration
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Current epoch, starting at 1
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Rotation state
    pub fn rotation(&self) -> &BucketRotation {
        &self.rotation
    }

    /// Estimated batches per epoch: `ceil(total * (repeats + 1) / batch_size)`
    pub fn len(&self) -> usize {
        let total = self.index.total_samples() * (self.config.repeats + 1);
        (total + self.config.batch_size - 1) / self.config.batch_size
    }

    /// Whether the dataset currently holds no samples
    pub fn is_empty(&self) -> bool {
        self.index.total_samples() == 0
    }

    /// Pull the next batch
    ///
    /// Returns [`SamplerEvent::DatasetExhausted`] once per epoch, after the
    /// last batch of the epoch has been yielded. Errors leave the seen
    /// markers untouched.
    #[instrument(skip(self), fields(sampler = %self.config.id, epoch = self.epoch))]
    pub async fn next_batch(&mut self) -> Result<SamplerEvent> {
        loop {
            let bucket = match self.current_or_advance() {
                Some(bucket) => bucket,
                None => return self.reset_epoch(),
            };

            let population = self.index.samples(&bucket);
            let unseen = unseen_samples(&population, |id| self.index.is_seen(id));
            self.log_decision(format_args!(
                "Selected bucket {} -> {} of {} {} unseen",
                bucket,
                unseen.len(),
                population.len(),
                self.config.dataset_type.plural()
            ));

            let (selection, retire): (Vec<(String, bool)>, bool) =
                match plan_draw(&population, &unseen, self.config.batch_size, &mut self.rng) {
                    DrawPlan::Full(picked) => {
                        (picked.into_iter().map(|id| (id, false)).collect(), false)
                    }
                    DrawPlan::Backfill { unseen, backfill } => {
                        self.log_decision(format_args!(
                            "Bucket {} has {} available {}, but we need {} more",
                            bucket,
                            unseen.len(),
                            self.config.dataset_type.plural(),
                            backfill.len()
                        ));
                        let selection = unseen
                            .into_iter()
                            .map(|id| (id, false))
                            .chain(backfill.into_iter().map(|id| (id, true)))
                            .collect();
                        (selection, true)
                    }
                    DrawPlan::Empty => {
                        debug!("Bucket {} is empty", bucket);
                        self.exhaust(&bucket);
                        continue;
                    }
                };

            // A short bucket is only retired once its batch was actually built
            let batch = self.assemble(bucket, selection).await?;
            if retire {
                self.exhaust(&batch.bucket);
            }
            self.advance_pending = true;
            return Ok(SamplerEvent::Batch(batch));
        }
    }

    /// Bucket to draw from, stepping the rotation when needed
    fn current_or_advance(&mut self) -> Option<BucketKey> {
        let current_active = self
            .rotation
            .current()
            .map_or(false, |bucket| self.rotation.is_active(bucket));
        if self.advance_pending || !current_active {
            self.advance_pending = false;
            return self.change_bucket();
        }
        self.rotation.current().cloned()
    }

    fn change_bucket(&mut self) -> Option<BucketKey> {
        let next = self.rotation.advance(&mut self.rng);
        if let Some(bucket) = &next {
            self.log_decision(format_args!(
                "Changed to bucket {} ({} active, {} exhausted)",
                bucket,
                self.rotation.active_len(),
                self.rotation.exhausted_buckets().len()
            ));
        }
        next
    }

    fn exhaust(&mut self, bucket: &BucketKey) {
        if self.rotation.mark_exhausted(bucket) {
            self.log_decision(format_args!(
                "Bucket {} cannot fill another batch; {} buckets remain",
                bucket,
                self.rotation.active_len()
            ));
        }
    }

    fn log_decision(&self, message: std::fmt::Arguments<'_>) {
        if self.config.debug_aspect_buckets {
            info!(rank = self.config.rank, "{}", message);
        } else {
            debug!(rank = self.config.rank, "{}", message);
        }
    }

    /// Validate, hydrate and mark seen; nothing is marked if any step fails
    async fn assemble(&self, bucket: BucketKey, selection: Vec<(String, bool)>) -> Result<Batch> {
        let mut requests = Vec::with_capacity(selection.len());
        for (sample_id, _) in &selection {
            let metadata = self.index.metadata(sample_id).unwrap_or_default();
            metadata.validate_for(sample_id, self.config.output_mode)?;
            requests.push((sample_id.clone(), metadata));
        }

        let payloads = hydrate_all(
            self.materializer.as_ref(),
            &requests,
            self.config.hydration_concurrency,
        )
        .await?;

        let conditioning = match &self.conditioning {
            Some(source) => self.connect_conditioning(source, &requests).await?,
            None => Vec::new(),
        };

        let sample_ids: Vec<String> = requests.iter().map(|(id, _)| id.clone()).collect();
        debug!(
            "Yielding {} samples from bucket {}; {} seen before marking",
            sample_ids.len(),
            bucket,
            self.index.seen_count()
        );
        self.index.mark_seen(&sample_ids);

        let items = requests
            .into_iter()
            .zip(payloads)
            .zip(selection.into_iter().map(|(_, backfilled)| backfilled))
            .map(|(((sample_id, metadata), payload), backfilled)| BatchItem {
                sample_id,
                metadata,
                payload,
                backfilled,
            })
            .collect();

        Ok(Batch {
            bucket,
            epoch: self.epoch,
            items,
            conditioning,
        })
    }

    async fn connect_conditioning(
        &self,
        source: &ConditioningSource,
        requests: &[(String, SampleMetadata)],
    ) -> Result<Vec<ConditioningItem>> {
        let primary_root = self.index.instance_root();
        let conditioning_requests: Vec<(String, SampleMetadata)> = requests
            .iter()
            .map(|(sample_id, _)| {
                let path = source.resolve_path(primary_root, sample_id);
                let metadata = source.index.metadata(&path).unwrap_or_default();
                (path, metadata)
            })
            .collect();

        let payloads = hydrate_all(
            source.materializer.as_ref(),
            &conditioning_requests,
            self.config.hydration_concurrency,
        )
        .await?;

        Ok(requests
            .iter()
            .zip(conditioning_requests)
            .zip(payloads)
            .map(|(((source_id, _), (sample_id, metadata)), payload)| ConditioningItem {
                source_id: source_id.clone(),
                sample_id,
                kind: source.kind(),
                metadata,
                payload,
            })
            .collect())
    }

    /// Start a new epoch after every bucket ran out
    fn reset_epoch(&mut self) -> Result<SamplerEvent> {
        let seen = self.index.seen_count();
        let unseen = self.index.unseen_count();
        if seen == 0 && unseen == 0 {
            return Err(Error::EmptyDataset {
                id: self.config.id.clone(),
                unseen,
                seen,
            });
        }

        if self.config.print_sampler_statistics {
            info!(
                "Resetting seen {} list and refreshing buckets. State before reset:\n{}",
                self.config.dataset_type.noun(),
                self.statistics()
            );
        }

        self.epoch += 1;
        self.rotation = BucketRotation::new(self.index.bucket_keys());
        self.index.reset_seen();
        self.advance_pending = false;
        self.change_bucket();

        info!(
            "All buckets of '{}' exhausted; starting epoch {}",
            self.config.id, self.epoch
        );
        Ok(SamplerEvent::DatasetExhausted {
            sampler_id: self.config.id.clone(),
            epoch: self.epoch,
        })
    }

    /// Deep snapshot of the sampler and index state
    pub fn state(&self) -> SamplerState {
        SamplerState {
            bucket_membership: self.index.membership_snapshot(),
            bucket_order: self.rotation.active_buckets(),
            exhausted_buckets: Some(self.rotation.exhausted_buckets().to_vec()),
            batch_size: Some(self.config.batch_size),
            current_bucket_index: self.rotation.current_index(),
            seen: Some(self.index.seen_snapshot()),
            advance_pending: Some(self.advance_pending),
            epoch: Some(self.epoch),
            saved_at: Some(Utc::now()),
        }
    }

    /// Write a checkpoint at `address`
    #[instrument(skip(self), fields(sampler = %self.config.id))]
    pub fn save(&self, address: &str) -> Result<()> {
        let state = self.state();
        self.checkpoint_store.save(address, &state)?;
        info!(
            "Saved sampler state: epoch {}, {} seen {}, {} exhausted buckets",
            self.epoch,
            state.seen_count(),
            self.config.dataset_type.plural(),
            self.rotation.exhausted_buckets().len()
        );
        Ok(())
    }

    /// Restore from the checkpoint at `address`
    ///
    /// Bucket order comes from the live index; exhausted buckets, epoch and
    /// seen ids come from the checkpoint. Seen ids are added to the index,
    /// never replacing it, so restoring twice is harmless. A failed load
    /// leaves the sampler unchanged.
    #[instrument(skip(self), fields(sampler = %self.config.id))]
    pub fn restore(&mut self, address: &str) -> Result<()> {
        let previous = self.checkpoint_store.load(address)?;

        let mut rotation = BucketRotation::new(self.index.bucket_keys());
        if let Some(exhausted) = &previous.exhausted_buckets {
            info!("Previous checkpoint had {} exhausted buckets.", exhausted.len());
            let applied = rotation.restore_exhausted(exhausted);
            if applied < exhausted.len() {
                warn!(
                    "{} exhausted buckets from the checkpoint are no longer active in the index",
                    exhausted.len() - applied
                );
            }
        }

        if let Some(epoch) = previous.epoch {
            info!("Previous checkpoint was on epoch {}.", epoch);
        }
        if let Some(batch_size) = previous
            .batch_size
            .filter(|batch_size| *batch_size != self.config.batch_size)
        {
            warn!(
                "Checkpoint batch size {} differs from configured {}",
                batch_size, self.config.batch_size
            );
        }

        let anchored = previous
            .current_bucket()
            .map_or(false, |bucket| rotation.anchor(bucket));

        self.rotation = rotation;
        self.epoch = previous.epoch_or_default();
        self.advance_pending = anchored && previous.advance_pending.unwrap_or(true);

        if let Some(seen) = previous.seen {
            info!(
                "Previous checkpoint had {} seen {}.",
                seen.len(),
                self.config.dataset_type.plural()
            );
            let seen: Vec<String> = seen.into_iter().collect();
            self.index.mark_seen(&seen);
        }
        Ok(())
    }

    /// Draw `count` random samples for validation without touching seen state
    pub async fn validation_set(&mut self, count: usize) -> Result<Vec<ValidationSample>> {
        let candidates: Vec<BucketKey> = self
            .index
            .bucket_keys()
            .into_iter()
            .filter(|bucket| !self.index.samples(bucket).is_empty())
            .collect();
        if candidates.is_empty() {
            return Err(Error::EmptyDataset {
                id: self.config.id.clone(),
                unseen: 0,
                seen: self.index.seen_count(),
            });
        }

        let mut results = Vec::with_capacity(count);
        for n in 0..count {
            let bucket = &candidates[self.rng.random_range(0..candidates.len())];
            let samples = self.index.samples(bucket);
            if samples.is_empty() {
                return Err(Error::config(format!(
                    "Bucket {} emptied while drawing validation samples",
                    bucket
                )));
            }
            let sample_id = samples[self.rng.random_range(0..samples.len())].clone();
            let metadata = self.index.metadata(&sample_id).unwrap_or_default();
            let payload = self.materializer.hydrate(&sample_id, &metadata).await?;

            results.push(ValidationSample {
                shortname: format!("{}_{}", self.config.id, n),
                prompt: payload.caption.clone(),
                item: BatchItem {
                    sample_id,
                    metadata,
                    payload,
                    backfilled: false,
                },
            });
        }
        Ok(results)
    }

    /// Hydrate a single sample by path, prefixing the instance root if needed
    pub async fn hydrate_path(&self, path: &str) -> Result<SamplePayload> {
        let resolved = match self.index.instance_root().and_then(|root| root.to_str()) {
            Some(root) if !path.contains(root) && !path.starts_with("http") => {
                Path::new(root).join(path).to_string_lossy().into_owned()
            }
            _ => path.to_string(),
        };
        let metadata = self.index.metadata(&resolved).unwrap_or_default();
        self.materializer.hydrate(&resolved, &metadata).await
    }

    /// Progress through the current epoch
    pub fn statistics(&self) -> SamplerStatistics {
        let label = |bucket: &BucketKey| bucket.human_readable(self.index.samples(bucket).len());
        SamplerStatistics {
            sampler_id: self.config.id.clone(),
            rank: self.config.rank,
            epoch: self.epoch,
            seen: self.index.seen_count(),
            unseen: self.index.unseen_count(),
            current_bucket: self.rotation.current().cloned(),
            active_buckets: self.rotation.active_buckets().iter().map(label).collect(),
            exhausted_buckets: self.rotation.exhausted_buckets().iter().map(label).collect(),
            noun: self.config.dataset_type.plural(),
        }
    }

    /// Dataset-wide overview
    pub fn overview(&self) -> DatasetOverview {
        DatasetOverview {
            repeats: self.config.repeats,
            total_samples: self.index.total_samples(),
            bucket_count: self.index.bucket_keys().len(),
            resolution: self.config.resolution,
            resolution_unit: self.config.resolution_type.unit(),
            output_mode: self.config.output_mode,
            conditioning_type: self.conditioning_type,
            is_regularisation_data: self.config.is_regularisation_data,
            noun: self.config.dataset_type.plural(),
        }
    }

    /// Log and return the current statistics
    pub fn log_state(&self) -> SamplerStatistics {
        let stats = self.statistics();
        info!("\n{}", stats);
        stats
    }
}
