//! Aspect-ratio bucket sampler
//!
//! This crate feeds a training loop with fixed-size batches in which every
//! sample shares one aspect-ratio bucket. It tracks which samples were seen
//! this epoch, backfills buckets that run short, rotates across buckets and
//! checkpoints its position so a restarted job resumes where it stopped.
//!
//! The sampler is decoupled from storage through two traits:
//! [`BucketIndex`] answers membership, seen-state and metadata queries, and
//! [`SampleMaterializer`] hydrates a sample id into its payload.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod bucket;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod materializer;
pub mod metadata;
pub mod sampler;

// Re-exports
pub use bucket::BucketKey;
pub use checkpoint::{CheckpointStore, JsonFileStore, MemoryCheckpointStore, SamplerState};
pub use config::{ConditioningType, DatasetType, ResolutionType, SamplerConfig};
pub use error::{Error, Result};
pub use index::{BucketIndex, InMemoryBucketIndex, IndexManifest};
pub use materializer::{FsMaterializer, SampleMaterializer, SamplePayload};
pub use metadata::{OutputMode, SampleMetadata};
pub use sampler::{
    Batch, BatchItem, BucketRotation, BucketSampler, BucketSamplerBuilder, ConditioningItem,
    ConditioningSource, DatasetOverview, SamplerEvent, SamplerStatistics, ValidationSample,
};
