use super::*;
use crate::checkpoint::{MemoryCheckpointStore, MockCheckpointStore};
use crate::index::InMemoryBucketIndex;
use crate::metadata::OutputMode;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use test_case::test_case;

struct StubMaterializer {
    id: String,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StubMaterializer {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, sample_id: &str) -> Self {
        self.failing.insert(sample_id.to_string());
        self
    }
}

#[async_trait]
impl SampleMaterializer for StubMaterializer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn hydrate(&self, sample_id: &str, _metadata: &SampleMetadata) -> Result<SamplePayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(sample_id) {
            return Err(Error::hydration(sample_id, "corrupt file"));
        }
        Ok(SamplePayload::new(sample_id.as_bytes().to_vec())
            .with_caption(format!("caption for {}", sample_id)))
    }
}

fn cropped() -> SampleMetadata {
    SampleMetadata {
        crop_coordinates: Some((0, 0)),
        ..Default::default()
    }
}

/// Index with one bucket per `(key, count)`, every sample carrying crop metadata
fn build_index(id: &str, buckets: &[(&str, usize)]) -> Arc<InMemoryBucketIndex> {
    let index = InMemoryBucketIndex::new(id);
    for (key, count) in buckets {
        let samples: Vec<String> = (0..*count).map(|i| format!("{}_{}.png", key, i)).collect();
        for sample in &samples {
            index.set_metadata(sample.clone(), cropped());
        }
        index.insert_bucket(*key, samples);
    }
    Arc::new(index)
}

fn build_sampler(index: Arc<InMemoryBucketIndex>, batch_size: usize) -> BucketSampler {
    let mut config = SamplerConfig::new("photos", batch_size);
    config.seed = Some(42);
    config.hydration_concurrency = 2;
    BucketSamplerBuilder::new()
        .config(config)
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .build()
        .unwrap()
}

async fn expect_batch(sampler: &mut BucketSampler) -> Batch {
    match sampler.next_batch().await.unwrap() {
        SamplerEvent::Batch(batch) => batch,
        other => panic!("expected a batch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_bucket_epoch() {
    let index = build_index("photos", &[("1.00", 10), ("1.78", 2)]);
    let mut sampler = build_sampler(index.clone(), 4);

    let first = expect_batch(&mut sampler).await;
    assert_eq!(first.bucket, BucketKey::from("1.00"));
    assert_eq!(first.len(), 4);
    assert_eq!(first.backfilled(), 0);

    let second = expect_batch(&mut sampler).await;
    assert_eq!(second.bucket, BucketKey::from("1.78"));
    assert_eq!(second.len(), 4);
    assert_eq!(second.backfilled(), 2);
    assert_eq!(
        sampler.rotation().exhausted_buckets(),
        &[BucketKey::from("1.78")][..]
    );

    let third = expect_batch(&mut sampler).await;
    assert_eq!(third.bucket, BucketKey::from("1.00"));
    assert_eq!(third.backfilled(), 0);

    let fourth = expect_batch(&mut sampler).await;
    assert_eq!(fourth.bucket, BucketKey::from("1.00"));
    assert_eq!(fourth.backfilled(), 2);
    assert_eq!(index.seen_count(), 12);

    match sampler.next_batch().await.unwrap() {
        SamplerEvent::DatasetExhausted { sampler_id, epoch } => {
            assert_eq!(sampler_id, "photos");
            assert_eq!(epoch, 2);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(sampler.epoch(), 2);
    assert_eq!(index.seen_count(), 0);
    assert!(sampler.rotation().exhausted_buckets().is_empty());
}

#[tokio::test]
async fn test_single_bucket_backfills_then_exhausts() {
    let index = build_index("photos", &[("1.00", 4)]);
    let mut sampler = build_sampler(index.clone(), 4);

    let first = expect_batch(&mut sampler).await;
    let ids: HashSet<&str> = first.sample_ids().into_iter().collect();
    assert_eq!(ids.len(), 4);

    let second = expect_batch(&mut sampler).await;
    assert_eq!(second.len(), 4);
    assert_eq!(second.backfilled(), 4);
    assert_eq!(second.epoch, 1);

    assert!(sampler.next_batch().await.unwrap().is_exhausted());
    assert_eq!(index.seen_count(), 0);

    let fresh = expect_batch(&mut sampler).await;
    assert_eq!(fresh.epoch, 2);
    assert_eq!(fresh.backfilled(), 0);
}

#[tokio::test]
async fn test_every_sample_seen_once_before_exhaustion() {
    let index = build_index("photos", &[("1.00", 8), ("1.50", 6), ("0.75", 4)]);
    let mut sampler = build_sampler(index.clone(), 2);

    let mut fresh = Vec::new();
    loop {
        match sampler.next_batch().await.unwrap() {
            SamplerEvent::Batch(batch) => {
                assert!(batch
                    .items
                    .iter()
                    .all(|item| item.sample_id.starts_with(batch.bucket.as_str())));
                fresh.extend(
                    batch
                        .items
                        .into_iter()
                        .filter(|item| !item.backfilled)
                        .map(|item| item.sample_id),
                );
            }
            SamplerEvent::DatasetExhausted { .. } => break,
        }
    }

    let distinct: HashSet<&String> = fresh.iter().collect();
    assert_eq!(fresh.len(), 18);
    assert_eq!(distinct.len(), 18);
}

#[tokio::test]
async fn test_empty_bucket_is_skipped() {
    let index = build_index("photos", &[("0.50", 0), ("1.00", 4)]);
    let mut sampler = build_sampler(index, 2);

    let batch = expect_batch(&mut sampler).await;
    assert_eq!(batch.bucket, BucketKey::from("1.00"));
    assert!(sampler
        .rotation()
        .exhausted_buckets()
        .contains(&BucketKey::from("0.50")));
}

#[tokio::test]
async fn test_empty_dataset_is_an_error() {
    let index = build_index("photos", &[("1.00", 0)]);
    let mut sampler = build_sampler(index, 2);

    let err = sampler.next_batch().await.unwrap_err();
    assert!(matches!(err, Error::EmptyDataset { seen: 0, unseen: 0, .. }));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_missing_metadata_aborts_without_marking_seen() {
    let index = build_index("photos", &[("1.00", 2)]);
    index.set_metadata("1.00_1.png", SampleMetadata::default());
    let mut sampler = build_sampler(index.clone(), 2);

    let err = sampler.next_batch().await.unwrap_err();
    assert!(matches!(
        err,
        Error::MissingMetadata { ref sample_id, ref field } if sample_id == "1.00_1.png" && field == "crop_coordinates"
    ));
    assert_eq!(index.seen_count(), 0);
}

#[tokio::test]
async fn test_legacy_mode_skips_crop_requirement() {
    let index = build_index("photos", &[("1.00", 2)]);
    index.set_metadata("1.00_0.png", SampleMetadata::default());

    let mut config = SamplerConfig::new("photos", 2);
    config.output_mode = OutputMode::Legacy;
    let mut sampler = BucketSamplerBuilder::new()
        .config(config)
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .build()
        .unwrap();

    assert_eq!(expect_batch(&mut sampler).await.len(), 2);
}

#[tokio::test]
async fn test_hydration_failure_aborts_without_marking_seen() {
    let index = build_index("photos", &[("1.00", 4)]);
    let materializer = Arc::new(StubMaterializer::new("photos").failing_on("1.00_2.png"));
    let mut sampler = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 4))
        .index(index.clone())
        .materializer(materializer.clone())
        .build()
        .unwrap();

    let err = sampler.next_batch().await.unwrap_err();
    assert!(materializer.calls.load(Ordering::SeqCst) >= 1);
    assert!(matches!(err, Error::Hydration { ref sample_id, .. } if sample_id == "1.00_2.png"));
    assert!(!err.is_configuration());
    assert_eq!(index.seen_count(), 0);
    assert_eq!(sampler.epoch(), 1);
}

#[tokio::test]
async fn test_failed_backfill_keeps_bucket_active() {
    let index = build_index("photos", &[("1.00", 3)]);
    let mut sampler = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 4))
        .index(index.clone())
        .materializer(Arc::new(
            StubMaterializer::new("photos").failing_on("1.00_2.png"),
        ))
        .build()
        .unwrap();

    assert!(matches!(
        sampler.next_batch().await,
        Err(Error::Hydration { .. })
    ));
    assert!(sampler.rotation().exhausted_buckets().is_empty());
    assert!(sampler.rotation().is_active(&BucketKey::from("1.00")));

    assert!(matches!(
        sampler.next_batch().await,
        Err(Error::Hydration { .. })
    ));
    assert_eq!(sampler.epoch(), 1);
    assert_eq!(index.seen_count(), 0);
    assert_eq!(index.unseen_count(), 3);
}

#[tokio::test]
async fn test_short_bucket_retires_after_successful_backfill() {
    let index = build_index("photos", &[("1.00", 3), ("1.50", 8)]);
    let mut sampler = build_sampler(index, 4);

    let batch = expect_batch(&mut sampler).await;
    assert_eq!(batch.bucket, BucketKey::from("1.00"));
    assert_eq!(batch.backfilled(), 1);
    assert_eq!(
        sampler.rotation().exhausted_buckets(),
        &[BucketKey::from("1.00")][..]
    );
}

#[test]
fn test_id_mismatch_is_rejected() {
    let index = build_index("photos", &[("1.00", 4)]);
    let result = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 2))
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("paintings")))
        .build();

    match result {
        Err(err @ Error::IdMismatch { .. }) => assert!(err.is_configuration()),
        Err(other) => panic!("expected id mismatch, got {:?}", other),
        Ok(_) => panic!("expected id mismatch"),
    }
}

#[test]
fn test_builder_requires_collaborators() {
    let result = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 2))
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_conditioning_pairs_by_relative_path() {
    let index = Arc::new(InMemoryBucketIndex::new("photos").with_instance_root("/data/photos"));
    for i in 0..2 {
        index.add_sample("1.00", format!("/data/photos/cats/{}.png", i), Some(cropped()));
    }
    let conditioning_index =
        Arc::new(InMemoryBucketIndex::new("photos_edges").with_instance_root("/cond/photos"));
    let source = ConditioningSource::new(
        ConditioningType::ControlNet,
        conditioning_index,
        Arc::new(StubMaterializer::new("photos_edges")),
    )
    .unwrap();

    let mut config = SamplerConfig::new("photos", 2);
    config.conditioning_type = Some("controlnet".to_string());
    let mut sampler = BucketSamplerBuilder::new()
        .config(config)
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .conditioning(source)
        .build()
        .unwrap();

    let batch = expect_batch(&mut sampler).await;
    assert_eq!(batch.conditioning.len(), batch.len());
    for (item, companion) in batch.items.iter().zip(&batch.conditioning) {
        assert_eq!(companion.source_id, item.sample_id);
        assert_eq!(companion.kind, ConditioningType::ControlNet);
        let relative = item.sample_id.trim_start_matches("/data/photos/");
        assert_eq!(companion.sample_id, format!("/cond/photos/{}", relative));
        assert_eq!(companion.payload.data, companion.sample_id.as_bytes());
    }
}

#[test]
fn test_conditioning_kind_must_match_config() {
    let source = ConditioningSource::new(
        ConditioningType::Mask,
        Arc::new(InMemoryBucketIndex::new("masks")),
        Arc::new(StubMaterializer::new("masks")),
    )
    .unwrap();

    let mut config = SamplerConfig::new("photos", 2);
    config.conditioning_type = Some("controlnet".to_string());
    let result = BucketSamplerBuilder::new()
        .config(config)
        .index(build_index("photos", &[("1.00", 2)]))
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .conditioning(source)
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_conditioning_source_checks_ids() {
    let result = ConditioningSource::new(
        ConditioningType::Mask,
        Arc::new(InMemoryBucketIndex::new("masks")),
        Arc::new(StubMaterializer::new("photos")),
    );
    match result {
        Err(Error::Config(message)) => {
            assert!(message.contains("Conditioning index ID (masks)"));
            assert!(message.contains("SampleMaterializer ID (photos)"));
        }
        Err(other) => panic!("expected config error, got {:?}", other),
        Ok(_) => panic!("expected config error"),
    }
}

#[tokio::test]
async fn test_conditioning_failure_aborts_without_marking_seen() {
    let index = Arc::new(InMemoryBucketIndex::new("photos").with_instance_root("/data/photos"));
    for i in 0..2 {
        index.add_sample("1.00", format!("/data/photos/cats/{}.png", i), Some(cropped()));
    }
    let source = ConditioningSource::new(
        ConditioningType::Mask,
        Arc::new(InMemoryBucketIndex::new("photos_masks").with_instance_root("/cond/photos")),
        Arc::new(StubMaterializer::new("photos_masks").failing_on("/cond/photos/cats/1.png")),
    )
    .unwrap();

    let mut sampler = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 2))
        .index(index.clone())
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .conditioning(source)
        .build()
        .unwrap();

    let err = sampler.next_batch().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Hydration { ref sample_id, .. } if sample_id == "/cond/photos/cats/1.png"
    ));
    assert_eq!(index.seen_count(), 0);
    assert!(sampler.rotation().exhausted_buckets().is_empty());
}

#[tokio::test]
async fn test_round_robin_order() {
    let index = build_index("photos", &[("0.75", 8), ("1.00", 8), ("1.33", 8)]);
    let mut sampler = build_sampler(index, 2);

    let mut order = Vec::new();
    for _ in 0..6 {
        order.push(expect_batch(&mut sampler).await.bucket.to_string());
    }
    assert_eq!(order, vec!["0.75", "1.00", "1.33", "0.75", "1.00", "1.33"]);
}

#[tokio::test]
async fn test_active_and_exhausted_stay_disjoint() {
    let index = build_index("photos", &[("0.50", 3), ("1.00", 7), ("1.50", 1), ("2.00", 0)]);
    let mut sampler = build_sampler(index, 3);

    for _ in 0..30 {
        sampler.next_batch().await.unwrap();
        let active: HashSet<BucketKey> = sampler.rotation().active_buckets().into_iter().collect();
        let exhausted: HashSet<BucketKey> =
            sampler.rotation().exhausted_buckets().iter().cloned().collect();
        assert!(active.is_disjoint(&exhausted));
        assert_eq!(active.len() + exhausted.len(), 4);
    }
}

#[test_case(10, 0, 4 => 3; "rounds up")]
#[test_case(12, 0, 4 => 3; "exact")]
#[test_case(10, 1, 4 => 5; "counts repeats")]
#[test_case(1, 0, 8 => 1; "smaller than a batch")]
#[test_case(0, 3, 4 => 0; "empty")]
fn test_len_estimate(total: usize, repeats: usize, batch_size: usize) -> usize {
    let index = build_index("photos", &[("1.00", total)]);
    let mut config = SamplerConfig::new("photos", batch_size);
    config.repeats = repeats;
    BucketSamplerBuilder::new()
        .config(config)
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .build()
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_save_hands_state_to_store() {
    let mut store = MockCheckpointStore::new();
    store
        .expect_save()
        .withf(|address, state| {
            address == "checkpoint-10/photos.json"
                && state.epoch == Some(1)
                && state.batch_size == Some(2)
                && state.seen_count() == 2
                && state.current_bucket() == Some(&BucketKey::from("1.00"))
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let index = build_index("photos", &[("1.00", 4), ("1.50", 4)]);
    let mut sampler = build_sampler(index, 2);
    sampler.checkpoint_store = Arc::new(store);

    expect_batch(&mut sampler).await;
    sampler.save("checkpoint-10/photos.json").unwrap();
}

#[tokio::test]
async fn test_failed_load_leaves_sampler_unchanged() {
    let mut store = MockCheckpointStore::new();
    store
        .expect_load()
        .times(1)
        .returning(|_| Err(Error::checkpoint("no such blob")));

    let index = build_index("photos", &[("1.00", 4), ("1.50", 1)]);
    let mut sampler = build_sampler(index.clone(), 2);
    sampler.checkpoint_store = Arc::new(store);
    expect_batch(&mut sampler).await;
    let before = sampler.statistics();

    assert!(matches!(sampler.restore("missing"), Err(Error::Checkpoint(_))));
    assert_eq!(sampler.statistics(), before);
    assert_eq!(index.seen_count(), 2);
}

#[tokio::test]
async fn test_restore_resumes_after_saved_bucket() {
    let store = Arc::new(MemoryCheckpointStore::new());

    let mut original = build_sampler(build_index("photos", &[("0.75", 8), ("1.00", 8), ("1.33", 1)]), 2);
    original.checkpoint_store = store.clone();
    expect_batch(&mut original).await;
    let saved_from = expect_batch(&mut original).await;
    assert_eq!(saved_from.bucket, BucketKey::from("1.00"));
    original.save("resume").unwrap();

    let index = build_index("photos", &[("0.75", 8), ("1.00", 8), ("1.33", 1)]);
    let mut resumed = build_sampler(index.clone(), 2);
    resumed.checkpoint_store = store;
    resumed.restore("resume").unwrap();

    assert_eq!(index.seen_count(), 4);
    assert_eq!(resumed.epoch(), 1);
    let next = expect_batch(&mut resumed).await;
    assert_eq!(next.bucket, BucketKey::from("1.33"));
}

#[tokio::test]
async fn test_restore_applies_exhausted_buckets_and_epoch() {
    let state = SamplerState {
        bucket_order: vec![BucketKey::from("1.00"), BucketKey::from("1.50")],
        exhausted_buckets: Some(vec![BucketKey::from("1.78"), BucketKey::from("9.99")]),
        batch_size: Some(8),
        current_bucket_index: Some(0),
        seen: Some(BTreeSet::from(["1.00_0.png".to_string()])),
        epoch: Some(3),
        ..Default::default()
    };
    let mut store = MockCheckpointStore::new();
    store
        .expect_load()
        .times(2)
        .returning(move |_| Ok(state.clone()));

    let index = build_index("photos", &[("1.00", 4), ("1.50", 4), ("1.78", 4)]);
    let mut sampler = build_sampler(index.clone(), 2);
    sampler.checkpoint_store = Arc::new(store);

    sampler.restore("resume").unwrap();
    assert_eq!(sampler.epoch(), 3);
    assert_eq!(
        sampler.rotation().exhausted_buckets(),
        &[BucketKey::from("1.78")][..]
    );
    assert!(index.is_seen("1.00_0.png"));

    sampler.restore("resume").unwrap();
    assert_eq!(sampler.rotation().exhausted_buckets().len(), 1);
    assert_eq!(index.seen_count(), 1);

    let next = expect_batch(&mut sampler).await;
    assert_eq!(next.bucket, BucketKey::from("1.50"));
}

#[tokio::test]
async fn test_restore_after_reset_draws_from_first_bucket() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let buckets = [("0.75", 1), ("1.00", 1), ("1.33", 1)];

    let mut live = build_sampler(build_index("photos", &buckets), 1);
    live.checkpoint_store = store.clone();
    while !live.next_batch().await.unwrap().is_exhausted() {}
    live.save("after-reset").unwrap();

    let mut resumed = build_sampler(build_index("photos", &buckets), 1);
    resumed.checkpoint_store = store;
    resumed.restore("after-reset").unwrap();
    assert_eq!(resumed.epoch(), 2);

    let mut live_order = Vec::new();
    let mut resumed_order = Vec::new();
    for _ in 0..3 {
        live_order.push(expect_batch(&mut live).await.bucket.to_string());
        resumed_order.push(expect_batch(&mut resumed).await.bucket.to_string());
    }
    assert_eq!(live_order, vec!["0.75", "1.00", "1.33"]);
    assert_eq!(resumed_order, live_order);
}

#[tokio::test]
async fn test_restore_after_failed_pull_retries_bucket() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let broken = build_index("photos", &[("0.75", 2), ("1.00", 2)]);
    broken.set_metadata("0.75_0.png", SampleMetadata::default());

    let mut original = build_sampler(broken, 2);
    original.checkpoint_store = store.clone();
    assert!(original.next_batch().await.is_err());
    original.save("after-failure").unwrap();
    assert_eq!(store.load("after-failure").unwrap().advance_pending, Some(false));

    let mut resumed = build_sampler(build_index("photos", &[("0.75", 2), ("1.00", 2)]), 2);
    resumed.checkpoint_store = store;
    resumed.restore("after-failure").unwrap();
    assert_eq!(expect_batch(&mut resumed).await.bucket, BucketKey::from("0.75"));
}

#[tokio::test]
async fn test_restore_partial_checkpoint() {
    let store = Arc::new(MemoryCheckpointStore::new());
    store
        .save(
            "partial",
            &SamplerState {
                seen: Some(BTreeSet::from(["1.00_1.png".to_string()])),
                ..Default::default()
            },
        )
        .unwrap();

    let index = build_index("photos", &[("1.00", 4)]);
    let mut sampler = build_sampler(index.clone(), 2);
    sampler.checkpoint_store = store;
    sampler.restore("partial").unwrap();

    assert_eq!(sampler.epoch(), 1);
    assert!(sampler.rotation().exhausted_buckets().is_empty());
    assert_eq!(index.seen_count(), 1);

    let batch = expect_batch(&mut sampler).await;
    assert!(!batch.sample_ids().contains(&"1.00_1.png"));
}

#[tokio::test]
async fn test_validation_set_leaves_seen_untouched() {
    let index = build_index("photos", &[("1.00", 3), ("1.50", 0)]);
    let mut sampler = build_sampler(index.clone(), 2);

    let samples = sampler.validation_set(3).await.unwrap();
    let names: Vec<&str> = samples.iter().map(|s| s.shortname.as_str()).collect();
    assert_eq!(names, vec!["photos_0", "photos_1", "photos_2"]);
    for sample in &samples {
        assert!(sample.item.sample_id.starts_with("1.00_"));
        assert_eq!(
            sample.prompt.as_deref(),
            Some(format!("caption for {}", sample.item.sample_id).as_str())
        );
    }
    assert_eq!(index.seen_count(), 0);
}

#[tokio::test]
async fn test_validation_set_on_empty_dataset() {
    let mut sampler = build_sampler(build_index("photos", &[("1.00", 0)]), 2);
    assert!(matches!(
        sampler.validation_set(1).await,
        Err(Error::EmptyDataset { .. })
    ));
}

#[tokio::test]
async fn test_hydrate_path_prefixes_instance_root() {
    let index = Arc::new(InMemoryBucketIndex::new("photos").with_instance_root("/data/photos"));
    let sampler = BucketSamplerBuilder::new()
        .config(SamplerConfig::new("photos", 1))
        .index(index)
        .materializer(Arc::new(StubMaterializer::new("photos")))
        .build()
        .unwrap();

    let relative = sampler.hydrate_path("cats/0.png").await.unwrap();
    assert_eq!(relative.data, "/data/photos/cats/0.png".as_bytes());

    let absolute = sampler.hydrate_path("/data/photos/cats/1.png").await.unwrap();
    assert_eq!(absolute.data, "/data/photos/cats/1.png".as_bytes());

    let remote = sampler.hydrate_path("https://host/cat.png").await.unwrap();
    assert_eq!(remote.data, "https://host/cat.png".as_bytes());
}

#[tokio::test]
async fn test_statistics_track_progress() {
    let index = build_index("photos", &[("1.00", 4), ("1.50", 1)]);
    let mut sampler = build_sampler(index, 2);

    expect_batch(&mut sampler).await;
    expect_batch(&mut sampler).await;

    let stats = sampler.log_state();
    assert_eq!(stats.seen, 3);
    assert_eq!(stats.unseen, 2);
    assert_eq!(stats.current_bucket, Some(BucketKey::from("1.50")));
    assert_eq!(stats.active_buckets, vec!["1.00 (4 samples)".to_string()]);
    assert_eq!(stats.exhausted_buckets, vec!["1.50 (1 samples)".to_string()]);

    let overview = sampler.overview();
    assert_eq!(overview.total_samples, 5);
    assert_eq!(overview.bucket_count, 2);
    assert_eq!(overview.noun, "images");
}
