//! Sample selection and batch hydration

use futures::stream::{self, StreamExt, TryStreamExt};
use rand::seq::index;
use rand::Rng;
use std::collections::HashSet;
use tracing::error;

use crate::error::Result;
use crate::materializer::{SampleMaterializer, SamplePayload};
use crate::metadata::SampleMetadata;

/// Outcome of drawing from one bucket
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrawPlan {
    /// Enough unseen samples: a batch drawn without replacement
    Full(Vec<String>),
    /// Short bucket: all unseen samples plus replacement draws
    Backfill {
        unseen: Vec<String>,
        backfill: Vec<String>,
    },
    /// Empty population; nothing can be drawn
    Empty,
}

/// Unseen members of `population`, deduplicated, in population order
pub(crate) fn unseen_samples(population: &[String], is_seen: impl Fn(&str) -> bool) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut unseen = Vec::new();
    for id in population {
        if !is_seen(id.as_str()) && visited.insert(id.as_str()) {
            unseen.push(id.clone());
        }
    }
    unseen
}

/// Decide how a batch of `batch_size` is drawn from a bucket
pub(crate) fn plan_draw<R: Rng + ?Sized>(
    population: &[String],
    unseen: &[String],
    batch_size: usize,
    rng: &mut R,
) -> DrawPlan {
    if unseen.len() >= batch_size {
        let picked = index::sample(rng, unseen.len(), batch_size)
            .into_iter()
            .map(|i| unseen[i].clone())
            .collect();
        return DrawPlan::Full(picked);
    }

    if population.is_empty() {
        return DrawPlan::Empty;
    }

    DrawPlan::Backfill {
        unseen: unseen.to_vec(),
        backfill: backfill_draw(population, batch_size - unseen.len(), rng),
    }
}

/// Draw `count` ids from `population` with replacement
///
/// Draws happen in rounds of distinct samples, so duplicates only appear once
/// the whole population has been used in the current round.
pub(crate) fn backfill_draw<R: Rng + ?Sized>(
    population: &[String],
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut drawn = Vec::with_capacity(count);
    if population.is_empty() {
        return drawn;
    }
    while drawn.len() < count {
        let round = (count - drawn.len()).min(population.len());
        drawn.extend(
            index::sample(rng, population.len(), round)
                .into_iter()
                .map(|i| population[i].clone()),
        );
    }
    drawn
}

/// Hydrate every request, at most `concurrency` at a time
///
/// Results come back in request order. The first failure aborts the batch.
pub(crate) async fn hydrate_all(
    materializer: &dyn SampleMaterializer,
    requests: &[(String, SampleMetadata)],
    concurrency: usize,
) -> Result<Vec<SamplePayload>> {
    stream::iter(requests.iter().map(|(sample_id, metadata)| async move {
        materializer
            .hydrate(sample_id, metadata)
            .await
            .map_err(|e| {
                error!("Could not hydrate {}: {}", sample_id, e);
                e
            })
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await
}
