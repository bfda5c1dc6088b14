//! Bucket rotation state machine
//!
//! The enumeration order is fixed when the rotation is built and never
//! mutated; exhaustion only flips a bucket's flag. The active order is the
//! subsequence of flagged-active keys, so removing a bucket cannot shift the
//! position of any other.

use rand::Rng;
use std::collections::HashMap;

use crate::bucket::BucketKey;

/// Active/exhausted bookkeeping and the cursor over active buckets
#[derive(Debug, Clone, Default)]
pub struct BucketRotation {
    order: Vec<BucketKey>,
    active: HashMap<BucketKey, bool>,
    exhausted: Vec<BucketKey>,
    current: Option<BucketKey>,
}

impl BucketRotation {
    /// Build a rotation with every key active; duplicate keys are dropped
    pub fn new(keys: impl IntoIterator<Item = BucketKey>) -> Self {
        let mut order = Vec::new();
        let mut active = HashMap::new();
        for key in keys {
            if active.insert(key.clone(), true).is_none() {
                order.push(key);
            }
        }
        Self {
            order,
            active,
            exhausted: Vec::new(),
            current: None,
        }
    }

    /// Active buckets in enumeration order
    pub fn active_buckets(&self) -> Vec<BucketKey> {
        self.order
            .iter()
            .filter(|key| self.is_active(key))
            .cloned()
            .collect()
    }

    /// Number of active buckets
    pub fn active_len(&self) -> usize {
        self.active.values().filter(|active| **active).count()
    }

    /// Exhausted buckets in exhaustion order
    pub fn exhausted_buckets(&self) -> &[BucketKey] {
        &self.exhausted
    }

    /// Whether `key` is part of the rotation and not exhausted
    pub fn is_active(&self, key: &BucketKey) -> bool {
        self.active.get(key).copied().unwrap_or(false)
    }

    /// Bucket under the cursor
    pub fn current(&self) -> Option<&BucketKey> {
        self.current.as_ref()
    }

    /// Position of the cursor within the active order
    pub fn current_index(&self) -> Option<usize> {
        let current = self.current.as_ref()?;
        self.order
            .iter()
            .filter(|key| self.is_active(key))
            .position(|key| key == current)
    }

    /// Move the cursor to the next active bucket
    ///
    /// Returns `None` when no bucket is active. If the bucket under the cursor
    /// was exhausted since the last move, a replacement is drawn uniformly
    /// from the active buckets instead of stepping.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<BucketKey> {
        let active = self.active_buckets();
        if active.is_empty() {
            self.current = None;
            return None;
        }

        let next = match &self.current {
            None => 0,
            Some(current) => match active.iter().position(|key| key == current) {
                Some(position) => (position + 1) % active.len(),
                None => rng.random_range(0..active.len()),
            },
        };

        let key = active[next].clone();
        self.current = Some(key.clone());
        Some(key)
    }

    /// Take `key` out of the rotation until the next reset
    ///
    /// Returns `false` if the key is unknown or already exhausted.
    pub fn mark_exhausted(&mut self, key: &BucketKey) -> bool {
        match self.active.get_mut(key) {
            Some(flag) if *flag => {
                *flag = false;
                self.exhausted.push(key.clone());
                true
            }
            _ => false,
        }
    }

    /// Re-apply exhausted buckets from a checkpoint; returns how many applied
    pub fn restore_exhausted(&mut self, keys: &[BucketKey]) -> usize {
        keys.iter().filter(|key| self.mark_exhausted(key)).count()
    }

    /// Put the cursor on `key` without stepping; `false` if it is not active
    pub fn anchor(&mut self, key: &BucketKey) -> bool {
        if self.is_active(key) {
            self.current = Some(key.clone());
            true
        } else {
            false
        }
    }
}
