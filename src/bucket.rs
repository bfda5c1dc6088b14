//! Aspect-ratio bucket identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of an aspect-ratio bucket, e.g. `1.78`
///
/// Keys are stored as text so they index cleanly and survive serialization
/// without float round-off.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(String);

impl BucketKey {
    /// Create a key from its textual form
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create a key from an aspect ratio, rounded to two decimals
    pub fn from_aspect_ratio(aspect_ratio: f64) -> Self {
        Self(format!("{:.2}", aspect_ratio))
    }

    /// Textual form of the key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the key back into an aspect ratio
    pub fn aspect_ratio(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    /// Label used in state logs, e.g. `1.78 (10 samples)`
    pub fn human_readable(&self, sample_count: usize) -> String {
        format!("{} ({} samples)", self.0, sample_count)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BucketKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for BucketKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
