//! Structured per-sample metadata and output-mode validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Metadata recorded for a sample when the bucket index was built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Size of the source sample (width, height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<(u32, u32)>,
    /// Size after resizing to the bucket resolution (width, height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_size: Option<(u32, u32)>,
    /// Top-left crop offset (left, top)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_coordinates: Option<(u32, u32)>,
    /// Aspect ratio of the target size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    /// Any other fields the index carries
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SampleMetadata {
    /// Check that every field `mode` requires is present
    pub fn validate_for(&self, sample_id: &str, mode: OutputMode) -> Result<()> {
        for field in mode.required_fields() {
            let present = match *field {
                "crop_coordinates" => self.crop_coordinates.is_some(),
                other => self.extra.contains_key(other),
            };
            if !present {
                return Err(Error::missing_metadata(sample_id, *field));
            }
        }
        Ok(())
    }
}

/// What the downstream model needs from each sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Models conditioned on crop geometry; crop coordinates are mandatory
    #[default]
    CropAware,
    /// Legacy models that ignore crop geometry
    Legacy,
}

impl OutputMode {
    /// Metadata fields that must be present in this mode
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            OutputMode::CropAware => &["crop_coordinates"],
            OutputMode::Legacy => &[],
        }
    }
}
