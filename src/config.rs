//! Configuration structures for the bucket sampler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::metadata::OutputMode;

/// Configuration for a single dataset's sampler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Dataset id; must match the bucket index and materializer ids
    pub id: String,
    /// Number of samples per yielded batch
    pub batch_size: usize,
    /// Extra passes over the dataset counted by the length estimate
    #[serde(default)]
    pub repeats: usize,
    /// Metadata requirements of the consuming model
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Conditioning companion tag (`controlnet` or `mask`)
    #[serde(default)]
    pub conditioning_type: Option<String>,
    /// Kind of samples in the dataset
    #[serde(default)]
    pub dataset_type: DatasetType,
    /// Whether this dataset provides regularisation samples
    #[serde(default)]
    pub is_regularisation_data: bool,
    /// Training resolution
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Unit of `resolution`
    #[serde(default)]
    pub resolution_type: ResolutionType,
    /// Base seed; combined with `rank` for per-replica determinism
    #[serde(default)]
    pub seed: Option<u64>,
    /// Replica rank in a distributed run
    #[serde(default)]
    pub rank: usize,
    /// Maximum concurrent hydration calls per batch
    #[serde(default = "default_hydration_concurrency")]
    pub hydration_concurrency: usize,
    /// Log a state summary before every epoch reset
    #[serde(default)]
    pub print_sampler_statistics: bool,
    /// Log rotation decisions at info level
    #[serde(default)]
    pub debug_aspect_buckets: bool,
}

fn default_resolution() -> f64 {
    1024.0
}

fn default_hydration_concurrency() -> usize {
    num_cpus::get()
}

impl SamplerConfig {
    /// Create a configuration with defaults for everything but id and batch size
    pub fn new(id: impl Into<String>, batch_size: usize) -> Self {
        Self {
            id: id.into(),
            batch_size,
            repeats: 0,
            output_mode: OutputMode::default(),
            conditioning_type: None,
            dataset_type: DatasetType::default(),
            is_regularisation_data: false,
            resolution: default_resolution(),
            resolution_type: ResolutionType::default(),
            seed: None,
            rank: 0,
            hydration_concurrency: default_hydration_concurrency(),
            print_sampler_statistics: false,
            debug_aspect_buckets: false,
        }
    }

    /// Load configuration from a JSON or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::config("Sampler id must not be empty"));
        }

        if self.batch_size == 0 {
            return Err(Error::config("Batch size must be > 0"));
        }

        if self.hydration_concurrency == 0 {
            return Err(Error::config("Hydration concurrency must be > 0"));
        }

        if self.resolution <= 0.0 {
            return Err(Error::config("Resolution must be > 0"));
        }

        self.conditioning()?;
        Ok(())
    }

    /// Parsed conditioning companion type, if one is configured
    pub fn conditioning(&self) -> Result<Option<ConditioningType>> {
        self.conditioning_type
            .as_deref()
            .map(str::parse)
            .transpose()
    }
}

/// Conditioning companion kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditioningType {
    /// ControlNet conditioning image
    ControlNet,
    /// Inpainting mask
    Mask,
}

impl FromStr for ConditioningType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "controlnet" => Ok(Self::ControlNet),
            "mask" => Ok(Self::Mask),
            other => Err(Error::config(format!(
                "Unknown conditioning image type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ConditioningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlNet => f.write_str("controlnet"),
            Self::Mask => f.write_str("mask"),
        }
    }
}

/// Kind of samples a dataset holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    /// Still images
    #[default]
    Image,
    /// Video clips
    Video,
}

impl DatasetType {
    /// Singular noun used in log messages
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Plural noun used in log messages
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }
}

/// How `resolution` is measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    /// Edge length in pixels
    #[default]
    Pixel,
    /// Area in megapixels
    Area,
}

impl ResolutionType {
    /// Unit label for summaries
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Pixel => "px",
            Self::Area => "megapixels",
        }
    }
}
