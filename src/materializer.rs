//! Sample hydration
//!
//! A materializer turns a sample id into its payload. Decoding and pixel
//! transforms happen downstream; the sampler only needs the raw bytes and an
//! optional caption.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::metadata::SampleMetadata;

/// Hydrated content of a sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplePayload {
    /// Raw encoded sample data
    pub data: Bytes,
    /// Caption text, when the materializer resolves one
    pub caption: Option<String>,
}

impl SamplePayload {
    /// Payload with data and no caption
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            caption: None,
        }
    }

    /// Attach a caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Produces sample payloads; may be backed by disk, network or object storage
#[async_trait]
pub trait SampleMaterializer: Send + Sync {
    /// Dataset id this materializer serves
    fn id(&self) -> &str;

    /// Fetch the payload of `sample_id`
    async fn hydrate(&self, sample_id: &str, metadata: &SampleMetadata) -> Result<SamplePayload>;
}

/// Reads sample files from the local filesystem
pub struct FsMaterializer {
    id: String,
    root: Option<PathBuf>,
    caption_extension: Option<String>,
}

impl FsMaterializer {
    /// Create a materializer resolving ids as paths
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root: None,
            caption_extension: None,
        }
    }

    /// Resolve relative ids against `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Read captions from a sidecar file with this extension, e.g. `txt`
    pub fn with_caption_extension(mut self, extension: impl Into<String>) -> Self {
        self.caption_extension = Some(extension.into());
        self
    }

    fn resolve(&self, sample_id: &str) -> PathBuf {
        let path = Path::new(sample_id);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl SampleMaterializer for FsMaterializer {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(skip(self, _metadata))]
    async fn hydrate(&self, sample_id: &str, _metadata: &SampleMetadata) -> Result<SamplePayload> {
        let path = self.resolve(sample_id);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::hydration(sample_id, format!("{}: {}", path.display(), e)))?;

        let caption = match &self.caption_extension {
            Some(extension) => {
                let caption_path = path.with_extension(extension);
                match tokio::fs::read_to_string(&caption_path).await {
                    Ok(text) => Some(text.trim().to_string()),
                    Err(e) => {
                        debug!("No caption at {:?}: {}", caption_path, e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(SamplePayload {
            data: Bytes::from(data),
            caption,
        })
    }
}
