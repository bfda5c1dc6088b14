//! Checkpoint store implementations

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::{CheckpointStore, SamplerState};
use crate::error::{Error, Result};

/// Stores each state blob as a pretty-printed JSON file
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
    root: Option<PathBuf>,
}

impl JsonFileStore {
    /// Treat addresses as plain paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve addresses relative to `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// File path an address maps to
    pub fn path_for(&self, address: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(address),
            None => PathBuf::from(address),
        }
    }

    fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl CheckpointStore for JsonFileStore {
    #[instrument(skip(self, state))]
    fn save(&self, address: &str, state: &SamplerState) -> Result<()> {
        let path = self.path_for(address);
        let content = serde_json::to_vec_pretty(state)?;
        Self::write_atomic(&path, &content)?;
        info!("Saved sampler state to {:?} ({} bytes)", path, content.len());
        Ok(())
    }

    #[instrument(skip(self))]
    fn load(&self, address: &str) -> Result<SamplerState> {
        let path = self.path_for(address);
        if !path.exists() {
            return Err(Error::checkpoint(format!(
                "No sampler state at {}",
                path.display()
            )));
        }
        let content = fs::read(&path)?;
        let state = serde_json::from_slice(&content)?;
        debug!("Loaded sampler state from {:?}", path);
        Ok(state)
    }
}

/// Keeps serialized state blobs in memory, keyed by address
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored at `address`
    pub fn contains(&self, address: &str) -> bool {
        self.blobs.lock().contains_key(address)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, address: &str, state: &SamplerState) -> Result<()> {
        let blob = serde_json::to_vec(state)?;
        self.blobs.lock().insert(address.to_string(), blob);
        Ok(())
    }

    fn load(&self, address: &str) -> Result<SamplerState> {
        let blobs = self.blobs.lock();
        let blob = blobs
            .get(address)
            .ok_or_else(|| Error::checkpoint(format!("No sampler state at '{}'", address)))?;
        Ok(serde_json::from_slice(blob)?)
    }
}
