//! Seams to the host bundler.
//!
//! The session never writes output files or touches the filesystem directly.
//! Emitted font files go to an [`AssetEmitter`] and local font files are read
//! through a [`FontFileReader`], so hosts and tests can substitute both.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LoaderError;

/// A font file handed to the host for inclusion in the build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Output path relative to the assets directory, `static/media/...`
    pub file_name: String,
    pub source: Vec<u8>,
}

/// Receives the font files of a production build.
pub trait AssetEmitter: Send + Sync {
    fn emit(&self, asset: EmittedAsset);
}

/// Discards every asset. Used in dev, where fonts are served from memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl AssetEmitter for NoopEmitter {
    fn emit(&self, _asset: EmittedAsset) {}
}

/// Keeps every emitted asset, in emission order.
#[derive(Debug, Clone, Default)]
pub struct CollectingEmitter {
    assets: Arc<RwLock<Vec<EmittedAsset>>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> Vec<EmittedAsset> {
        self.assets.read().clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.assets
            .read()
            .iter()
            .map(|asset| asset.file_name.clone())
            .collect()
    }
}

impl AssetEmitter for CollectingEmitter {
    fn emit(&self, asset: EmittedAsset) {
        self.assets.write().push(asset);
    }
}

/// Reads local font files.
#[async_trait]
pub trait FontFileReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError>;
}

/// Reads from the native filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileReader;

#[async_trait]
impl FontFileReader for NativeFileReader {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| LoaderError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Serves files from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileReader {
    files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) {
        self.files.write().remove(path);
    }
}

#[async_trait]
impl FontFileReader for MemoryFileReader {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, LoaderError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::ReadFailed {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            })
    }
}
