//! Emitted font files: naming, public URLs and the in-memory store the dev
//! server reads from.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::host::{AssetEmitter, EmittedAsset};
use crate::loader::FontFileEmitter;

/// Directory emitted font files are written to, relative to the assets root.
pub const MEDIA_DIR: &str = "static/media";

/// Prefix between the base path and an asset name in public URLs.
pub const ASSET_PREFIX: &str = "_next";

/// Hex-encoded SHA-256 of `data`.
pub fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Name of an emitted font file: `static/media/<hash>{-s}{.p}.<ext>`.
///
/// `-s` marks files used with size-adjusted fallbacks, `.p` files to preload.
pub fn font_file_name(content: &[u8], ext: &str, preload: bool, size_adjust: bool) -> String {
    let hash = hash_content(content);
    format!(
        "{}/{}{}{}.{}",
        MEDIA_DIR,
        &hash[..16],
        if size_adjust { "-s" } else { "" },
        if preload { ".p" } else { "" },
        ext
    )
}

/// MIME type of a font file.
pub fn content_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match ext {
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// Builds public URLs for emitted assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontUrlBuilder {
    base_path: String,
}

impl FontUrlBuilder {
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `{base}/_next/{name}`
    pub fn url(&self, asset_name: &str) -> String {
        format!("{}/{}/{}", self.base_path, ASSET_PREFIX, asset_name)
    }
}

/// A font file held by the [`FontAssetStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFont {
    pub file_name: String,
    pub content: Arc<Vec<u8>>,
    pub content_type: &'static str,
}

/// Thread-safe map of public URL to emitted font file.
#[derive(Debug, Clone, Default)]
pub struct FontAssetStore {
    inner: Arc<RwLock<FxHashMap<String, StoredFont>>>,
}

impl FontAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, file_name: impl Into<String>, content: Vec<u8>) {
        let file_name = file_name.into();
        let stored = StoredFont {
            content_type: content_type(&file_name),
            file_name,
            content: Arc::new(content),
        };
        self.inner.write().insert(url.into(), stored);
    }

    pub fn get(&self, url: &str) -> Option<StoredFont> {
        self.inner.read().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.read().contains_key(url)
    }

    pub fn remove(&self, url: &str) -> Option<StoredFont> {
        self.inner.write().remove(url)
    }

    /// All stored URLs, sorted.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.inner.read().keys().cloned().collect();
        urls.sort();
        urls
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// The [`FontFileEmitter`] handed to loaders for one load.
///
/// Every file goes into the store. Outside dev the file is also forwarded to
/// the host. The names emitted during the load are kept for the manifest.
pub struct SessionEmitter<'e> {
    store: &'e FontAssetStore,
    urls: &'e FontUrlBuilder,
    host: &'e dyn AssetEmitter,
    is_dev: bool,
    emitted: Mutex<Vec<String>>,
}

impl<'e> SessionEmitter<'e> {
    pub fn new(
        store: &'e FontAssetStore,
        urls: &'e FontUrlBuilder,
        host: &'e dyn AssetEmitter,
        is_dev: bool,
    ) -> Self {
        Self {
            store,
            urls,
            host,
            is_dev,
            emitted: Mutex::new(Vec::new()),
        }
    }

    /// Asset names emitted so far, in emission order without duplicates.
    pub fn emitted(&self) -> Vec<String> {
        self.emitted.lock().clone()
    }
}

impl FontFileEmitter for SessionEmitter<'_> {
    fn emit_font_file(&self, content: &[u8], ext: &str, preload: bool, size_adjust: bool) -> String {
        let file_name = font_file_name(content, ext, preload, size_adjust);
        let url = self.urls.url(&file_name);

        if !self.is_dev {
            self.host.emit(EmittedAsset {
                file_name: file_name.clone(),
                source: content.to_vec(),
            });
        }
        self.store.insert(url.clone(), file_name.clone(), content.to_vec());

        let mut emitted = self.emitted.lock();
        if !emitted.contains(&file_name) {
            emitted.push(file_name);
        }
        url
    }
}
