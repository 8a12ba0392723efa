//! The build session: state shared by the transform and load hooks.
//!
//! A session tracks, per calling module, the virtual stylesheets its latest
//! transform imports. Loading those stylesheets fills the manifest; once no
//! import is left unloaded the completion callback fires with a manifest
//! snapshot. Retransforming a module retracts whatever it no longer imports.

use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::assets::{FontAssetStore, FontUrlBuilder};
use crate::config::FontConfig;
use crate::css_module::{CssModuleGenerator, TargetCss};
use crate::error::Result;
use crate::host::{AssetEmitter, FontFileReader, NativeFileReader, NoopEmitter};
use crate::lazy::LazyLoader;
use crate::loader::google::{GoogleFontCatalog, GoogleFontsApi};
use crate::loader::{FontLoader, FontMetricsProvider, GoogleFontLoader, LoaderKind, LocalFontLoader};
use crate::manifest::{FontManifest, FontMetadata, ManifestQuery, render_manifest_module};
use crate::pipeline::{LoadRequest, LoadedTargetCss, TargetCssPipeline, target_css_key};
use crate::transform::{TransformOptions, TransformedModule, transform_module};
use crate::virtual_id::remove_query_suffix;

static SCRIPT_MODULE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\.(?:j|t)sx?$|\.mjs$").ok());

/// Called once per revision when every font import has been loaded.
pub type OnFinished = Box<dyn Fn(&FontManifest) + Send + Sync>;

/// A virtual stylesheet imported by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontImportRecord {
    /// Specifier as written into the transformed module
    pub specifier: String,
    /// Normalized target CSS key
    pub key: String,
    pub resolved: bool,
}

/// The stylesheets and assets a bundler chunk pulls in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCss {
    pub css: String,
    /// Emitted font asset names referenced by `css`
    pub assets: Vec<String>,
}

#[derive(Default)]
struct SessionState {
    records: BTreeMap<String, Vec<FontImportRecord>>,
    manifest: FontManifest,
    finished: bool,
}

impl SessionState {
    fn pending(&self) -> usize {
        self.records
            .values()
            .flatten()
            .filter(|record| !record.resolved)
            .count()
    }
}

/// Close the revision when imports are recorded and all of them are loaded.
fn take_completion(state: &mut SessionState) -> Option<FontManifest> {
    if state.finished || state.records.is_empty() || state.pending() > 0 {
        return None;
    }
    state.finished = true;
    Some(state.manifest.clone())
}

pub struct FontSession {
    config: FontConfig,
    pipeline: TargetCssPipeline,
    state: Mutex<SessionState>,
    on_finished: Option<OnFinished>,
}

impl FontSession {
    pub fn new(config: FontConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: FontConfig) -> FontSessionBuilder {
        FontSessionBuilder::new(config)
    }

    pub fn config(&self) -> &FontConfig {
        &self.config
    }

    pub fn is_dev(&self) -> bool {
        self.config.dev
    }

    /// Font files served by the dev server, keyed by public URL.
    pub fn store(&self) -> &FontAssetStore {
        self.pipeline.store()
    }

    pub fn urls(&self) -> &FontUrlBuilder {
        self.pipeline.urls()
    }

    /// Module path relative to the root with `/` separators and no query.
    pub fn module_id(&self, id: &str) -> String {
        let path = remove_query_suffix(id);
        let relative = Path::new(path)
            .strip_prefix(&self.config.root)
            .ok()
            .filter(|_| !self.config.root.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        relative.replace('\\', "/")
    }

    fn transform_options(&self, module: &str) -> TransformOptions {
        TransformOptions::new(module)
            .with_font_loaders(self.config.font_loaders.clone())
            .with_remap_imports(self.config.remap_imports.clone())
    }

    /// Rewrite the font loader calls in a script module.
    ///
    /// `Ok(None)` for non-script ids and modules without font loader imports.
    /// In both cases anything the module imported before is retracted.
    pub fn transform(&self, id: &str, source: &str) -> Result<Option<TransformedModule>> {
        let module = self.module_id(id);
        let is_script = SCRIPT_MODULE
            .as_ref()
            .is_some_and(|regex| regex.is_match(&module));
        if !is_script {
            return Ok(None);
        }

        let transformed = transform_module(source, Path::new(&module), &self.transform_options(&module))?;
        let imports = transformed
            .as_ref()
            .map(|t| t.imports.as_slice())
            .unwrap_or_default();
        self.record_imports(&module, imports);
        Ok(transformed)
    }

    /// Replace the font imports recorded for `module`.
    ///
    /// Returns the specifiers the module no longer imports.
    fn record_imports(&self, module: &str, imports: &[String]) -> Vec<String> {
        let current: Vec<FontImportRecord> = imports
            .iter()
            .filter_map(|specifier| {
                let key = target_css_key(specifier)?;
                Some(FontImportRecord {
                    resolved: self.pipeline.contains(&key),
                    specifier: specifier.clone(),
                    key,
                })
            })
            .collect();

        let (removed, snapshot) = {
            let mut state = self.state.lock();
            let previous = state.records.remove(module).unwrap_or_default();
            let removed: Vec<FontImportRecord> = previous
                .into_iter()
                .filter(|p| !current.iter().any(|c| c.key == p.key))
                .collect();

            if current.iter().any(|record| !record.resolved) {
                state.finished = false;
            }

            if !removed.is_empty() || current.is_empty() {
                self.retract(&mut state, module, &removed, current.is_empty());
            }
            if !current.is_empty() {
                state.records.insert(module.to_string(), current);
            }
            (removed, take_completion(&mut state))
        };

        self.notify_finished(snapshot);
        removed.into_iter().map(|record| record.specifier).collect()
    }

    /// Drop the stylesheets of `removed` and everything only they referenced.
    fn retract(&self, state: &mut SessionState, module: &str, removed: &[FontImportRecord], all: bool) {
        let dropped: Vec<LoadedTargetCss> = removed
            .iter()
            .filter_map(|record| self.pipeline.remove(&record.key))
            .collect();

        if all || self.pipeline.entries_for_module(module).is_empty() {
            state.manifest.remove(module);
        } else {
            self.retract_assets(state, &dropped);
        }
        self.release_urls(&dropped);
        tracing::debug!(module, removed = removed.len(), "retracted font imports");
    }

    /// Remove assets of dropped stylesheets from their modules' manifest
    /// entries, keeping those a live stylesheet of the same module still uses.
    fn retract_assets(&self, state: &mut SessionState, dropped: &[LoadedTargetCss]) {
        for loaded in dropped {
            let live: Vec<String> = self
                .pipeline
                .entries_for_module(&loaded.module)
                .into_iter()
                .flat_map(|(_, entry)| entry.assets)
                .collect();
            let stale: Vec<String> = loaded
                .assets
                .iter()
                .filter(|asset| !live.contains(asset))
                .cloned()
                .collect();
            state.manifest.retract(&loaded.module, &stale);
        }
    }

    /// Stop serving URLs no stored stylesheet references anymore.
    fn release_urls(&self, dropped: &[LoadedTargetCss]) {
        for url in dropped.iter().flat_map(|loaded| &loaded.urls) {
            if !self.pipeline.is_url_referenced(url) {
                self.pipeline.store().remove(url);
            }
        }
    }

    fn notify_finished(&self, snapshot: Option<FontManifest>) {
        let Some(manifest) = snapshot else {
            return;
        };
        tracing::info!(modules = manifest.entries.len(), "all fonts loaded");
        if let Some(on_finished) = &self.on_finished {
            on_finished(&manifest);
        }
    }

    /// Load a virtual stylesheet.
    ///
    /// `Ok(None)` when `request.id` is not a font stylesheet. A stylesheet no
    /// recorded module imports anymore is returned but not kept.
    pub async fn load(&self, request: LoadRequest) -> Result<Option<TargetCss>> {
        let Some(key) = target_css_key(&request.id) else {
            return Ok(None);
        };
        let Some(css) = self.pipeline.load(request).await? else {
            return Ok(None);
        };
        let Some(loaded) = self.pipeline.get(&key) else {
            return Ok(Some(css));
        };

        let snapshot = {
            let mut state = self.state.lock();
            let mut matched = false;
            for record in state.records.values_mut().flatten() {
                if record.key == key {
                    record.resolved = true;
                    matched = true;
                }
            }

            if !matched {
                let dropped: Vec<LoadedTargetCss> = self.pipeline.remove(&key).into_iter().collect();
                self.release_urls(&dropped);
                tracing::debug!(id = %key, "discarded load of a retracted font import");
                return Ok(Some(css));
            }

            state.manifest.record(&loaded.module, &loaded.assets);
            take_completion(&mut state)
        };

        self.notify_finished(snapshot);
        Ok(Some(css))
    }

    /// The JavaScript module for a loaded stylesheet id.
    pub fn css_module_code(&self, id: &str) -> Option<String> {
        self.pipeline.get(id).map(|loaded| loaded.css.to_js_module())
    }

    /// The stylesheet text for a loaded id.
    pub fn css_code(&self, id: &str) -> Option<String> {
        self.pipeline.get(id).map(|loaded| loaded.css.code)
    }

    pub fn manifest(&self) -> FontManifest {
        self.state.lock().manifest.clone()
    }

    pub fn manifest_module(&self) -> String {
        render_manifest_module(&self.manifest(), self.urls())
    }

    pub fn preloadable_fonts(&self, module: &str) -> Option<Vec<String>> {
        let manifest = self.manifest();
        ManifestQuery::new(&manifest, self.urls()).preloadable_fonts(&self.module_id(module))
    }

    pub fn font_metadata(&self, module: &str) -> FontMetadata {
        let manifest = self.manifest();
        ManifestQuery::new(&manifest, self.urls()).font_metadata(&self.module_id(module))
    }

    /// Whether the completion callback has fired for the current revision.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Number of recorded font imports not loaded yet.
    pub fn pending(&self) -> usize {
        self.state.lock().pending()
    }

    /// Font imports recorded for a module.
    pub fn imports(&self, module: &str) -> Vec<FontImportRecord> {
        self.state
            .lock()
            .records
            .get(&self.module_id(module))
            .cloned()
            .unwrap_or_default()
    }

    /// Forget the loaded stylesheets of a changed module so they are loaded
    /// again. Returns their specifiers.
    pub fn invalidate_module(&self, id: &str) -> Vec<String> {
        let module = self.module_id(id);
        let mut state = self.state.lock();
        let Some(records) = state.records.get_mut(&module) else {
            return Vec::new();
        };

        let mut specifiers = Vec::new();
        let mut dropped = Vec::new();
        for record in records.iter_mut() {
            dropped.extend(self.pipeline.remove(&record.key));
            record.resolved = false;
            specifiers.push(record.specifier.clone());
        }
        if !specifiers.is_empty() {
            state.finished = false;
        }
        self.retract_assets(&mut state, &dropped);
        self.release_urls(&dropped);
        specifiers
    }

    /// Forget the stylesheets that read `font_file`. Returns their specifiers.
    ///
    /// The files emitted from the old content are retracted from the manifest
    /// and the store; loading again emits the new ones.
    pub fn invalidate_font_file(&self, font_file: &Path) -> Vec<String> {
        let keys = self.pipeline.keys_using_font_file(font_file);
        if keys.is_empty() {
            return Vec::new();
        }

        let mut state = self.state.lock();
        let dropped: Vec<LoadedTargetCss> = keys.iter().filter_map(|key| self.pipeline.remove(key)).collect();
        let mut specifiers = Vec::new();
        for record in state.records.values_mut().flatten() {
            if keys.contains(&record.key) {
                record.resolved = false;
                specifiers.push(record.specifier.clone());
            }
        }
        state.finished = false;
        self.retract_assets(&mut state, &dropped);
        self.release_urls(&dropped);
        tracing::debug!(file = %font_file.display(), stylesheets = keys.len(), "font file changed");
        specifiers
    }

    /// Retract everything a deleted module imported.
    pub fn remove_module(&self, id: &str) -> Vec<String> {
        self.record_imports(&self.module_id(id), &[])
    }

    /// Start a new revision for a full rebuild.
    ///
    /// Loader caches survive so the rebuild reuses the downloads of the
    /// previous one.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        self.pipeline.clear();
        self.pipeline.store().clear();
        state.records.clear();
        state.manifest.reset();
        state.finished = false;
    }

    /// Combined stylesheet and asset list for the ids in a bundler chunk.
    ///
    /// `None` when none of the ids is a loaded font stylesheet.
    pub fn chunk_css<I, S>(&self, ids: I) -> Option<ChunkCss>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chunk = ChunkCss::default();
        let mut codes = Vec::new();
        for id in ids {
            let Some(loaded) = self.pipeline.get(id.as_ref()) else {
                continue;
            };
            codes.push(loaded.css.code);
            for asset in loaded.assets {
                if !chunk.assets.contains(&asset) {
                    chunk.assets.push(asset);
                }
            }
        }
        if codes.is_empty() {
            return None;
        }
        chunk.css = codes.join("\n");
        Some(chunk)
    }
}

/// Builds a [`FontSession`] with its host seams.
pub struct FontSessionBuilder {
    config: FontConfig,
    reader: Arc<dyn FontFileReader>,
    host: Arc<dyn AssetEmitter>,
    google_api: Option<Arc<dyn GoogleFontsApi>>,
    catalog: Arc<GoogleFontCatalog>,
    metrics: Option<Arc<dyn FontMetricsProvider>>,
    loaders: FxHashMap<LoaderKind, LazyLoader>,
    on_finished: Option<OnFinished>,
}

impl FontSessionBuilder {
    pub fn new(config: FontConfig) -> Self {
        Self {
            config,
            reader: Arc::new(NativeFileReader),
            host: Arc::new(NoopEmitter),
            google_api: None,
            catalog: Arc::new(GoogleFontCatalog::default()),
            metrics: None,
            loaders: FxHashMap::default(),
            on_finished: None,
        }
    }

    pub fn reader(mut self, reader: Arc<dyn FontFileReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Receiver of emitted font files outside dev.
    pub fn asset_emitter(mut self, host: Arc<dyn AssetEmitter>) -> Self {
        self.host = host;
        self
    }

    pub fn google_api(mut self, api: Arc<dyn GoogleFontsApi>) -> Self {
        self.google_api = Some(api);
        self
    }

    pub fn google_catalog(mut self, catalog: Arc<GoogleFontCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn FontMetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the built-in loader of `kind`.
    pub fn loader(mut self, kind: LoaderKind, loader: LazyLoader) -> Self {
        self.loaders.insert(kind, loader);
        self
    }

    pub fn on_finished<F>(mut self, on_finished: F) -> Self
    where
        F: Fn(&FontManifest) + Send + Sync + 'static,
    {
        self.on_finished = Some(Box::new(on_finished));
        self
    }

    fn default_google_api() -> Arc<dyn GoogleFontsApi> {
        #[cfg(feature = "google-fetch")]
        {
            Arc::new(crate::loader::google::HttpGoogleFontsApi::new())
        }
        #[cfg(not(feature = "google-fetch"))]
        {
            Arc::new(crate::loader::google::OfflineGoogleFontsApi)
        }
    }

    fn google_loader(&self) -> LazyLoader {
        let api = self.google_api.clone();
        let catalog = self.catalog.clone();
        let metrics = self.metrics.clone();
        LazyLoader::new(move || {
            let api = api.clone().unwrap_or_else(Self::default_google_api);
            let mut loader = GoogleFontLoader::new(api).with_catalog(catalog.clone());
            if let Some(metrics) = &metrics {
                loader = loader.with_metrics(metrics.clone());
            }
            Arc::new(loader) as Arc<dyn FontLoader>
        })
    }

    fn local_loader(&self) -> LazyLoader {
        let metrics = self.metrics.clone();
        LazyLoader::new(move || {
            let mut loader = LocalFontLoader::new();
            if let Some(metrics) = &metrics {
                loader = loader.with_metrics(metrics.clone());
            }
            Arc::new(loader) as Arc<dyn FontLoader>
        })
    }

    pub fn build(mut self) -> FontSession {
        let google = self
            .loaders
            .remove(&LoaderKind::Google)
            .unwrap_or_else(|| self.google_loader());
        let local = self
            .loaders
            .remove(&LoaderKind::Local)
            .unwrap_or_else(|| self.local_loader());

        let pipeline = TargetCssPipeline::new(
            self.config.root.clone(),
            self.reader,
            self.host,
            FontAssetStore::new(),
            FontUrlBuilder::new(self.config.base_path.clone()),
        )
        .with_dev(self.config.dev)
        .with_generator(CssModuleGenerator::new(self.config.minify_css))
        .with_loader(LoaderKind::Google, google)
        .with_loader(LoaderKind::Local, local);

        FontSession {
            config: self.config,
            pipeline,
            state: Mutex::new(SessionState::default()),
            on_finished: self.on_finished,
        }
    }
}
