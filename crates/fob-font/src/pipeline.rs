//! Resolution of virtual `target.css` ids into CSS modules.
//!
//! Loading an id decodes its query, runs the matching loader and turns the
//! loader output into a scoped CSS module. Results are kept per normalized id
//! so repeated requests in dev are served without running the loader again.

use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::assets::{FontAssetStore, FontUrlBuilder, SessionEmitter};
use crate::css_module::{CssModuleGenerator, TargetCss};
use crate::error::{FontError, Result};
use crate::host::{AssetEmitter, FontFileReader};
use crate::lazy::LazyLoader;
use crate::loader::{LoaderCache, LoaderContext, LoaderKind};
use crate::virtual_id::{FontImportQuery, get_query_suffix, normalize_target_css_id, remove_query_suffix};

static CSS_REQUEST: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\.css(?:$|\?)").ok());

fn is_css_request(id: &str) -> bool {
    CSS_REQUEST.as_ref().is_some_and(|regex| regex.is_match(id))
}

/// Key under which the result for `id` is stored.
///
/// Resolved and bare forms of the same stylesheet map to the same key:
/// `<loader>/target.css?path=..&import=..&arguments=..&variableName=..`.
/// Returns `None` for ids that are not a loader stylesheet.
pub fn target_css_key(id: &str) -> Option<String> {
    if !is_css_request(id) {
        return None;
    }
    let kind = LoaderKind::from_target_path(remove_query_suffix(id))?;
    Some(normalize_target_css_id(&format!(
        "{}{}",
        kind.target_css(),
        get_query_suffix(id)
    )))
}

/// A request to load a virtual stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub id: String,
    /// Name of the bundler environment issuing the request, e.g. `client` or `ssr`
    pub environment: String,
    pub is_server: bool,
}

impl LoadRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environment: "client".to_string(),
            is_server: false,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_server(mut self, is_server: bool) -> Self {
        self.is_server = is_server;
        self
    }
}

/// A loaded stylesheet together with what produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTargetCss {
    pub css: TargetCss,
    /// Calling module, relative to the root
    pub module: String,
    /// Asset names emitted while loading, e.g. `static/media/<hash>.p.woff2`
    pub assets: Vec<String>,
    /// Public URLs of those assets
    pub urls: Vec<String>,
    /// Local font files the loader read
    pub font_files: Vec<PathBuf>,
    /// Non-fatal errors the loader reported
    pub errors: Vec<String>,
}

struct LoaderSlot {
    loader: LazyLoader,
    cache: LoaderCache,
}

#[derive(Default)]
struct PipelineState {
    target_css: FxHashMap<String, LoadedTargetCss>,
    /// `(key, environment)` pairs served in dev
    environments: FxHashSet<(String, String)>,
}

/// Loads virtual stylesheets and keeps the results.
pub struct TargetCssPipeline {
    root: PathBuf,
    is_dev: bool,
    loaders: FxHashMap<LoaderKind, LoaderSlot>,
    generator: CssModuleGenerator,
    reader: Arc<dyn FontFileReader>,
    host: Arc<dyn AssetEmitter>,
    store: FontAssetStore,
    urls: FontUrlBuilder,
    state: Mutex<PipelineState>,
}

impl TargetCssPipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        reader: Arc<dyn FontFileReader>,
        host: Arc<dyn AssetEmitter>,
        store: FontAssetStore,
        urls: FontUrlBuilder,
    ) -> Self {
        Self {
            root: root.into(),
            is_dev: false,
            loaders: FxHashMap::default(),
            generator: CssModuleGenerator::default(),
            reader,
            host,
            store,
            urls,
            state: Mutex::new(PipelineState::default()),
        }
    }

    pub fn with_dev(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    pub fn with_generator(mut self, generator: CssModuleGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Register the loader serving `kind`. Each kind gets its own cache.
    pub fn with_loader(mut self, kind: LoaderKind, loader: LazyLoader) -> Self {
        self.loaders.insert(
            kind,
            LoaderSlot {
                loader,
                cache: LoaderCache::default(),
            },
        );
        self
    }

    pub fn is_dev(&self) -> bool {
        self.is_dev
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &FontAssetStore {
        &self.store
    }

    pub fn urls(&self) -> &FontUrlBuilder {
        &self.urls
    }

    /// The loader cache of `kind`, if a loader is registered for it.
    pub fn cache(&self, kind: LoaderKind) -> Option<&LoaderCache> {
        self.loaders.get(&kind).map(|slot| &slot.cache)
    }

    /// Load the stylesheet `request.id` refers to.
    ///
    /// `Ok(None)` when the id is not a stylesheet of a registered loader.
    pub async fn load(&self, request: LoadRequest) -> Result<Option<TargetCss>> {
        let Some(key) = target_css_key(&request.id) else {
            return Ok(None);
        };
        let Some(kind) = LoaderKind::from_target_path(remove_query_suffix(&request.id)) else {
            return Ok(None);
        };
        let Some(slot) = self.loaders.get(&kind) else {
            return Ok(None);
        };

        {
            let state = self.state.lock();
            let seen = state
                .environments
                .contains(&(key.clone(), request.environment.clone()));
            if self.is_dev && seen {
                if let Some(loaded) = state.target_css.get(&key) {
                    tracing::debug!(id = %key, environment = %request.environment, "target css already loaded");
                    return Ok(Some(loaded.css.clone()));
                }
            }
        }

        let query = FontImportQuery::parse(get_query_suffix(&request.id))
            .ok_or_else(|| FontError::invalid_query(&request.id, "missing query fields"))?;
        let arguments: Vec<Value> = serde_json::from_str(&query.arguments)
            .map_err(|e| FontError::invalid_query(&request.id, format!("arguments: {}", e)))?;

        let emitter = SessionEmitter::new(&self.store, &self.urls, self.host.as_ref(), self.is_dev);
        let calling_module = self.root.join(&query.path);
        let ctx = LoaderContext::new(
            &query.import,
            &query.variable_name,
            &arguments,
            &slot.cache,
            self.reader.as_ref(),
            &emitter,
            &calling_module,
        )
        .with_dev(self.is_dev)
        .with_server(request.is_server);

        let loader = slot.loader.get().await;
        let output = loader
            .load(&ctx)
            .await
            .map_err(|e| FontError::loader(&request.id, e))?;

        let errors = ctx.take_errors();
        for error in &errors {
            tracing::error!(module = %query.path, "{}", error);
        }

        let css = self
            .generator
            .generate(&query.path, &output)
            .map_err(|e| FontError::loader(&request.id, e))?;

        let assets = emitter.emitted();
        let urls = assets.iter().map(|name| self.urls.url(name)).collect();
        tracing::debug!(id = %key, assets = assets.len(), "loaded target css");

        let mut state = self.state.lock();
        state.environments.insert((key.clone(), request.environment.clone()));
        state.target_css.insert(
            key,
            LoadedTargetCss {
                css: css.clone(),
                module: query.path.clone(),
                assets,
                urls,
                font_files: ctx.resolved_files(),
                errors,
            },
        );
        Ok(Some(css))
    }

    /// The stored result for `id` (bare, resolved or normalized).
    pub fn get(&self, id: &str) -> Option<LoadedTargetCss> {
        let key = target_css_key(id)?;
        self.state.lock().target_css.get(&key).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        target_css_key(id).is_some_and(|key| self.state.lock().target_css.contains_key(&key))
    }

    /// Drop the stored result for `id` so the next load runs the loader.
    pub fn remove(&self, id: &str) -> Option<LoadedTargetCss> {
        let key = target_css_key(id)?;
        let mut state = self.state.lock();
        state.environments.retain(|(k, _)| *k != key);
        state.target_css.remove(&key)
    }

    /// Stored results whose calling module is `module`.
    pub fn entries_for_module(&self, module: &str) -> Vec<(String, LoadedTargetCss)> {
        let mut entries: Vec<_> = self
            .state
            .lock()
            .target_css
            .iter()
            .filter(|(_, loaded)| loaded.module == module)
            .map(|(key, loaded)| (key.clone(), loaded.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Keys of the results that read `font_file`.
    pub fn keys_using_font_file(&self, font_file: &Path) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .lock()
            .target_css
            .iter()
            .filter(|(_, loaded)| loaded.font_files.iter().any(|f| f == font_file))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Whether any stored result references the public URL `url`.
    pub fn is_url_referenced(&self, url: &str) -> bool {
        self.state
            .lock()
            .target_css
            .values()
            .any(|loaded| loaded.urls.iter().any(|u| u == url))
    }

    pub fn len(&self) -> usize {
        self.state.lock().target_css.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().target_css.is_empty()
    }

    /// Forget every result and the environments that requested them.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.target_css.clear();
        state.environments.clear();
    }
}
