//! The font manifest: which emitted font files each module should preload.
//!
//! The manifest is keyed by the path of the module that calls a font loader.
//! An entry exists as soon as the module emitted any font file, even when none
//! of them is marked for preloading. Renderers use an empty entry to emit a
//! preconnect hint instead of preload links.

use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::assets::FontUrlBuilder;

static PRELOADABLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\.p\.(woff|woff2|eot|ttf|otf)$").ok());

/// Whether an emitted asset name is marked for preloading (`.p.<ext>`).
pub fn is_preloadable(asset: &str) -> bool {
    PRELOADABLE
        .as_ref()
        .is_some_and(|regex| regex.is_match(asset))
}

static SIZE_ADJUSTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-s(?:\.p)?\.(?:woff|woff2|eot|ttf|otf)$").ok());

/// Whether an emitted asset belongs to a font with a size-adjusted fallback
/// (`-s.<ext>` or `-s.p.<ext>`).
pub fn is_size_adjusted(asset: &str) -> bool {
    SIZE_ADJUSTED
        .as_ref()
        .is_some_and(|regex| regex.is_match(asset))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontManifest {
    pub is_using_size_adjust: bool,
    pub entries: BTreeMap<String, Vec<String>>,
}

impl FontManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the assets a module emitted.
    ///
    /// Only preloadable assets are listed, but the entry is created for any
    /// non-empty `assets`.
    pub fn record(&mut self, path: &str, assets: &[String]) {
        if !self.is_using_size_adjust {
            self.is_using_size_adjust = assets.iter().any(|a| is_size_adjusted(a));
        }
        if assets.is_empty() {
            return;
        }

        let entry = self.entries.entry(path.to_string()).or_default();
        for asset in assets.iter().filter(|a| is_preloadable(a)) {
            if !entry.contains(asset) {
                entry.push(asset.clone());
            }
        }
    }

    /// Remove assets from a module's entry. Unknown assets are ignored.
    pub fn retract(&mut self, path: &str, assets: &[String]) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.retain(|asset| !assets.contains(asset));
        }
    }

    /// Drop a module's entry.
    pub fn remove(&mut self, path: &str) -> Option<Vec<String>> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Start a new revision: clears every entry and the size-adjust flag.
    pub fn reset(&mut self) {
        self.is_using_size_adjust = false;
        self.entries.clear();
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for FontManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + 1))?;
        for (path, assets) in &self.entries {
            map.serialize_entry(path, assets)?;
        }
        map.serialize_entry("isUsingSizeAdjust", &self.is_using_size_adjust)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadLink {
    pub href: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreconnectLink {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<String>,
}

/// Link hints for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FontMetadata {
    pub preload: Vec<PreloadLink>,
    pub preconnect: Vec<PreconnectLink>,
}

/// Read-side view of a manifest snapshot.
pub struct ManifestQuery<'m> {
    manifest: &'m FontManifest,
    urls: &'m FontUrlBuilder,
}

impl<'m> ManifestQuery<'m> {
    pub fn new(manifest: &'m FontManifest, urls: &'m FontUrlBuilder) -> Self {
        Self { manifest, urls }
    }

    /// Public URLs of the fonts `path` should preload, sorted.
    ///
    /// `None` when the module uses no fonts, an empty list when it uses fonts
    /// but none is marked for preloading.
    pub fn preloadable_fonts(&self, path: &str) -> Option<Vec<String>> {
        let assets = self.manifest.get(path)?;
        let mut urls: Vec<String> = assets.iter().map(|a| self.urls.url(a)).collect();
        urls.sort();
        urls.dedup();
        Some(urls)
    }

    pub fn font_metadata(&self, path: &str) -> FontMetadata {
        let mut metadata = FontMetadata::default();
        let Some(fonts) = self.preloadable_fonts(path) else {
            return metadata;
        };

        if fonts.is_empty() {
            metadata.preconnect.push(match url_origin(self.urls.base_path()) {
                Some(origin) => PreconnectLink {
                    href: origin.to_string(),
                    cross_origin: None,
                },
                None => PreconnectLink {
                    href: "/".to_string(),
                    cross_origin: Some(String::new()),
                },
            });
            return metadata;
        }

        for font in fonts {
            let Some(ext) = font_extension(&font) else {
                continue;
            };
            metadata.preload.push(PreloadLink {
                href: encode_uri_path(&font),
                content_type: format!("font/{}", ext),
            });
        }
        metadata
    }
}

fn font_extension(url: &str) -> Option<&str> {
    let (_, ext) = url.rsplit_once('.')?;
    matches!(ext, "woff" | "woff2" | "eot" | "ttf" | "otf").then_some(ext)
}

/// `scheme://host[:port]` of an absolute URL.
pub fn url_origin(base: &str) -> Option<&str> {
    let (scheme, rest) = base.split_once("://")?;
    if scheme.is_empty() || rest.is_empty() {
        return None;
    }
    let end = rest.find('/').unwrap_or(rest.len());
    Some(&base[..scheme.len() + 3 + end])
}

/// Percent-encode each path segment, leaving any origin untouched.
pub fn encode_uri_path(url: &str) -> String {
    let (prefix, path) = match url_origin(url) {
        Some(origin) => (origin, &url[origin.len()..]),
        None => ("", url),
    };
    let encoded = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}{}", prefix, encoded)
}

/// Render the runtime module that exposes the manifest to server code.
///
/// Exports `manifest`, `getPreloadableFonts(filePath)` and
/// `getFontMetadata(filePath)`.
pub fn render_manifest_module(manifest: &FontManifest, urls: &FontUrlBuilder) -> String {
    let prefix = serde_json::to_string(&urls.url("")).unwrap_or_else(|_| "\"/_next/\"".into());
    let preconnect = match url_origin(urls.base_path()) {
        Some(origin) => format!("{{ href: {:?} }}", origin),
        None => "{ href: \"/\", crossOrigin: \"\" }".to_string(),
    };

    format!(
        r#"function encodeURIPath(file) {{
  const origin = /^[a-z][a-z0-9+.-]*:\/\/[^/]*/i.exec(file);
  const prefix = origin ? origin[0] : "";
  return prefix + file.slice(prefix.length).split("/").map((p) => encodeURIComponent(p)).join("/");
}}
const __FONT_MANIFEST__ = {manifest};
const __FONT_URL_PREFIX__ = {prefix};
export const manifest = Object.freeze(__FONT_MANIFEST__);
export const getPreloadableFonts = (filePath) => {{
  if (!filePath || !Object.prototype.hasOwnProperty.call(manifest, filePath)) return null;
  const files = manifest[filePath];
  if (!Array.isArray(files)) return null;
  return [...new Set(files.map((file) => __FONT_URL_PREFIX__ + file))].sort();
}};
export const getFontMetadata = (filePath) => {{
  const metadata = {{ preload: [], preconnect: [] }};
  const fonts = getPreloadableFonts(filePath);
  if (!fonts) return metadata;
  if (fonts.length === 0) {{
    metadata.preconnect.push({preconnect});
    return metadata;
  }}
  for (const font of fonts) {{
    const ext = /\.(woff|woff2|eot|ttf|otf)$/.exec(font);
    if (ext) metadata.preload.push({{ href: encodeURIPath(font), type: `font/${{ext[1]}}` }});
  }}
  return metadata;
}};
export default {{ manifest, getPreloadableFonts, getFontMetadata }};
"#,
        manifest = manifest.to_json(),
        prefix = prefix,
        preconnect = preconnect,
    )
}
