//! Session configuration loaded from defaults, a config file and the environment.
//!
//! Priority: environment (`FOB_FONT_*`) > `fob-font.json` / `fob-font.toml` > defaults

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{FontError, Result};
use crate::loader::LoaderKind;
use crate::transform::default_remap_imports;

/// Config file names looked up in the project root, in merge order.
pub const CONFIG_FILES: [&str; 2] = ["fob-font.toml", "fob-font.json"];

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "FOB_FONT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FontConfig {
    /// Project root; calling module paths are relative to it
    #[serde(default)]
    pub root: PathBuf,

    /// Prefix of public asset URLs, e.g. `/assets` or `https://cdn.example.com`
    #[serde(default)]
    pub base_path: String,

    /// Dev server mode: font files are served from memory instead of emitted
    #[serde(default)]
    pub dev: bool,

    /// Import sources rewritten before matching against `font_loaders`
    #[serde(default = "default_remap_imports")]
    pub remap_imports: BTreeMap<String, String>,

    /// Loader modules whose imports are rewritten
    #[serde(default = "default_font_loaders")]
    pub font_loaders: Vec<String>,

    /// Minify generated font stylesheets
    #[serde(default)]
    pub minify_css: bool,

    /// Log level used by `init_logging` when the `logging` feature is enabled
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_font_loaders() -> Vec<String> {
    LoaderKind::ALL
        .iter()
        .map(|kind| kind.module().to_string())
        .collect()
}

/// `base_path` -> `basePath`
fn env_key_to_field(key: &str) -> String {
    let mut field = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        match c {
            '_' => upper = true,
            c if upper => {
                field.extend(c.to_uppercase());
                upper = false;
            }
            c => field.extend(c.to_lowercase()),
        }
    }
    field
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            base_path: String::new(),
            dev: false,
            remap_imports: default_remap_imports(),
            font_loaders: default_font_loaders(),
            minify_css: false,
            log_level: default_log_level(),
        }
    }
}

impl FontConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_minify_css(mut self, minify_css: bool) -> Self {
        self.minify_css = minify_css;
        self
    }

    /// The sources merged by [`FontConfig::load`], without the environment.
    pub fn file_figment(root: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::new(root)));
        for name in CONFIG_FILES {
            let path = root.join(name);
            if !path.exists() {
                continue;
            }
            figment = if name.ends_with(".toml") {
                figment.merge(Toml::file(path))
            } else {
                figment.merge(Json::file(path))
            };
        }
        figment
    }

    /// Load configuration for the project at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let env = Env::prefixed(ENV_PREFIX).map(|key| env_key_to_field(key.as_str()).into());
        Self::extract(Self::file_figment(root).merge(env))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| FontError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.font_loaders.is_empty() {
            return Err(FontError::Config(
                "fontLoaders must name at least one loader module".to_string(),
            ));
        }
        if !self.base_path.is_empty()
            && !self.base_path.starts_with('/')
            && !self.base_path.contains("://")
        {
            return Err(FontError::Config(format!(
                "basePath `{}` must start with `/` or be an absolute URL",
                self.base_path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let config = FontConfig::extract(FontConfig::file_figment(dir.path())).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.base_path, "");
        assert!(!config.dev);
        assert_eq!(config.font_loaders, vec!["next-font/google", "next-font/local"]);
        assert_eq!(
            config.remap_imports.get("next/font/google").map(String::as_str),
            Some("next-font/google")
        );
    }

    #[test]
    fn test_json_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("fob-font.json"),
            r#"{ "basePath": "/assets", "minifyCss": true }"#,
        )
        .unwrap();

        let config = FontConfig::extract(FontConfig::file_figment(dir.path())).unwrap();
        assert_eq!(config.base_path, "/assets");
        assert!(config.minify_css);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_json_overrides_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fob-font.toml"), "basePath = \"/toml\"\ndev = true\n").unwrap();
        std::fs::write(dir.path().join("fob-font.json"), r#"{ "basePath": "/json" }"#).unwrap();

        let config = FontConfig::extract(FontConfig::file_figment(dir.path())).unwrap();
        assert_eq!(config.base_path, "/json");
        assert!(config.dev);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fob-font.json"), r#"{ "preload": false }"#).unwrap();

        let err = FontConfig::extract(FontConfig::file_figment(dir.path())).unwrap_err();
        assert!(matches!(err, FontError::Config(_)));
    }

    #[test]
    fn test_env_key_to_field() {
        assert_eq!(env_key_to_field("base_path"), "basePath");
        assert_eq!(env_key_to_field("MINIFY_CSS"), "minifyCss");
        assert_eq!(env_key_to_field("dev"), "dev");
    }

    #[test]
    fn test_validate() {
        assert!(FontConfig::default().validate().is_ok());
        assert!(FontConfig::default().with_base_path("https://cdn.example.com").validate().is_ok());
        assert!(FontConfig::default().with_base_path("assets").validate().is_err());
        assert!(FontConfig {
            font_loaders: vec![],
            ..FontConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let value = serde_json::to_value(FontConfig::default()).unwrap();
        assert!(value.get("basePath").is_some());
        assert!(value.get("remapImports").is_some());
        assert!(value.get("base_path").is_none());
    }
}
