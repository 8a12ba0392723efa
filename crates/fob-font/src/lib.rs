//! Self-hosted web fonts for fob
//!
//! Font loader calls such as
//!
//! ```js
//! import { Inter } from "next/font/google";
//! const inter = Inter({ subsets: ["latin"] });
//! ```
//!
//! are rewritten into imports of virtual `target.css` stylesheets. Loading such
//! a stylesheet runs the matching loader, downloads or reads the font files,
//! emits them as build assets and returns a scoped CSS module. A manifest keeps
//! track of which files each module should preload.
//!
//! # Example
//!
//! ```rust
//! use fob_font::{FontConfig, FontSession};
//!
//! let session = FontSession::new(FontConfig::new("/project"));
//! let module = session.transform(
//!     "app/page.tsx",
//!     "import { Inter } from 'next/font/google';\nconst inter = Inter({ subsets: ['latin'] });\n",
//! )?;
//!
//! let module = module.expect("module imports a font loader");
//! assert!(module.imports[0].starts_with("next-font/google/target.css?"));
//! assert_eq!(session.pending(), 1);
//! # Ok::<(), fob_font::FontError>(())
//! ```

pub mod assets;
pub mod config;
pub mod css_module;
mod error;
pub mod host;
pub mod lazy;
pub mod loader;
pub mod manifest;
pub mod pipeline;
pub mod session;
pub mod transform;
pub mod virtual_id;

#[cfg(feature = "logging")]
pub mod logging;

pub use assets::{FontAssetStore, FontUrlBuilder, StoredFont};
pub use config::FontConfig;
pub use css_module::{CssModuleGenerator, TargetCss};
pub use error::{FontError, LoaderError, Result, TransformError};
pub use host::{AssetEmitter, EmittedAsset, FontFileReader, NativeFileReader, NoopEmitter};
pub use lazy::LazyLoader;
pub use loader::{
    AdjustFontFallback, FontLoader, FontLoaderOutput, GoogleFontLoader, LoaderContext, LoaderKind,
    LocalFontLoader,
};
pub use manifest::{FontManifest, FontMetadata, ManifestQuery};
pub use pipeline::{LoadRequest, TargetCssPipeline};
pub use session::{ChunkCss, FontSession, FontSessionBuilder};
pub use transform::{TransformOptions, TransformedModule, transform_module};
pub use virtual_id::{FontImportQuery, VirtualCssId};
