//! Build and dev flows through a whole font session.

use async_trait::async_trait;
use fob_font::host::{CollectingEmitter, MemoryFileReader};
use fob_font::loader::google::GoogleFontsApi;
use fob_font::{FontConfig, FontSession, LoadRequest, LoaderError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves a one-subset stylesheet per family and echoes font URLs as content.
#[derive(Default)]
struct FakeGoogleFonts {
    css_requests: AtomicUsize,
    offline: bool,
}

#[async_trait]
impl GoogleFontsApi for FakeGoogleFonts {
    async fn fetch_css(&self, _url: &str, family: &str, _is_dev: bool) -> Result<String, LoaderError> {
        self.css_requests.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(LoaderError::fetch_failed("network unreachable"));
        }
        let slug = family.to_lowercase().replace(' ', "-");
        Ok(format!(
            "/* latin */\n@font-face {{\n  font-family: '{family}';\n  font-style: normal;\n  font-weight: 400;\n  font-display: swap;\n  src: url(https://fonts.gstatic.com/s/{slug}/latin.woff2) format('woff2');\n}}\n"
        ))
    }

    async fn fetch_font_file(&self, url: &str, _is_dev: bool) -> Result<Vec<u8>, LoaderError> {
        Ok(url.as_bytes().to_vec())
    }
}

const TWO_FONTS: &str = r#"import { Inter, Lora } from "next/font/google";
const inter = Inter({ weight: "400", subsets: ["latin"] });
const lora = Lora({ weight: "400", subsets: ["latin"] });
export default function Page() { return [inter.className, lora.className]; }
"#;

const ONE_FONT: &str = r#"import { Inter } from "next/font/google";
const inter = Inter({ weight: "400", subsets: ["latin"] });
export default function Page() { return inter.className; }
"#;

const LOCAL_FONT: &str = r#"import localFont from "next/font/local";
const brand = localFont({ src: "./brand.woff2", preload: false });
export default function Layout() { return brand.className; }
"#;

fn reader() -> Arc<MemoryFileReader> {
    Arc::new(MemoryFileReader::new().with_file("/project/app/brand.woff2", b"brand".to_vec()))
}

async fn load_all(session: &FontSession, imports: &[String]) {
    for id in imports {
        session.load(LoadRequest::new(id)).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_production_build() {
    let api = Arc::new(FakeGoogleFonts::default());
    let host = Arc::new(CollectingEmitter::new());
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = finished.clone();
    let session = FontSession::builder(FontConfig::new("/project").with_base_path("/assets"))
        .google_api(api.clone())
        .reader(reader())
        .asset_emitter(host.clone())
        .on_finished(move |manifest| {
            assert_eq!(manifest.entries.len(), 2);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let page = session.transform("/project/app/page.tsx", TWO_FONTS).unwrap().unwrap();
    let layout = session.transform("/project/app/layout.tsx", LOCAL_FONT).unwrap().unwrap();
    assert_eq!(session.pending(), 3);

    load_all(&session, &page.imports).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    load_all(&session, &layout.imports).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    let emitted = host.file_names();
    assert_eq!(emitted.len(), 3);
    assert!(emitted.iter().all(|name| name.starts_with("static/media/")));

    let manifest = session.manifest();
    assert!(manifest.is_using_size_adjust);
    assert_eq!(manifest.get("app/page.tsx").map(<[String]>::len), Some(2));
    assert_eq!(manifest.get("app/layout.tsx").map(<[String]>::len), Some(0));

    let preload = session.preloadable_fonts("app/page.tsx").unwrap();
    assert!(preload.iter().all(|url| url.starts_with("/assets/_next/static/media/") && url.ends_with(".p.woff2")));

    let metadata = session.font_metadata("app/layout.tsx");
    assert!(metadata.preload.is_empty());
    assert_eq!(metadata.preconnect[0].href, "/");
    assert_eq!(session.font_metadata("app/page.tsx").preload[0].content_type, "font/woff2");

    let module = session.manifest_module();
    assert!(module.contains("\"isUsingSizeAdjust\": true"));
    assert!(module.contains("\"/assets/_next/\""));
}

#[tokio::test]
async fn test_downloads_are_reused_by_next_build_once() {
    let api = Arc::new(FakeGoogleFonts::default());
    let session = FontSession::builder(FontConfig::new("/project"))
        .google_api(api.clone())
        .build();

    for _ in 0..3 {
        session.reset();
        let page = session.transform("app/page.tsx", ONE_FONT).unwrap().unwrap();
        load_all(&session, &page.imports).await;
    }

    // fetch, reuse, fetch
    assert_eq!(api.css_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dev_retransform_retracts_removed_font() {
    let session = FontSession::builder(FontConfig::new("/project").with_dev(true))
        .google_api(Arc::new(FakeGoogleFonts::default()))
        .build();

    let before = session.transform("app/page.tsx", TWO_FONTS).unwrap().unwrap();
    load_all(&session, &before.imports).await;
    assert_eq!(session.store().len(), 2);
    assert_eq!(session.preloadable_fonts("app/page.tsx").map(|f| f.len()), Some(2));

    let after = session.transform("app/page.tsx", ONE_FONT).unwrap().unwrap();
    assert_eq!(after.imports, before.imports[..1]);

    let lora = &before.imports[1];
    assert!(session.css_module_code(lora).is_none());
    assert_eq!(session.store().len(), 1);
    assert!(session.store().urls()[0].ends_with(".p.woff2"));
    assert_eq!(session.preloadable_fonts("app/page.tsx").map(|f| f.len()), Some(1));
    assert!(session.is_finished());
}

#[tokio::test]
async fn test_dev_new_font_reopens_revision() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = finished.clone();
    let session = FontSession::builder(FontConfig::new("/project").with_dev(true))
        .google_api(Arc::new(FakeGoogleFonts::default()))
        .on_finished(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let first = session.transform("app/page.tsx", ONE_FONT).unwrap().unwrap();
    load_all(&session, &first.imports).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    let second = session.transform("app/page.tsx", TWO_FONTS).unwrap().unwrap();
    assert!(!session.is_finished());
    assert_eq!(session.pending(), 1);

    load_all(&session, &second.imports).await;
    assert!(session.is_finished());
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dev_download_failure_uses_fallback() {
    let session = FontSession::builder(FontConfig::new("/project").with_dev(true))
        .google_api(Arc::new(FakeGoogleFonts {
            offline: true,
            ..Default::default()
        }))
        .build();

    let page = session.transform("app/page.tsx", ONE_FONT).unwrap().unwrap();
    let css = session
        .load(LoadRequest::new(&page.imports[0]).with_environment("ssr").with_server(true))
        .await
        .unwrap()
        .unwrap();

    assert!(css.code.contains("src: local(\"Arial\")"));
    assert!(session.store().is_empty());
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn test_production_download_failure_is_an_error() {
    let session = FontSession::builder(FontConfig::new("/project"))
        .google_api(Arc::new(FakeGoogleFonts {
            offline: true,
            ..Default::default()
        }))
        .build();

    let page = session.transform("app/page.tsx", ONE_FONT).unwrap().unwrap();
    let err = session.load(LoadRequest::new(&page.imports[0])).await.unwrap_err();
    assert!(err.to_string().contains("Failed to fetch `Inter` from Google Fonts."));
    assert_eq!(session.pending(), 1);
}
