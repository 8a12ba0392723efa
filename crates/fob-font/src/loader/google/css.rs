//! Scanning of the stylesheet Google Fonts returns.

use regex::Regex;
use std::sync::LazyLock;

static SUBSET_COMMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/\* (.+?) \*/").ok());

static SRC_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"src: url\((.+?)\)").ok());

static FONT_EXTENSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\.(woff|woff2|eot|ttf|otf)$").ok());

/// First capture group of `regex` in `haystack`.
fn capture<'h>(regex: &Option<Regex>, haystack: &'h str) -> Option<&'h str> {
    let regex = regex.as_ref()?;
    regex
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// A font file referenced by the stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleFontFile {
    pub google_font_file_url: String,
    pub preload_font_file: bool,
}

/// Drop everything from the first `body {` on; Google sometimes appends
/// custom properties on `body` that do not belong in a CSS module.
pub fn strip_body_rules(css: &str) -> &str {
    css.split_once("body {").map_or(css, |(head, _)| head)
}

/// Collect the distinct font file URLs in `css`.
///
/// Each `@font-face` is preceded by a `/* <subset> */` comment. Files of the
/// subsets in `subsets_to_preload` are marked for preloading.
pub fn find_font_files_in_css(css: &str, subsets_to_preload: Option<&[String]>) -> Vec<GoogleFontFile> {
    let mut files: Vec<GoogleFontFile> = Vec::new();
    let mut current_subset = "";

    for line in css.lines() {
        if let Some(subset) = capture(&SUBSET_COMMENT, line) {
            current_subset = subset;
            continue;
        }
        let Some(url) = capture(&SRC_URL, line) else {
            continue;
        };
        if files.iter().any(|file| file.google_font_file_url == url) {
            continue;
        }
        files.push(GoogleFontFile {
            google_font_file_url: url.to_string(),
            preload_font_file: subsets_to_preload
                .is_some_and(|subsets| subsets.iter().any(|s| s == current_subset)),
        });
    }

    files
}

/// Extension of a font file URL, if it is one of the supported formats.
pub fn font_extension(url: &str) -> Option<&str> {
    capture(&FONT_EXTENSION, url)
}
