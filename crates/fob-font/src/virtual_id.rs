//! Encoding of the virtual CSS ids that carry a font call to the loader.
//!
//! A font call `const inter = Inter({ subsets: ['latin'] })` in `app/page.tsx`
//! becomes an import of
//!
//! ```text
//! next-font/google/target.css?path=app%2Fpage.tsx&import=Inter&arguments=%5B...%5D&variableName=inter
//! ```
//!
//! The load step decodes the query again and never needs the original source.

use std::fmt;
use url::form_urlencoded;

/// File name appended to the loader module to form the virtual stylesheet.
pub const TARGET_CSS: &str = "target.css";

const PATH_KEY: &str = "path";
const IMPORT_KEY: &str = "import";
const ARGUMENTS_KEY: &str = "arguments";
const VARIABLE_NAME_KEY: &str = "variableName";

/// Semantic query keys, in rendering order.
const FIELD_KEYS: [&str; 4] = [PATH_KEY, IMPORT_KEY, ARGUMENTS_KEY, VARIABLE_NAME_KEY];

/// The semantically relevant query fields of a virtual CSS id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FontImportQuery {
    /// Calling module, relative to the project root
    pub path: String,
    /// Exported loader function name, empty for default imports
    pub import: String,
    /// JSON-serialised argument array
    pub arguments: String,
    /// Name of the const the call was assigned to
    pub variable_name: String,
}

impl FontImportQuery {
    fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (PATH_KEY, self.path.as_str()),
            (IMPORT_KEY, self.import.as_str()),
            (ARGUMENTS_KEY, self.arguments.as_str()),
            (VARIABLE_NAME_KEY, self.variable_name.as_str()),
        ]
    }

    /// Render as a query string (without the leading `?`).
    pub fn to_query_string(&self) -> String {
        self.pairs()
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse a query string, keeping the four known fields.
    ///
    /// Returns `None` when a field is missing. The first occurrence of a
    /// repeated key wins.
    pub fn parse(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut fields: [Option<String>; 4] = Default::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let Some(index) = FIELD_KEYS.iter().position(|wanted| key == *wanted) else {
                continue;
            };
            if fields[index].is_none() {
                fields[index] = Some(value.into_owned());
            }
        }

        let [path, import, arguments, variable_name] = fields;
        Some(Self {
            path: path?,
            import: import?,
            arguments: arguments?,
            variable_name: variable_name?,
        })
    }
}

/// A virtual stylesheet import produced for one font loader call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualCssId {
    /// Loader module after remapping, e.g. `next-font/google`
    pub loader: String,
    pub query: FontImportQuery,
}

impl VirtualCssId {
    pub fn new(loader: impl Into<String>, query: FontImportQuery) -> Self {
        Self {
            loader: loader.into(),
            query,
        }
    }

    /// Path part of the id: the loader module joined with `target.css`.
    pub fn target_path(&self) -> String {
        posix_join(&self.loader, TARGET_CSS)
    }

    /// Parse an id produced by [`VirtualCssId::to_string`] or a resolved form
    /// of it. Anything that lost its query fields yields `None`.
    pub fn parse(id: &str) -> Option<Self> {
        let path = remove_query_suffix(id);
        let loader = path
            .strip_suffix(TARGET_CSS)
            .map(|dir| dir.trim_end_matches('/'))?;
        let query = FontImportQuery::parse(get_query_suffix(id))?;
        Some(Self::new(loader, query))
    }
}

impl fmt::Display for VirtualCssId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.target_path(), self.query.to_query_string())
    }
}

/// The query part of an id including the leading `?`, or an empty string.
pub fn get_query_suffix(id: &str) -> &str {
    id.find('?').map_or("", |start| &id[start..])
}

/// The id without its query part.
pub fn remove_query_suffix(id: &str) -> &str {
    id.find('?').map_or(id, |start| &id[..start])
}

/// Reduce an id to its cache key: the path plus the four semantic query
/// fields in a fixed order. Incidental parameters a bundler appends (and their
/// position) do not change the key.
///
/// Ids without the full set of fields keep only the fields present, still in
/// the fixed order.
pub fn normalize_target_css_id(id: &str) -> String {
    let path = remove_query_suffix(id);
    let query = get_query_suffix(id).trim_start_matches('?');
    let pairs: Vec<_> = form_urlencoded::parse(query.as_bytes()).collect();

    let kept: Vec<String> = FIELD_KEYS
        .iter()
        .filter_map(|wanted| {
            let (_, value) = pairs.iter().find(|(key, _)| key == wanted)?;
            Some(format!("{}={}", wanted, urlencoding::encode(value)))
        })
        .collect();

    if kept.is_empty() {
        return path.to_string();
    }
    format!("{}?{}", path, kept.join("&"))
}

/// Join two posix path segments, collapsing duplicate separators.
pub fn posix_join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        return segment.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_query() -> FontImportQuery {
        FontImportQuery {
            path: "app/page.tsx".to_string(),
            import: "Inter".to_string(),
            arguments: r#"[{"subsets":["latin"]}]"#.to_string(),
            variable_name: "inter".to_string(),
        }
    }

    #[test]
    fn test_display_encodes_every_field() {
        let id = VirtualCssId::new("next-font/google", sample_query());
        assert_eq!(
            id.to_string(),
            "next-font/google/target.css?path=app%2Fpage.tsx&import=Inter\
             &arguments=%5B%7B%22subsets%22%3A%5B%22latin%22%5D%7D%5D&variableName=inter"
        );
    }

    #[test]
    fn test_parse_reads_back_display() {
        let id = VirtualCssId::new("next-font/local", sample_query());
        let parsed = VirtualCssId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_accepts_resolved_path() {
        let id = format!(
            "/project/node_modules/next-font/google/target.css?{}",
            sample_query().to_query_string()
        );
        let parsed = VirtualCssId::parse(&id).unwrap();
        assert_eq!(parsed.loader, "/project/node_modules/next-font/google");
        assert_eq!(parsed.query.variable_name, "inter");
    }

    #[test]
    fn test_parse_requires_all_fields() {
        assert!(FontImportQuery::parse("path=a.ts&import=Inter").is_none());
        assert!(VirtualCssId::parse("next-font/google/other.css?path=a").is_none());
    }

    #[test]
    fn test_parse_decodes_plus_as_space() {
        let query = FontImportQuery::parse("path=a+b.ts&import=&arguments=%5B%5D&variableName=x").unwrap();
        assert_eq!(query.path, "a b.ts");
        assert_eq!(query.import, "");
    }

    #[test]
    fn test_normalize_drops_incidental_params_and_order() {
        let a = format!("next-font/google/target.css?{}", sample_query().to_query_string());
        let b = "next-font/google/target.css?variableName=inter&direct&t=123\
                 &arguments=%5B%7B%22subsets%22%3A%5B%22latin%22%5D%7D%5D&import=Inter&path=app%2Fpage.tsx";
        assert_eq!(normalize_target_css_id(&a), normalize_target_css_id(b));
        assert_eq!(normalize_target_css_id(b), a);
    }

    #[test]
    fn test_parse_first_occurrence_wins() {
        let query = FontImportQuery::parse(
            "?path=a%20b.ts&path=other.ts&import=Roboto_Mono&arguments=%5B%5D&variableName=mono&t=1",
        )
        .unwrap();
        assert_eq!(query.path, "a b.ts");
        assert_eq!(query.import, "Roboto_Mono");
    }

    #[test]
    fn test_normalize_keeps_partial_fields_in_order() {
        assert_eq!(
            normalize_target_css_id("next-font/local/target.css?variableName=x&t=1&path=a+b.ts"),
            "next-font/local/target.css?path=a%20b.ts&variableName=x"
        );
    }

    #[test]
    fn test_normalize_without_query() {
        assert_eq!(normalize_target_css_id("styles.css"), "styles.css");
        assert_eq!(normalize_target_css_id("styles.css?inline"), "styles.css");
    }

    #[test]
    fn test_query_suffix_helpers() {
        assert_eq!(get_query_suffix("a.css?x=1"), "?x=1");
        assert_eq!(get_query_suffix("a.css"), "");
        assert_eq!(remove_query_suffix("a.css?x=1"), "a.css");
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join("next-font/google", "target.css"), "next-font/google/target.css");
        assert_eq!(posix_join("next-font/google/", "/target.css"), "next-font/google/target.css");
        assert_eq!(posix_join("", "target.css"), "target.css");
    }
}
