use rustc_hash::{FxHashMap, FxHashSet};

/// A font loader function imported into the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFunction {
    /// Import source as written, before remapping
    pub loader: String,
    /// Imported name for named imports, `None` for default imports
    pub function_name: Option<String>,
}

/// Synthetic `import <local> from "<specifier>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontImport {
    pub local: String,
    pub specifier: String,
}

impl FontImport {
    pub fn render(&self) -> String {
        format!(
            "import {} from {};",
            self.local,
            serde_json::Value::String(self.specifier.clone())
        )
    }
}

/// Synthetic `export { <local> }` for a font call whose declaration was exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontExport {
    pub local: String,
}

impl FontExport {
    pub fn render(&self) -> String {
        format!("export {{ {} }};", self.local)
    }
}

/// Per-module record shared by the collector, rewriter and scope validator.
///
/// Created for one transform of one module and dropped once its output code
/// has been produced.
#[derive(Debug, Default)]
pub struct ModuleTransformState {
    /// Start offsets of top-level statements to delete
    pub removable_positions: FxHashSet<u32>,
    /// Start offsets of identifiers allowed to name a font loader
    pub allowed_scope_positions: FxHashSet<u32>,
    /// Local binding name to the loader it was imported from
    pub font_functions: FxHashMap<String, FontFunction>,
    /// Imports to insert, in encounter order, without duplicates
    pub generated_imports: Vec<FontImport>,
    /// Re-exports to append
    pub generated_exports: Vec<FontExport>,
    seen_imports: FxHashSet<FontImport>,
}

impl ModuleTransformState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an import unless a structurally equal one was already generated.
    ///
    /// Returns whether the import was added.
    pub fn push_import(&mut self, import: FontImport) -> bool {
        if !self.seen_imports.insert(import.clone()) {
            return false;
        }
        self.generated_imports.push(import);
        true
    }

    /// Specifiers of the generated imports, in order.
    pub fn import_specifiers(&self) -> Vec<String> {
        self.generated_imports
            .iter()
            .map(|import| import.specifier.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_import_dedupes_structurally() {
        let mut state = ModuleTransformState::new();
        let import = FontImport {
            local: "inter".to_string(),
            specifier: "next-font/google/target.css?a=1".to_string(),
        };
        assert!(state.push_import(import.clone()));
        assert!(!state.push_import(import));
        assert!(state.push_import(FontImport {
            local: "roboto".to_string(),
            specifier: "next-font/google/target.css?a=1".to_string(),
        }));
        assert_eq!(state.generated_imports.len(), 2);
    }

    #[test]
    fn test_render() {
        let import = FontImport {
            local: "inter".to_string(),
            specifier: "next-font/google/target.css?path=a.ts".to_string(),
        };
        assert_eq!(
            import.render(),
            r#"import inter from "next-font/google/target.css?path=a.ts";"#
        );
        assert_eq!(FontExport { local: "inter".into() }.render(), "export { inter };");
    }
}
