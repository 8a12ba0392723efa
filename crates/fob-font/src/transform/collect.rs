//! Discovery of font loader imports.

use oxc_ast::ast::{ImportDeclarationSpecifier, ModuleExportName, Program, Statement};

use super::TransformOptions;
use super::state::{FontFunction, ModuleTransformState};
use crate::error::TransformError;

/// Records every top-level import of a known font loader module.
///
/// For `import { Inter } from 'next/font/google'` this marks the import
/// statement for removal, allows the `Inter` binding itself and maps `Inter`
/// to its loader so the rewriter can recognise calls to it.
pub struct FontFunctionsCollector<'s> {
    state: &'s mut ModuleTransformState,
    options: &'s TransformOptions,
}

impl<'s> FontFunctionsCollector<'s> {
    pub fn new(state: &'s mut ModuleTransformState, options: &'s TransformOptions) -> Self {
        Self { state, options }
    }

    pub fn visit(&mut self, program: &Program<'_>) -> Result<(), TransformError> {
        for statement in &program.body {
            let Statement::ImportDeclaration(import) = statement else {
                continue;
            };
            if import.import_kind.is_type() {
                continue;
            }

            let source = import.source.value.as_str();
            if !self.is_font_loader(source) {
                continue;
            }

            self.state.removable_positions.insert(import.span.start);

            let Some(specifiers) = &import.specifiers else {
                continue;
            };
            for specifier in specifiers {
                let (local, function_name) = match specifier {
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                        return Err(TransformError::new(
                            "Font loaders can't have namespace imports",
                            namespace.span.start,
                        ));
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                        (&default.local, None)
                    }
                    ImportDeclarationSpecifier::ImportSpecifier(named) => {
                        let imported = match &named.imported {
                            ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
                            ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
                            ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
                        };
                        (&named.local, Some(imported))
                    }
                };

                self.state.allowed_scope_positions.insert(local.span.start);
                self.state.font_functions.insert(
                    local.name.to_string(),
                    FontFunction {
                        loader: source.to_string(),
                        function_name,
                    },
                );
            }
        }
        Ok(())
    }

    fn is_font_loader(&self, source: &str) -> bool {
        let resolved = self.options.remap(source);
        self.options
            .font_loaders
            .iter()
            .any(|loader| loader == resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn collect(source: &str) -> Result<ModuleTransformState, TransformError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        let options = TransformOptions::new("app/page.tsx");
        let mut state = ModuleTransformState::new();
        FontFunctionsCollector::new(&mut state, &options).visit(&ret.program)?;
        Ok(state)
    }

    #[test]
    fn test_collects_named_and_default_imports() {
        let source = "import { Inter, Roboto_Mono as Mono } from 'next/font/google';\n\
                      import localFont from '@next/font/local';\n\
                      import React from 'react';";
        let state = collect(source).unwrap();

        assert_eq!(
            state.font_functions.get("Inter"),
            Some(&FontFunction {
                loader: "next/font/google".to_string(),
                function_name: Some("Inter".to_string()),
            })
        );
        assert_eq!(
            state.font_functions.get("Mono"),
            Some(&FontFunction {
                loader: "next/font/google".to_string(),
                function_name: Some("Roboto_Mono".to_string()),
            })
        );
        assert_eq!(
            state.font_functions.get("localFont"),
            Some(&FontFunction {
                loader: "@next/font/local".to_string(),
                function_name: None,
            })
        );
        assert!(!state.font_functions.contains_key("React"));
        assert_eq!(state.removable_positions.len(), 2);
        assert!(state.removable_positions.contains(&0));
        assert_eq!(state.allowed_scope_positions.len(), 3);
    }

    #[test]
    fn test_accepts_already_remapped_specifier() {
        let state = collect("import { Inter } from 'next-font/google';").unwrap();
        assert!(state.font_functions.contains_key("Inter"));
    }

    #[test]
    fn test_ignores_unrelated_imports() {
        let state = collect("import { Inter } from 'some-fonts';").unwrap();
        assert!(state.font_functions.is_empty());
        assert!(state.removable_positions.is_empty());
    }

    #[test]
    fn test_rejects_namespace_import() {
        let err = collect("import * as fonts from 'next/font/google';").unwrap_err();
        assert_eq!(err.message, "Font loaders can't have namespace imports");
        assert_eq!(err.offset, 7);
    }
}
