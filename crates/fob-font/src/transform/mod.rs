//! Source-to-source rewrite of font loader calls.
//!
//! ```text
//! import { Inter } from 'next/font/google'
//! export const inter = Inter({ subsets: ['latin'] })
//! ```
//!
//! becomes
//!
//! ```text
//! import inter from "next-font/google/target.css?path=...&import=Inter&arguments=...&variableName=inter";
//! export { inter };
//! ```
//!
//! The pass runs in three steps over one parsed module: the collector finds
//! loader imports, the rewriter turns calls into virtual imports, and the scope
//! check rejects every other use of a loader binding. The rewriter must run
//! before the scope check so the call sites are already allowed.

mod apply;
mod collect;
mod eval;
mod rewrite;
mod scope;
mod state;

pub use apply::{MutationPlan, StatementRef};
pub use collect::FontFunctionsCollector;
pub use eval::expr_to_json;
pub use rewrite::FontImportsGenerator;
pub use scope::FindFunctionsOutsideModuleScope;
pub use state::{FontExport, FontFunction, FontImport, ModuleTransformState};

use std::collections::BTreeMap;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::{FontError, Result, TransformError};
use crate::loader::LoaderKind;

/// Import sources rewritten before matching against the known loaders.
pub fn default_remap_imports() -> BTreeMap<String, String> {
    [
        ("@next/font/google", LoaderKind::Google),
        ("@next/font/local", LoaderKind::Local),
        ("next/font/google", LoaderKind::Google),
        ("next/font/local", LoaderKind::Local),
    ]
    .into_iter()
    .map(|(from, kind)| (from.to_string(), kind.module().to_string()))
    .collect()
}

/// Inputs of one module transform.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Module path relative to the project root, `/`-separated
    pub id: String,
    /// Loader modules recognised after remapping
    pub font_loaders: Vec<String>,
    pub remap_imports: BTreeMap<String, String>,
}

impl TransformOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            font_loaders: LoaderKind::ALL.iter().map(|k| k.module().to_string()).collect(),
            remap_imports: default_remap_imports(),
        }
    }

    pub fn with_remap_imports(mut self, remap_imports: BTreeMap<String, String>) -> Self {
        self.remap_imports = remap_imports;
        self
    }

    pub fn with_font_loaders(mut self, font_loaders: Vec<String>) -> Self {
        self.font_loaders = font_loaders;
        self
    }

    pub(crate) fn remap<'o>(&'o self, source: &'o str) -> &'o str {
        self.remap_imports
            .get(source)
            .map(String::as_str)
            .unwrap_or(source)
    }
}

/// Result of running the font pass over a module.
#[derive(Debug)]
pub enum TransformOutcome {
    /// No font loader import; the module is left alone
    Unchanged,
    Changed(ModuleTransformState),
}

/// Run collector, rewriter and scope check over a parsed module.
pub fn transform_program(
    program: &Program<'_>,
    options: &TransformOptions,
) -> std::result::Result<TransformOutcome, TransformError> {
    let mut state = ModuleTransformState::new();

    FontFunctionsCollector::new(&mut state, options).visit(program)?;
    if state.removable_positions.is_empty() {
        return Ok(TransformOutcome::Unchanged);
    }

    FontImportsGenerator::new(&mut state, options).visit(program)?;
    FindFunctionsOutsideModuleScope::new(&state).visit(program)?;

    Ok(TransformOutcome::Changed(state))
}

/// A rewritten module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedModule {
    pub code: String,
    /// Virtual stylesheet specifiers the module now imports, in order
    pub imports: Vec<String>,
}

/// Parse `source`, run the font pass and apply its mutation plan.
///
/// Returns `Ok(None)` when the module does not import a font loader.
pub fn transform_module(
    source: &str,
    path: &Path,
    options: &TransformOptions,
) -> Result<Option<TransformedModule>> {
    let source_type = SourceType::from_path(path).map_err(|e| FontError::Parse {
        id: options.id.clone(),
        reason: e.to_string(),
    })?;

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(FontError::Parse {
            id: options.id.clone(),
            reason: error.to_string(),
        });
    }

    let state = match transform_program(&ret.program, options) {
        Ok(TransformOutcome::Unchanged) => return Ok(None),
        Ok(TransformOutcome::Changed(state)) => state,
        Err(error) => return Err(FontError::transform(options.id.clone(), error)),
    };

    let plan = MutationPlan::new(&state, &ret.program);
    tracing::debug!(
        id = %options.id,
        imports = state.generated_imports.len(),
        deleted = plan.delete.len(),
        "rewrote font loader calls"
    );

    Ok(Some(TransformedModule {
        code: plan.apply(source),
        imports: state.import_specifiers(),
    }))
}
