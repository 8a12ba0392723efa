//! Applies a [`MutationPlan`] to module source.
//!
//! The plan addresses top-level statements by index and carries their source
//! spans, so applying it needs nothing but the original text. Bytes outside the
//! deleted statements are copied through untouched.

use oxc_ast::ast::Program;
use oxc_span::{GetSpan, Span};

use super::state::ModuleTransformState;

/// A top-level statement scheduled for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementRef {
    pub index: usize,
    pub span: Span,
}

/// Statement-level edits computed from a module's transform state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    /// Statements to delete, in source order
    pub delete: Vec<StatementRef>,
    /// Index of the statement the generated imports replace
    pub insert_at: Option<usize>,
    /// Rendered import statements
    pub imports: Vec<String>,
    /// Rendered export statements appended at module end
    pub append: Vec<String>,
}

impl MutationPlan {
    pub fn new(state: &ModuleTransformState, program: &Program<'_>) -> Self {
        let delete: Vec<StatementRef> = program
            .body
            .iter()
            .enumerate()
            .filter(|(_, statement)| state.removable_positions.contains(&statement.span().start))
            .map(|(index, statement)| StatementRef {
                index,
                span: statement.span(),
            })
            .collect();

        Self {
            insert_at: delete.first().map(|statement| statement.index),
            delete,
            imports: state.generated_imports.iter().map(|i| i.render()).collect(),
            append: state.generated_exports.iter().map(|e| e.render()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.imports.is_empty() && self.append.is_empty()
    }

    /// Produce the rewritten source.
    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0usize;
        let mut imports_placed = false;

        for statement in &self.delete {
            let start = statement.span.start as usize;
            let end = statement.span.end as usize;
            if start < cursor || end > source.len() {
                continue;
            }
            out.push_str(&source[cursor..start]);

            if Some(statement.index) == self.insert_at && !self.imports.is_empty() {
                out.push_str(&self.imports.join("\n"));
                imports_placed = true;
                cursor = end;
            } else {
                cursor = skip_line_break(source, end);
            }
        }

        // Nothing was deleted; keep the imports at the top of the module.
        if !imports_placed && !self.imports.is_empty() {
            let mut head = self.imports.join("\n");
            head.push('\n');
            out.insert_str(0, &head);
        }

        out.push_str(&source[cursor.min(source.len())..]);

        if !self.append.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.append.join("\n"));
            out.push('\n');
        }

        out
    }
}

fn skip_line_break(source: &str, offset: usize) -> usize {
    let rest = &source[offset..];
    if rest.starts_with("\r\n") {
        offset + 2
    } else if rest.starts_with('\n') {
        offset + 1
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(source: &str, needle: &str) -> Span {
        let start = source.find(needle).unwrap() as u32;
        Span::new(start, start + needle.len() as u32)
    }

    #[test]
    fn test_replaces_first_and_removes_rest() {
        let source = "import a from 'a';\nimport { Inter } from 'x';\nconst inter = Inter();\nuse(inter);\n";
        let plan = MutationPlan {
            delete: vec![
                StatementRef { index: 1, span: span(source, "import { Inter } from 'x';") },
                StatementRef { index: 2, span: span(source, "const inter = Inter();") },
            ],
            insert_at: Some(1),
            imports: vec!["import inter from \"v\";".to_string()],
            append: vec![],
        };
        assert_eq!(
            plan.apply(source),
            "import a from 'a';\nimport inter from \"v\";\nuse(inter);\n"
        );
    }

    #[test]
    fn test_appends_exports() {
        let source = "import { Inter } from 'x';\nexport const inter = Inter();";
        let plan = MutationPlan {
            delete: vec![
                StatementRef { index: 0, span: span(source, "import { Inter } from 'x';") },
                StatementRef { index: 1, span: span(source, "export const inter = Inter();") },
            ],
            insert_at: Some(0),
            imports: vec!["import inter from \"v\";".to_string()],
            append: vec!["export { inter };".to_string()],
        };
        assert_eq!(plan.apply(source), "import inter from \"v\";\nexport { inter };\n");
    }

    #[test]
    fn test_empty_plan_keeps_source() {
        let source = "const a = 1;\n";
        let plan = MutationPlan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.apply(source), source);
    }
}
