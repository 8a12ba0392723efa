//! Rewriting of font loader calls into virtual stylesheet imports.

use oxc_ast::ast::{
    Argument, BindingPatternKind, Declaration, Expression, Program, Statement,
    VariableDeclaration, VariableDeclarationKind,
};
use serde_json::Value;

use super::TransformOptions;
use super::eval::expr_to_json;
use super::state::{FontExport, FontImport, ModuleTransformState};
use crate::error::TransformError;
use crate::virtual_id::{FontImportQuery, VirtualCssId};

/// Turns `const inter = Inter({...})` into a generated import of the
/// matching virtual stylesheet and marks the declaration for removal.
///
/// Must run after [`FontFunctionsCollector`](super::collect::FontFunctionsCollector)
/// because it only recognises callees recorded in the font function table.
pub struct FontImportsGenerator<'s> {
    state: &'s mut ModuleTransformState,
    options: &'s TransformOptions,
}

impl<'s> FontImportsGenerator<'s> {
    pub fn new(state: &'s mut ModuleTransformState, options: &'s TransformOptions) -> Self {
        Self { state, options }
    }

    pub fn visit(&mut self, program: &Program<'_>) -> Result<(), TransformError> {
        for statement in &program.body {
            match statement {
                Statement::VariableDeclaration(decl) => {
                    if self.check_var_decl(decl)?.is_some() {
                        self.state.removable_positions.insert(decl.span.start);
                    }
                }
                Statement::ExportNamedDeclaration(export) => {
                    let Some(Declaration::VariableDeclaration(decl)) = &export.declaration else {
                        continue;
                    };
                    if let Some(local) = self.check_var_decl(decl)? {
                        self.state.removable_positions.insert(export.span.start);
                        self.state.generated_exports.push(FontExport { local });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns the bound name when the declaration is a font loader call.
    fn check_var_decl(
        &mut self,
        decl: &VariableDeclaration<'_>,
    ) -> Result<Option<String>, TransformError> {
        let Some(declarator) = decl.declarations.first() else {
            return Ok(None);
        };
        let Some(Expression::CallExpression(call)) = &declarator.init else {
            return Ok(None);
        };
        let Expression::Identifier(callee) = &call.callee else {
            return Ok(None);
        };
        let Some(font_function) = self.state.font_functions.get(callee.name.as_str()).cloned()
        else {
            return Ok(None);
        };

        self.state.allowed_scope_positions.insert(callee.span.start);

        let arguments = call
            .arguments
            .iter()
            .map(|argument| match argument {
                Argument::SpreadElement(spread) => Err(TransformError::new(
                    "Font loaders don't accept spreads",
                    spread.span.start,
                )),
                other => match other.as_expression() {
                    Some(expr) => expr_to_json(expr),
                    None => Err(TransformError::new(
                        "Font loaders don't accept spreads",
                        call.span.start,
                    )),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        if decl.kind != VariableDeclarationKind::Const {
            return Err(TransformError::new(
                "Font loader calls must be assigned to a const",
                decl.span.start,
            ));
        }

        let BindingPatternKind::BindingIdentifier(ident) = &declarator.id.kind else {
            return Err(TransformError::new(
                "Font loader calls must be assigned to an identifier",
                declarator.span.start,
            ));
        };
        let local = ident.name.to_string();

        let query = FontImportQuery {
            path: self.options.id.clone(),
            import: font_function.function_name.clone().unwrap_or_default(),
            arguments: Value::Array(arguments).to_string(),
            variable_name: local.clone(),
        };
        let specifier =
            VirtualCssId::new(self.options.remap(&font_function.loader), query).to_string();

        self.state.push_import(FontImport {
            local: local.clone(),
            specifier,
        });

        Ok(Some(local))
    }
}
