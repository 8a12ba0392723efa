//! Rejects font loader identifiers used anywhere but a module-scope const.

use oxc_ast::ast::{BindingIdentifier, IdentifierReference, Program};
use oxc_ast_visit::{Visit, walk};

use super::state::ModuleTransformState;
use crate::error::TransformError;

pub struct FindFunctionsOutsideModuleScope<'s> {
    state: &'s ModuleTransformState,
    error: Option<TransformError>,
}

impl<'s> FindFunctionsOutsideModuleScope<'s> {
    pub fn new(state: &'s ModuleTransformState) -> Self {
        Self { state, error: None }
    }

    pub fn visit(mut self, program: &Program<'_>) -> Result<(), TransformError> {
        walk::walk_program(&mut self, program);
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn check(&mut self, name: &str, start: u32) {
        if self.error.is_some() {
            return;
        }
        if self.state.font_functions.contains_key(name)
            && !self.state.allowed_scope_positions.contains(&start)
        {
            self.error = Some(TransformError::new(
                "Font loaders must be called and assigned to a const in the module scope",
                start,
            ));
        }
    }
}

impl<'a> Visit<'a> for FindFunctionsOutsideModuleScope<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.check(ident.name.as_str(), ident.span.start);
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.check(ident.name.as_str(), ident.span.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformOptions;
    use crate::transform::collect::FontFunctionsCollector;
    use crate::transform::rewrite::FontImportsGenerator;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn validate(source: &str) -> Result<(), TransformError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        let options = TransformOptions::new("app/page.tsx");
        let mut state = ModuleTransformState::new();
        FontFunctionsCollector::new(&mut state, &options).visit(&ret.program)?;
        FontImportsGenerator::new(&mut state, &options).visit(&ret.program)?;
        FindFunctionsOutsideModuleScope::new(&state).visit(&ret.program)
    }

    #[test]
    fn test_module_scope_call_is_allowed() {
        validate(
            "import { Inter } from 'next/font/google';\n\
             const inter = Inter({ subsets: ['latin'] });",
        )
        .unwrap();
    }

    #[test]
    fn test_call_inside_function_is_rejected() {
        let source = "import { Inter } from 'next/font/google';\n\
                      function Page() { const inter = Inter({ subsets: ['latin'] }); }";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err.message,
            "Font loaders must be called and assigned to a const in the module scope"
        );
        assert_eq!(err.offset as usize, source.rfind("Inter(").unwrap());
    }

    #[test]
    fn test_reference_without_call_is_rejected() {
        let err = validate(
            "import { Inter } from 'next/font/google';\n\
             const fonts = [Inter];",
        )
        .unwrap_err();
        assert!(err.message.contains("module scope"));
    }

    #[test]
    fn test_call_in_conditional_is_rejected() {
        assert!(validate(
            "import { Inter } from 'next/font/google';\n\
             if (true) { const inter = Inter({ subsets: ['latin'] }); }",
        )
        .is_err());
    }

    #[test]
    fn test_shadowing_binding_is_rejected() {
        assert!(validate(
            "import { Inter } from 'next/font/google';\n\
             const inter = Inter({ subsets: ['latin'] });\n\
             function f(Inter) { return Inter; }",
        )
        .is_err());
    }
}
