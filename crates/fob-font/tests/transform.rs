//! End-to-end tests for rewriting font loader call sites.

use fob_font::{FontError, TransformOptions, transform_module};
use std::path::Path;

fn transform(source: &str) -> Result<Option<fob_font::TransformedModule>, FontError> {
    transform_module(source, Path::new("app/page.tsx"), &TransformOptions::new("app/page.tsx"))
}

fn transform_error(source: &str) -> String {
    match transform(source) {
        Err(FontError::Transform { source, .. }) => source.message,
        other => panic!("expected a transform error, got {:?}", other),
    }
}

#[test]
fn test_google_call_becomes_stylesheet_import() {
    let module = transform(
        r#"import { Inter } from "next/font/google";
const inter = Inter({ subsets: ["latin"] });
export default function Page() { return inter.className; }
"#,
    )
    .unwrap()
    .unwrap();

    insta::assert_snapshot!(module.code, @r#"
    import inter from "next-font/google/target.css?path=app%2Fpage.tsx&import=Inter&arguments=%5B%7B%22subsets%22%3A%5B%22latin%22%5D%7D%5D&variableName=inter";
    export default function Page() { return inter.className; }
    "#);
}

#[test]
fn test_exported_local_font() {
    let module = transform(
        r#"import localFont from "next/font/local";
export const brand = localFont({ src: "./brand.woff2", display: "optional" });
"#,
    )
    .unwrap()
    .unwrap();

    insta::assert_snapshot!(module.code, @r#"
    import brand from "next-font/local/target.css?path=app%2Fpage.tsx&import=&arguments=%5B%7B%22src%22%3A%22.%2Fbrand.woff2%22%2C%22display%22%3A%22optional%22%7D%5D&variableName=brand";
    export { brand };
    "#);
}

#[test]
fn test_untouched_without_loader_import() {
    let source = "import React from 'react';\nconst Inter = () => null;\n";
    assert!(transform(source).unwrap().is_none());
}

#[test]
fn test_other_statements_keep_their_bytes() {
    let source = "import a from 'a';\n\n// keep me\nimport { Roboto } from '@next/font/google';\nconst roboto = Roboto({ weight: '400' });\nconsole.log(a,   roboto);\n";
    let module = transform(source).unwrap().unwrap();

    assert!(module.code.starts_with("import a from 'a';\n\n// keep me\nimport roboto from \"next-font/google/target.css?"));
    assert!(module.code.ends_with("\nconsole.log(a,   roboto);\n"));
    assert_eq!(module.imports.len(), 1);
}

#[test]
fn test_multiple_calls_in_order() {
    let module = transform(
        "import { Inter, Lora } from 'next/font/google';\nconst inter = Inter();\nconst lora = Lora();\n",
    )
    .unwrap()
    .unwrap();

    assert_eq!(module.imports.len(), 2);
    assert!(module.imports[0].contains("variableName=inter"));
    assert!(module.imports[1].contains("variableName=lora"));
}

#[test]
fn test_errors() {
    assert_eq!(
        transform_error("import { Inter } from 'next/font/google';\nlet inter = Inter();\n"),
        "Font loader calls must be assigned to a const"
    );
    assert_eq!(
        transform_error("import { Inter } from 'next/font/google';\nconst { className } = Inter();\n"),
        "Font loader calls must be assigned to an identifier"
    );
    assert_eq!(
        transform_error("import * as fonts from 'next/font/google';\n"),
        "Font loaders can't have namespace imports"
    );
    assert_eq!(
        transform_error("import { Inter } from 'next/font/google';\nconst opts = {};\nconst inter = Inter(...opts);\n"),
        "Font loaders don't accept spreads"
    );
    assert_eq!(
        transform_error("import { Inter } from 'next/font/google';\nconst w = '400';\nconst inter = Inter({ weight: w });\n"),
        "Font loader values must be explicitly written literals."
    );
    assert_eq!(
        transform_error("import { Inter } from 'next/font/google';\nfunction f() { return Inter(); }\n"),
        "Font loaders must be called and assigned to a const in the module scope"
    );
}

#[test]
fn test_parse_error() {
    let err = transform("import { Inter } from 'next/font/google';\nconst = ;\n").unwrap_err();
    assert!(matches!(err, FontError::Parse { .. }));
}
