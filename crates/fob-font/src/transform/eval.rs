//! Static evaluation of font loader call arguments.

use oxc_ast::ast::{ArrayExpressionElement, Expression, ObjectPropertyKind, PropertyKey, PropertyKind};
use oxc_span::GetSpan;
use serde_json::{Map, Number, Value};

use crate::error::TransformError;

const NON_LITERAL: &str = "Font loader values must be explicitly written literals.";

/// Convert a literal-only expression into JSON.
///
/// Objects, arrays, strings, numbers, booleans and `null` are accepted.
/// Everything else, including spreads and array holes, is rejected because
/// the arguments must be known without running the module.
pub fn expr_to_json(expr: &Expression<'_>) -> Result<Value, TransformError> {
    match expr {
        Expression::StringLiteral(lit) => Ok(Value::String(lit.value.to_string())),
        Expression::NumericLiteral(lit) => Ok(number_to_json(lit.value)),
        Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
        Expression::NullLiteral(_) => Ok(Value::Null),
        Expression::ParenthesizedExpression(paren) => expr_to_json(&paren.expression),
        Expression::ObjectExpression(object) => {
            let mut map = Map::new();
            for property in &object.properties {
                match property {
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        return Err(TransformError::new("Unexpected spread", spread.span.start));
                    }
                    ObjectPropertyKind::ObjectProperty(prop) => {
                        if prop.kind != PropertyKind::Init || prop.method {
                            return Err(TransformError::new("Unexpected key", prop.span.start));
                        }
                        let key = match &prop.key {
                            PropertyKey::StaticIdentifier(ident) if !prop.computed => {
                                ident.name.to_string()
                            }
                            other => {
                                return Err(TransformError::new(
                                    "Unexpected object key type",
                                    other.span().start,
                                ));
                            }
                        };
                        map.insert(key, expr_to_json(&prop.value)?);
                    }
                }
            }
            Ok(Value::Object(map))
        }
        Expression::ArrayExpression(array) => array
            .elements
            .iter()
            .map(|element| match element {
                ArrayExpressionElement::SpreadElement(spread) => {
                    Err(TransformError::new("Unexpected spread", spread.span.start))
                }
                ArrayExpressionElement::Elision(elision) => Err(TransformError::new(
                    "Unexpected empty value in array",
                    elision.span.start,
                )),
                other => match other.as_expression() {
                    Some(expr) => expr_to_json(expr),
                    None => Err(TransformError::new(NON_LITERAL, other.span().start)),
                },
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(TransformError::new(NON_LITERAL, other.span().start)),
    }
}

fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}
