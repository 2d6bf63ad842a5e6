//! Visibility predicates, `only when` rules and show-when clauses.
//!
//! Each check yields a flag plus the info block attached to the element:
//! `{predicate, state_paths, result}`.
use serde_json::{Map, Value, json};

use crate::ast::Span;
use crate::error::{CompileError, ErrorKind, Result};
use crate::ir::{Expr, Literal, VisibilityRule, render_state_path};

use super::eval;
use super::state::StateContext;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub visible: bool,
    pub info: Value,
}

fn info(predicate: String, state_paths: Vec<String>, result: bool) -> Value {
    let mut map = Map::new();
    map.insert("predicate".to_owned(), Value::String(predicate));
    map.insert("state_paths".to_owned(), json!(state_paths));
    map.insert("result".to_owned(), Value::Bool(result));
    Value::Object(map)
}

/// Evaluates the `visibility` expression and/or the `only when` rule.
/// Declaring both is a conflict.
pub fn evaluate_visibility(
    visibility: Option<&Expr>,
    rule: Option<&VisibilityRule>,
    state: &StateContext<'_>,
    span: Span,
) -> Result<Option<Evaluated>> {
    match (visibility, rule) {
        (Some(_), Some(_)) => Err(CompileError::new(
            ErrorKind::Visibility,
            "Visibility cannot combine visibility clauses with only-when rules.",
        )
        .at(span)),
        (Some(Expr::StatePath { path }), None) => Ok(Some(evaluate_bare_path(path, state))),
        (Some(expr), None) | (None, Some(VisibilityRule::Expression { expression: expr })) => {
            evaluate_predicate(expr, state, span).map(Some)
        }
        (None, Some(VisibilityRule::Path { path, value })) => evaluate_path_rule(path, value, state, span).map(Some),
        (None, None) => Ok(None),
    }
}

/// A boolean-valued expression; anything else is a visibility error.
pub fn evaluate_predicate(expr: &Expr, state: &StateContext<'_>, span: Span) -> Result<Evaluated> {
    let value = eval::evaluate(expr, state).map_err(|err| err.or_at(span))?;
    let Value::Bool(visible) = value else {
        return Err(CompileError::new(
            ErrorKind::Visibility,
            format!("Visibility expression {} must produce a boolean, got {}", eval::render(expr), eval::type_name(&value)),
        )
        .at(span));
    };
    Ok(Evaluated { visible, info: info(eval::render(expr), eval::state_paths(expr), visible) })
}

/// `visibility: state.x` on its own: missing reads as hidden, anything else
/// by truthiness.
fn evaluate_bare_path(path: &[String], state: &StateContext<'_>) -> Evaluated {
    let rendered = render_state_path(path);
    let visible = state.lookup(path).is_some_and(truthy);
    Evaluated { visible, info: info(rendered.clone(), vec![rendered], visible) }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// `only when state.x is <literal>`. The path must be declared, in the
/// snapshot or in the defaults, and hold a value of the literal's type.
fn evaluate_path_rule(path: &[String], expected: &Literal, state: &StateContext<'_>, span: Span) -> Result<Evaluated> {
    let rendered = render_state_path(path);
    let predicate = format!("{rendered} is {}", eval::render_literal(expected));
    let Some(actual) = state.lookup(path) else {
        return Err(CompileError::new(
            ErrorKind::Visibility,
            format!("Visibility rule requires declared state path '{rendered}'."),
        )
        .at(span));
    };
    let (expected_type, matches) = match (expected, actual) {
        (Literal::Text(text), Value::String(actual)) => ("text", Some(text == actual)),
        (Literal::Number(number), Value::Number(actual)) => ("number", Some(actual.as_f64() == Some(number.0))),
        (Literal::Bool(flag), Value::Bool(actual)) => ("boolean", Some(flag == actual)),
        (Literal::Text(_), _) => ("text", None),
        (Literal::Number(_), _) => ("number", None),
        (Literal::Bool(_), _) => ("boolean", None),
        (Literal::Null, _) => {
            return Err(CompileError::internal("null visibility rule survived lowering").at(span));
        }
    };
    let visible = matches.ok_or_else(|| {
        CompileError::new(
            ErrorKind::Visibility,
            format!(
                "Visibility rule for {rendered} expects {expected_type} but state value is {}.",
                eval::type_name(actual)
            ),
        )
        .at(span)
    })?;
    Ok(Evaluated { visible, info: info(predicate, vec![rendered], visible) })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rstest::rstest;

    fn rule(path: &str, value: Value) -> VisibilityRule {
        VisibilityRule::Path {
            path: path.split('.').map(str::to_owned).collect(),
            value: serde_json::from_value(value).unwrap(),
        }
    }

    fn check(rule_: &VisibilityRule, snapshot: Value) -> Result<Option<Evaluated>> {
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        evaluate_visibility(None, Some(rule_), &state, Span { line: 2, column: 1 })
    }

    #[rstest]
    #[case(json!({"role": "admin"}), true)]
    #[case(json!({"role": "viewer"}), false)]
    fn path_rules(#[case] snapshot: Value, #[case] visible: bool) {
        let evaluated = check(&rule("role", json!("admin")), snapshot).unwrap().unwrap();
        assert_eq!(evaluated.visible, visible);
        assert_eq!(evaluated.info["predicate"], json!("state.role is \"admin\""));
    }

    #[test]
    fn path_rules_need_a_declared_path() {
        let err = check(&rule("role", json!("admin")), json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Visibility);
        assert_eq!(err.message, "Visibility rule requires declared state path 'state.role'.");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn path_rules_read_declared_defaults() {
        let snapshot = json!({});
        let mut defaults = IndexMap::new();
        defaults.insert("role".to_owned(), json!("admin"));
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &defaults, &empty);
        let evaluated = evaluate_visibility(None, Some(&rule("role", json!("admin"))), &state, Span::default());
        assert!(evaluated.unwrap().unwrap().visible);
    }

    #[rstest]
    #[case(json!({}), false)]
    #[case(json!({"is_admin": null}), false)]
    #[case(json!({"is_admin": false}), false)]
    #[case(json!({"is_admin": 0}), false)]
    #[case(json!({"is_admin": ""}), false)]
    #[case(json!({"is_admin": []}), false)]
    #[case(json!({"is_admin": true}), true)]
    #[case(json!({"is_admin": "yes"}), true)]
    #[case(json!({"is_admin": [1]}), true)]
    #[case(json!({"is_admin": 2.5}), true)]
    fn bare_state_paths_read_by_truthiness(#[case] snapshot: Value, #[case] visible: bool) {
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        let expr: Expr = serde_json::from_value(json!({"kind": "state_path", "path": ["is_admin"]})).unwrap();
        let evaluated = evaluate_visibility(Some(&expr), None, &state, Span::default()).unwrap().unwrap();
        assert_eq!(evaluated.visible, visible);
        assert_eq!(
            evaluated.info,
            json!({"predicate": "state.is_admin", "state_paths": ["state.is_admin"], "result": visible})
        );
    }

    #[test]
    fn path_rule_type_mismatch() {
        let err = check(&rule("count", json!(3)), json!({"count": "three"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Visibility);
        assert_eq!(err.message, "Visibility rule for state.count expects number but state value is text.");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn both_forms_conflict() {
        let snapshot = json!({});
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        let expr: Expr = serde_json::from_value(json!({"kind": "literal", "value": true})).unwrap();
        let err = evaluate_visibility(Some(&expr), Some(&rule("a", json!(true))), &state, Span::default()).unwrap_err();
        assert_eq!(err.message, "Visibility cannot combine visibility clauses with only-when rules.");
    }

    #[test]
    fn predicates_must_be_boolean() {
        let snapshot = json!({"n": 1});
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        let expr: Expr = serde_json::from_value(json!({"kind": "binary", "op": "add",
            "left": {"kind": "state_path", "path": ["n"]}, "right": {"kind": "literal", "value": 1}})).unwrap();
        assert_eq!(evaluate_predicate(&expr, &state, Span::default()).unwrap_err().kind, ErrorKind::Visibility);
    }
}
