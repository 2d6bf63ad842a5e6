//! Expression checks applied during lowering.
//!
//! The purity checker visits every subexpression, so a call buried inside a
//! reduce body inside a map literal is found just like a top-level one.
use crate::ast::{Expr, MapEntry, Span};
use crate::error::{CompileError, ErrorKind, Result};

/// Pre-order visit of `expr` and all its subexpressions.
pub fn walk<'e>(expr: &'e Expr, visit: &mut impl FnMut(&'e Expr) -> Result<()>) -> Result<()> {
    visit(expr)?;
    match expr {
        Expr::Literal { .. } | Expr::StatePath { .. } | Expr::Name { .. } | Expr::PatternParam { .. } => {}
        Expr::Unary { operand, .. } => walk(operand, visit)?,
        Expr::Binary { left, right, .. } | Expr::Comparison { left, right, .. } => {
            walk(left, visit)?;
            walk(right, visit)?;
        }
        Expr::List { items } => {
            for item in items {
                walk(item, visit)?;
            }
        }
        Expr::Map { entries } => {
            for MapEntry { key, value } in entries {
                walk(key, visit)?;
                walk(value, visit)?;
            }
        }
        Expr::ListOp { target, value, index, .. } => {
            walk(target, visit)?;
            for sub in [value, index].into_iter().flatten() {
                walk(sub, visit)?;
            }
        }
        Expr::MapOp { target, key, value, .. } => {
            walk(target, visit)?;
            for sub in [key, value].into_iter().flatten() {
                walk(sub, visit)?;
            }
        }
        Expr::ListMap { target, body, .. } => {
            walk(target, visit)?;
            walk(body, visit)?;
        }
        Expr::ListFilter { target, predicate, .. } => {
            walk(target, visit)?;
            walk(predicate, visit)?;
        }
        Expr::ListReduce { target, start, body, .. } => {
            walk(target, visit)?;
            walk(start, visit)?;
            walk(body, visit)?;
        }
        Expr::ToolCall { arguments, .. } | Expr::CallFunction { arguments, .. } => {
            for argument in arguments {
                walk(argument, visit)?;
            }
        }
    }
    Ok(())
}

/// Rejects tool and function calls anywhere in `expr`.
/// `subject` reads like "Card stat expressions".
pub fn reject_impure(expr: &Expr, subject: &str) -> Result<()> {
    walk(expr, &mut |node| match node {
        Expr::ToolCall { tool, .. } => Err(CompileError::new(
            ErrorKind::Purity,
            format!("{subject} cannot call tools"),
        )
        .with_details("impure_expression", Some(tool))),
        Expr::CallFunction { function, .. } => Err(CompileError::new(
            ErrorKind::Purity,
            format!("{subject} cannot call functions"),
        )
        .with_details("impure_expression", Some(function))),
        _ => Ok(()),
    })
}

/// Rejects pattern parameters that survived expansion.
pub fn reject_pattern_params(expr: &Expr, context: &str) -> Result<()> {
    walk(expr, &mut |node| match node {
        Expr::PatternParam { name } => Err(CompileError::structure(format!(
            "{context} cannot reference pattern parameter '{name}'"
        ))),
        _ => Ok(()),
    })
}

/// Checks shared by every runtime predicate (visibility, show_when,
/// conditions, step requirements).
pub fn check_predicate(expr: &Expr, context: &str, span: Span) -> Result<()> {
    reject_pattern_params(expr, context)
        .and_then(|()| reject_impure(expr, &format!("{context} expressions")))
        .map_err(|err| err.or_at(span))
}

pub fn require_state_path(expr: &Expr, what: &str, span: Span) -> Result<Vec<String>> {
    match expr.state_path() {
        Some(path) if !path.is_empty() => Ok(path.to_vec()),
        _ => Err(CompileError::state_binding(format!(
            "{what} must be a state path like state.items"
        ))
        .at(span)),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(value: serde_json::Value) -> Expr {
        serde_json::from_value(value).unwrap()
    }

    fn tool_call() -> serde_json::Value {
        json!({"kind": "tool_call", "tool": "fetch_totals"})
    }

    #[test]
    fn pure_arithmetic_passes() {
        let e = expr(json!({
            "kind": "binary", "op": "add",
            "left": {"kind": "state_path", "path": ["a"]},
            "right": {"kind": "literal", "value": 2},
        }));
        assert!(reject_impure(&e, "Card stat expressions").is_ok());
    }

    #[test]
    fn top_level_calls_are_rejected() {
        let err = reject_impure(&expr(tool_call()), "Card stat expressions").unwrap_err();
        assert_eq!(err.message, "Card stat expressions cannot call tools");
        assert_eq!(err.kind, ErrorKind::Purity);

        let call = expr(json!({"kind": "call_function", "function": "score"}));
        let err = reject_impure(&call, "Card stat expressions").unwrap_err();
        assert_eq!(err.message, "Card stat expressions cannot call functions");
    }

    #[test]
    fn calls_are_found_at_any_depth() {
        let nested = [
            json!({"kind": "unary", "op": "neg", "operand": tool_call()}),
            json!({"kind": "comparison", "op": "gt",
                   "left": {"kind": "literal", "value": 1}, "right": tool_call()}),
            json!({"kind": "list", "items": [{"kind": "literal", "value": 1}, tool_call()]}),
            json!({"kind": "map", "entries": [
                {"key": {"kind": "literal", "value": "k"}, "value": tool_call()}]}),
            json!({"kind": "list_op", "op": "get",
                   "target": {"kind": "state_path", "path": ["xs"]}, "index": tool_call()}),
            json!({"kind": "map_op", "op": "set", "target": {"kind": "map", "entries": []},
                   "key": {"kind": "literal", "value": "k"}, "value": tool_call()}),
            json!({"kind": "list_map", "target": {"kind": "state_path", "path": ["xs"]},
                   "var": "x", "body": tool_call()}),
            json!({"kind": "list_filter", "target": tool_call(), "var": "x",
                   "predicate": {"kind": "literal", "value": true}}),
            json!({"kind": "list_reduce", "target": {"kind": "state_path", "path": ["xs"]},
                   "acc": "a", "var": "x", "start": {"kind": "literal", "value": 0},
                   "body": {"kind": "binary", "op": "add",
                            "left": {"kind": "name", "name": "a"},
                            "right": {"kind": "list", "items": [
                                {"kind": "map", "entries": [
                                    {"key": {"kind": "literal", "value": "deep"},
                                     "value": tool_call()}]}]}}}),
        ];
        for case in nested {
            let err = reject_impure(&expr(case.clone()), "Card stat expressions");
            assert!(err.is_err(), "missed call in {case}");
        }
    }

    #[test]
    fn state_paths_are_required_where_declared() {
        let span = Span { line: 2, column: 1 };
        let literal = expr(json!({"kind": "literal", "value": "x"}));
        let err = require_state_path(&literal, "Chat messages source", span).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StateBinding);
        assert_eq!(err.line, Some(2));
        let path = expr(json!({"kind": "state_path", "path": ["chat", "messages"]}));
        assert_eq!(require_state_path(&path, "x", span).unwrap(), vec!["chat", "messages"]);
    }
}
