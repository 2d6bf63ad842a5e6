//! Pure expression evaluation against the runtime state.
//!
//! Used for visibility predicates, show-when clauses, conditional blocks,
//! card stats and custom component props. Calls are never evaluated;
//! lowering has already rejected them in every position that reaches here.
use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use crate::ast::{BinaryOp, CompareOp, Expr, ListOpKind, Literal, MapEntry, MapOpKind, UnaryOp};
use crate::error::{CompileError, ErrorKind, Result};
use crate::ir::render_state_path;
use crate::lower::expr::walk;

use super::state::StateContext;

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

pub fn evaluate(expr: &Expr, state: &StateContext<'_>) -> Result<Value> {
    Evaluator { state, scope: Vec::new() }.eval(expr)
}

pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(flag) => Value::Bool(*flag),
        Literal::Number(number) => number_value(number.0).unwrap_or(Value::Null),
        Literal::Text(text) => Value::String(text.clone()),
    }
}

/// Every state path read by `expr`, rendered and in first-use order.
pub fn state_paths(expr: &Expr) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let _ = walk(expr, &mut |node: &Expr| {
        if let Expr::StatePath { path } = node {
            let rendered = render_state_path(path);
            if !paths.contains(&rendered) {
                paths.push(rendered);
            }
        }
        Ok(())
    });
    paths
}

/// Source-like rendering used in visibility diagnostics.
pub fn render(expr: &Expr) -> String {
    let list = |items: &[Expr]| items.iter().map(render).collect::<Vec<_>>().join(", ");
    match expr {
        Expr::Literal { value } => render_literal(value),
        Expr::StatePath { path } => render_state_path(path),
        Expr::Name { name } => name.clone(),
        Expr::Unary { op: UnaryOp::Not, operand } => format!("not {}", render(operand)),
        Expr::Unary { op: UnaryOp::Neg, operand } => format!("-{}", render(operand)),
        Expr::Binary { op, left, right } => {
            let op = match op {
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Mod => "%",
            };
            format!("({} {op} {})", render(left), render(right))
        }
        Expr::Comparison { op, left, right } => {
            let op = match op {
                CompareOp::Eq => "==",
                CompareOp::Ne => "!=",
                CompareOp::Gt => ">",
                CompareOp::Lt => "<",
                CompareOp::Gte => ">=",
                CompareOp::Lte => "<=",
                CompareOp::In => "in",
                CompareOp::Nin => "not in",
            };
            format!("{} {op} {}", render(left), render(right))
        }
        Expr::List { items } => format!("[{}]", list(items)),
        Expr::Map { entries } => {
            let entries: Vec<String> = entries
                .iter()
                .map(|MapEntry { key, value }| format!("{}: {}", render(key), render(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Expr::ListOp { op, target, value, index } => {
            let mut args = vec![render(target)];
            args.extend([value, index].into_iter().flatten().map(|e| render(e)));
            format!("list.{}({})", list_op_name(*op), args.join(", "))
        }
        Expr::MapOp { op, target, key, value } => {
            let mut args = vec![render(target)];
            args.extend([key, value].into_iter().flatten().map(|e| render(e)));
            format!("map.{}({})", map_op_name(*op), args.join(", "))
        }
        Expr::ListMap { target, var, body } => format!("map({}, {var} => {})", render(target), render(body)),
        Expr::ListFilter { target, var, predicate } => {
            format!("filter({}, {var} => {})", render(target), render(predicate))
        }
        Expr::ListReduce { target, acc, var, start, body } => format!(
            "reduce({}, {}, ({acc}, {var}) => {})",
            render(target),
            render(start),
            render(body)
        ),
        Expr::ToolCall { tool, arguments } => format!("call tool {tool}({})", list(arguments)),
        Expr::CallFunction { function, arguments } => format!("{function}({})", list(arguments)),
        Expr::PatternParam { name } => format!("{{{name}}}"),
    }
}

pub fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Text(text) => Value::String(text.clone()).to_string(),
        other => literal_value(other).to_string(),
    }
}

/// Total order used for row sorting: null < bool < number < text < list < map.
pub fn total_order(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().unwrap_or(0.0).total_cmp(&b.as_f64().unwrap_or(0.0))
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Equality with numbers compared by value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b)),
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

struct Evaluator<'s, 'a> {
    state: &'s StateContext<'a>,
    /// Variables bound by map/filter/reduce, innermost last.
    scope: Vec<(String, Value)>,
}

fn eval_error(message: impl Into<String>) -> CompileError {
    CompileError::state_binding(message)
}

impl Evaluator<'_, '_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value } => Ok(literal_value(value)),
            Expr::StatePath { path } => self.state.lookup(path).cloned().ok_or_else(|| {
                eval_error(format!("Unknown state path '{}'", render_state_path(path)))
            }),
            Expr::Name { name } => self
                .scope
                .iter()
                .rev()
                .find(|(bound, _)| bound == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| eval_error(format!("Unknown variable '{name}'"))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, &value) {
                    (UnaryOp::Not, Value::Bool(flag)) => Ok(Value::Bool(!flag)),
                    (UnaryOp::Neg, Value::Number(_)) => number_value(-as_number(&value, "-")?),
                    (UnaryOp::Not, other) => Err(eval_error(format!("'not' needs a boolean, got {}", type_name(other)))),
                    (UnaryOp::Neg, other) => Err(eval_error(format!("'-' needs a number, got {}", type_name(other)))),
                }
            }
            Expr::Binary { op: BinaryOp::And, left, right } => {
                if !self.eval_bool(left, "and")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_bool(right, "and")?))
            }
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                if self.eval_bool(left, "or")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_bool(right, "or")?))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                arithmetic(*op, &left, &right)
            }
            Expr::Comparison { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            Expr::List { items } => items.iter().map(|item| self.eval(item)).collect::<Result<Vec<_>>>().map(Value::Array),
            Expr::Map { entries } => {
                let mut map = Map::new();
                for MapEntry { key, value } in entries {
                    let key = match self.eval(key)? {
                        Value::String(key) => key,
                        other => return Err(eval_error(format!("Map keys must be text, got {}", type_name(&other)))),
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::ListOp { op, target, value, index } => {
                let target = self.eval(target)?;
                let Value::Array(items) = target else {
                    return Err(eval_error(format!("list.{} needs a list, got {}", list_op_name(*op), type_name(&target))));
                };
                let value = value.as_deref().map(|e| self.eval(e)).transpose()?;
                let index = index.as_deref().map(|e| self.eval(e)).transpose()?;
                list_op(*op, items, value, index)
            }
            Expr::MapOp { op, target, key, value } => {
                let target = self.eval(target)?;
                let Value::Object(map) = target else {
                    return Err(eval_error(format!("map.{} needs a map, got {}", map_op_name(*op), type_name(&target))));
                };
                let key = key.as_deref().map(|e| self.eval(e)).transpose()?;
                let value = value.as_deref().map(|e| self.eval(e)).transpose()?;
                map_op(*op, map, key, value)
            }
            Expr::ListMap { target, var, body } => {
                let items = self.eval_list(target, "map")?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.with_binding(var, item, |this| this.eval(body))?);
                }
                Ok(Value::Array(out))
            }
            Expr::ListFilter { target, var, predicate } => {
                let items = self.eval_list(target, "filter")?;
                let mut out = Vec::new();
                for item in items {
                    if self.with_binding(var, item.clone(), |this| this.eval_bool(predicate, "filter"))? {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            Expr::ListReduce { target, acc, var, start, body } => {
                let items = self.eval_list(target, "reduce")?;
                let mut total = self.eval(start)?;
                for item in items {
                    self.scope.push((acc.clone(), total));
                    let result = self.with_binding(var, item, |this| this.eval(body));
                    self.scope.pop();
                    total = result?;
                }
                Ok(total)
            }
            Expr::ToolCall { tool, .. } => Err(CompileError::new(
                ErrorKind::Purity,
                format!("Tool '{tool}' cannot be called while building a manifest"),
            )),
            Expr::CallFunction { function, .. } => Err(CompileError::new(
                ErrorKind::Purity,
                format!("Function '{function}' cannot be called while building a manifest"),
            )),
            Expr::PatternParam { name } => {
                Err(CompileError::internal(format!("Pattern parameter '{name}' reached manifest evaluation")))
            }
        }
    }

    fn eval_bool(&mut self, expr: &Expr, context: &str) -> Result<bool> {
        match self.eval(expr)? {
            Value::Bool(flag) => Ok(flag),
            other => Err(eval_error(format!("'{context}' needs booleans, got {}", type_name(&other)))),
        }
    }

    fn eval_list(&mut self, expr: &Expr, context: &str) -> Result<Vec<Value>> {
        match self.eval(expr)? {
            Value::Array(items) => Ok(items),
            other => Err(eval_error(format!("{context} needs a list, got {}", type_name(&other)))),
        }
    }

    fn with_binding<T>(&mut self, name: &str, value: Value, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scope.push((name.to_owned(), value));
        let result = f(self);
        self.scope.pop();
        result
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Integral results stay integers so `2 + 2` renders as `4`.
fn number_value(number: f64) -> Result<Value> {
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::from(number as i64));
    }
    Number::from_f64(number)
        .map(Value::Number)
        .ok_or_else(|| eval_error("Expression produced a number that is not finite"))
}

fn as_number(value: &Value, op: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| eval_error(format!("'{op}' needs numbers, got {}", type_name(value))))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (op, left, right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => Ok(Value::Array(a.iter().chain(b).cloned().collect())),
        _ => {
            let symbol = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Mod => "%",
                BinaryOp::And | BinaryOp::Or => return Err(CompileError::internal("logical operator in arithmetic")),
            };
            let a = as_number(left, symbol)?;
            let b = as_number(right, symbol)?;
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
                return Err(eval_error("Division by zero"));
            }
            number_value(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::Ne => Ok(!values_equal(left, right)),
        CompareOp::In => contains(right, left),
        CompareOp::Nin => contains(right, left).map(|found| !found),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Gte | CompareOp::Lte => {
            let ordering = match (left, right) {
                (Value::Number(_), Value::Number(_)) => as_number(left, "compare")?.partial_cmp(&as_number(right, "compare")?),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                eval_error(format!("Cannot compare {} with {}", type_name(left), type_name(right)))
            })?;
            Ok(match op {
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Gte => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match (haystack, needle) {
        (Value::Array(items), _) => Ok(items.iter().any(|item| values_equal(item, needle))),
        (Value::String(text), Value::String(part)) => Ok(text.contains(part.as_str())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(eval_error(format!(
            "'in' cannot look for {} inside {}",
            type_name(needle),
            type_name(haystack)
        ))),
    }
}

fn list_op(op: ListOpKind, mut items: Vec<Value>, value: Option<Value>, index: Option<Value>) -> Result<Value> {
    let required = |arg: Option<Value>, what: &str| {
        arg.ok_or_else(|| eval_error(format!("list.{} needs {what}", list_op_name(op))))
    };
    match op {
        ListOpKind::Length => Ok(Value::from(items.len())),
        ListOpKind::First => Ok(items.into_iter().next().unwrap_or(Value::Null)),
        ListOpKind::Last => Ok(items.pop().unwrap_or(Value::Null)),
        ListOpKind::Append => {
            items.push(required(value, "a value")?);
            Ok(Value::Array(items))
        }
        ListOpKind::Contains => {
            let value = required(value, "a value")?;
            Ok(Value::Bool(items.iter().any(|item| values_equal(item, &value))))
        }
        ListOpKind::Get => {
            let index = required(index, "an index")?;
            let position = index
                .as_f64()
                .filter(|i| i.fract() == 0.0 && *i >= 0.0)
                .ok_or_else(|| eval_error(format!("List index must be a whole number, got {}", type_name(&index))))?;
            items
                .into_iter()
                .nth(position as usize)
                .ok_or_else(|| eval_error(format!("List index {position} is out of range")))
        }
    }
}

fn map_op(op: MapOpKind, mut map: Map<String, Value>, key: Option<Value>, value: Option<Value>) -> Result<Value> {
    let want_key = |key: Option<Value>| match key {
        Some(Value::String(key)) => Ok(key),
        Some(other) => Err(eval_error(format!("Map keys must be text, got {}", type_name(&other)))),
        None => Err(eval_error(format!("map.{} needs a key", map_op_name(op)))),
    };
    match op {
        MapOpKind::Keys => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        MapOpKind::Get => Ok(map.get(&want_key(key)?).cloned().unwrap_or(Value::Null)),
        MapOpKind::Has => Ok(Value::Bool(map.contains_key(&want_key(key)?))),
        MapOpKind::Set => {
            let key = want_key(key)?;
            let value = value.ok_or_else(|| eval_error("map.set needs a value"))?;
            map.insert(key, value);
            Ok(Value::Object(map))
        }
    }
}

fn list_op_name(op: ListOpKind) -> &'static str {
    match op {
        ListOpKind::Get => "get",
        ListOpKind::Length => "length",
        ListOpKind::Append => "append",
        ListOpKind::Contains => "contains",
        ListOpKind::First => "first",
        ListOpKind::Last => "last",
    }
}

fn map_op_name(op: MapOpKind) -> &'static str {
    match op {
        MapOpKind::Get => "get",
        MapOpKind::Set => "set",
        MapOpKind::Has => "has",
        MapOpKind::Keys => "keys",
    }
}

// ------------------------------- Tests ------------------------------------ //
