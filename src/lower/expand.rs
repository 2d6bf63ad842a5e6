//! UI-pack and pattern expansion.
//!
//! Runs on the AST before lowering. `use_ui_pack` splices a named fragment
//! from a pack; `use_pattern` substitutes `{"$param": name}` holes in the
//! pattern's raw item JSON and decodes the result. Both recurse (fragments
//! and patterns may use other fragments and patterns), both are
//! cycle-checked, and every produced node is tagged with an `origin` unless
//! an inner expansion already tagged it.
//!
//! Placement rules that only make sense on the expanded tree (tabs and
//! overlays at the page root) are enforced here as well.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::ast::{self, ItemKind as A, PageItem, PatternDecl, Span, UiPackDecl};
use crate::error::{CompileError, ErrorKind, Result};
use crate::suggest::did_you_mean;

use super::refs::unknown_reference;
use super::Lowerer;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

const PARAM_HOLE: &str = "$param";
const PARAM_TYPES: &[&str] = &["text", "number", "boolean", "record", "page", "flow"];

pub struct Expander<'p> {
    packs: IndexMap<&'p str, &'p UiPackDecl>,
    patterns: IndexMap<&'p str, &'p PatternDecl>,
    known: &'p Lowerer,
}

/// Active expansions, innermost last.
#[derive(Default)]
struct Stack {
    packs: Vec<String>,
    patterns: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'p> Expander<'p> {
    pub fn new(program: &'p ast::Program, known: &'p Lowerer) -> Result<Self> {
        let mut packs = IndexMap::new();
        for pack in &program.ui_packs {
            let mut fragments = BTreeSet::new();
            for fragment in &pack.fragments {
                if !fragments.insert(fragment.name.as_str()) {
                    return Err(CompileError::structure(format!(
                        "ui_pack '{}' declares fragment '{}' more than once",
                        pack.name, fragment.name
                    ))
                    .at(Span { line: pack.line, column: pack.column }));
                }
            }
            if packs.insert(pack.name.as_str(), pack).is_some() {
                return Err(CompileError::structure(format!(
                    "ui_pack '{}' is declared more than once",
                    pack.name
                ))
                .at(Span { line: pack.line, column: pack.column }));
            }
        }

        let mut patterns = IndexMap::new();
        for pattern in &program.patterns {
            let span = Span { line: pattern.line, column: pattern.column };
            for param in &pattern.params {
                if !PARAM_TYPES.contains(&param.type_name.as_str()) {
                    return Err(CompileError::structure(format!(
                        "Pattern '{}' parameter '{}' has unsupported type '{}'",
                        pattern.name, param.name, param.type_name
                    ))
                    .at(span));
                }
            }
            if patterns.insert(pattern.name.as_str(), pattern).is_some() {
                return Err(CompileError::structure(format!(
                    "Pattern '{}' is declared more than once",
                    pattern.name
                ))
                .at(span));
            }
        }

        Ok(Self { packs, patterns, known })
    }

    /// Expands one root item list of `page`.
    pub fn expand_page(&self, page: &str, items: &[PageItem]) -> Result<Vec<PageItem>> {
        self.expand_list(page, items, &[], true, &mut Stack::default())
    }

    fn expand_list(
        &self,
        page: &str,
        items: &[PageItem],
        prefix: &[usize],
        at_root: bool,
        stack: &mut Stack,
    ) -> Result<Vec<PageItem>> {
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut path = prefix.to_vec();
            path.push(index);
            match &item.kind {
                A::UsePack { pack, fragment } => {
                    out.extend(self.expand_pack(page, pack, fragment, item.span(), &path, at_root, stack)?);
                }
                A::UsePattern { pattern, arguments } => {
                    out.extend(self.expand_pattern(page, pattern, arguments, item.span(), &path, at_root, stack)?);
                }
                kind => {
                    check_placement(kind, at_root, item.span())?;
                    let mut item = item.clone();
                    for list in item.kind.child_lists_mut() {
                        *list = self.expand_list(page, list, &path, false, stack)?;
                    }
                    out.push(item);
                }
            }
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_pack(
        &self,
        page: &str,
        pack: &str,
        fragment: &str,
        span: Span,
        path: &[usize],
        at_root: bool,
        stack: &mut Stack,
    ) -> Result<Vec<PageItem>> {
        let decl = self.packs.get(pack).ok_or_else(|| {
            let hint = did_you_mean(pack, self.packs.keys().copied());
            CompileError::reference(format!("Unknown ui_pack '{pack}' on page '{page}'.{hint}"))
                .with_details("unknown_ui_pack", Some(pack))
                .at(span)
        })?;
        let frag = decl.fragments.iter().find(|f| f.name == fragment).ok_or_else(|| {
            let hint = did_you_mean(fragment, decl.fragments.iter().map(|f| f.name.as_str()));
            CompileError::reference(format!(
                "ui_pack '{pack}' has no fragment '{fragment}' (page '{page}').{hint}"
            ))
            .with_details("unknown_ui_pack_fragment", Some(fragment))
            .at(span)
        })?;

        let key = format!("{pack}:{fragment}");
        if let Some(start) = stack.packs.iter().position(|active| *active == key) {
            let mut chain = stack.packs[start..].to_vec();
            chain.push(key);
            return Err(CompileError::new(
                ErrorKind::Cycle,
                format!("ui_pack expansion cycle detected: {}", chain.join(" -> ")),
            )
            .at(span));
        }
        trace!(pack, fragment, page, "expanding ui_pack fragment");

        stack.packs.push(key);
        let expanded = self.expand_list(page, &frag.items, path, at_root, stack);
        stack.packs.pop();
        let mut expanded = expanded?;

        let origin: IndexMap<String, Value> = IndexMap::from([
            ("pack".to_owned(), Value::from(pack)),
            ("version".to_owned(), Value::from(decl.version.as_str())),
            ("fragment".to_owned(), Value::from(fragment)),
        ]);
        for item in &mut expanded {
            tag_origin(item, &origin);
        }
        Ok(expanded)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_pattern(
        &self,
        page: &str,
        pattern: &str,
        arguments: &IndexMap<String, Value>,
        span: Span,
        path: &[usize],
        at_root: bool,
        stack: &mut Stack,
    ) -> Result<Vec<PageItem>> {
        let decl = self.patterns.get(pattern).ok_or_else(|| {
            let hint = did_you_mean(pattern, self.patterns.keys().copied());
            CompileError::reference(format!("Unknown pattern '{pattern}' on page '{page}'.{hint}"))
                .with_details("unknown_pattern", Some(pattern))
                .at(span)
        })?;
        let values = self.bind_arguments(decl, arguments).map_err(|err| err.at(span))?;

        if let Some(start) = stack.patterns.iter().position(|active| active == pattern) {
            let mut chain = stack.patterns[start..].to_vec();
            chain.push(pattern.to_owned());
            return Err(CompileError::new(
                ErrorKind::Cycle,
                format!("Pattern expansion cycle detected: {}", chain.join(" -> ")),
            )
            .at(span));
        }
        trace!(pattern, page, "expanding pattern");

        let mut decoded = Vec::with_capacity(decl.items.len());
        for raw in &decl.items {
            let value = substitute(raw, pattern, &values).map_err(|err| err.at(span))?;
            let mut item: PageItem = serde_path_to_error::deserialize(value).map_err(|err| {
                CompileError::structure(format!(
                    "Pattern '{pattern}' produced an invalid item at {}: {}",
                    err.path(),
                    err.inner()
                ))
                .at(span)
            })?;
            if item.meta.line == 0 {
                item.meta.line = span.line;
                item.meta.column = span.column;
            }
            decoded.push(item);
        }

        stack.patterns.push(pattern.to_owned());
        let expanded = self.expand_list(page, &decoded, path, at_root, stack);
        stack.patterns.pop();
        let mut expanded = expanded?;

        let invocation = path.iter().map(usize::to_string).collect::<Vec<_>>().join(".");
        let origin: IndexMap<String, Value> = IndexMap::from([
            ("pattern".to_owned(), Value::from(pattern)),
            ("invocation".to_owned(), Value::from(format!("{page}:{invocation}"))),
            (
                "arguments".to_owned(),
                Value::Object(arguments.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            ),
        ]);
        for item in &mut expanded {
            tag_origin(item, &origin);
        }
        Ok(expanded)
    }

    /// Checks arguments against the declared parameters and fills defaults.
    fn bind_arguments(
        &self,
        decl: &PatternDecl,
        arguments: &IndexMap<String, Value>,
    ) -> Result<IndexMap<String, Value>> {
        let pattern = &decl.name;
        for name in arguments.keys() {
            if !decl.params.iter().any(|param| &param.name == name) {
                let hint = did_you_mean(name, decl.params.iter().map(|param| param.name.as_str()));
                return Err(CompileError::reference(format!(
                    "Pattern '{pattern}' has no parameter '{name}'.{hint}"
                ))
                .with_details("unknown_pattern_parameter", Some(name)));
            }
        }

        let mut values = IndexMap::new();
        for param in &decl.params {
            let value = match (arguments.get(&param.name), &param.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) if param.required => {
                    return Err(CompileError::structure(format!(
                        "Pattern '{pattern}' is missing required argument '{}'",
                        param.name
                    )));
                }
                (None, None) => continue,
            };
            self.check_argument_type(pattern, &param.name, &param.type_name, &value)?;
            values.insert(param.name.clone(), value);
        }
        Ok(values)
    }

    fn check_argument_type(&self, pattern: &str, name: &str, type_name: &str, value: &Value) -> Result<()> {
        let subject = format!("Pattern '{pattern}' argument '{name}'");
        let mismatch = || CompileError::structure(format!("{subject} must be a {type_name} value"));
        match type_name {
            "text" => value.is_string().then_some(()).ok_or_else(mismatch),
            "number" => value.is_number().then_some(()).ok_or_else(mismatch),
            "boolean" => value.is_boolean().then_some(()).ok_or_else(mismatch),
            "record" | "page" | "flow" => {
                let target = value.as_str().ok_or_else(mismatch)?;
                let known: Vec<&str> = match type_name {
                    "record" => self.known.records.keys().map(String::as_str).collect(),
                    "page" => self.known.pages.iter().map(String::as_str).collect(),
                    _ => self.known.flows.iter().map(String::as_str).collect(),
                };
                if known.contains(&target) {
                    Ok(())
                } else {
                    Err(unknown_reference(&subject, type_name, target, known.iter().copied()))
                }
            }
            other => Err(CompileError::internal(format!("unsupported pattern parameter type '{other}'"))),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_placement(kind: &A, at_root: bool, span: Span) -> Result<()> {
    if at_root {
        return Ok(());
    }
    match kind {
        A::Tabs { .. } => Err(CompileError::structure("Tabs may only appear at the page root").at(span)),
        A::Modal { .. } | A::Drawer { .. } => {
            Err(CompileError::structure("Overlays may only appear at the page root").at(span))
        }
        _ => Ok(()),
    }
}

/// A hole is an object whose only key is `$param`.
fn as_hole(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(PARAM_HOLE).and_then(Value::as_str),
        _ => None,
    }
}

/// Replaces every hole. Optional parameters without a value become
/// `pattern_param` expressions, which lowering rejects wherever they land.
fn substitute(value: &Value, pattern: &str, values: &IndexMap<String, Value>) -> Result<Value> {
    if let Some(name) = as_hole(value) {
        return match values.get(name) {
            Some(bound) => Ok(bound.clone()),
            None => Ok(serde_json::json!({"kind": "pattern_param", "name": name})),
        };
    }
    Ok(match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute(item, pattern, values))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                if key == PARAM_HOLE {
                    return Err(CompileError::structure(format!(
                        "Pattern '{pattern}' has a malformed parameter hole"
                    )));
                }
                out.insert(key.clone(), substitute(item, pattern, values)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn tag_origin(item: &mut PageItem, origin: &IndexMap<String, Value>) {
    if item.meta.origin.is_none() {
        item.meta.origin = Some(origin.clone());
    }
    for list in item.kind.child_lists_mut() {
        for child in list.iter_mut() {
            tag_origin(child, origin);
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
