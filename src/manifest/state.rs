//! Read-only view over the runtime state snapshot and declared defaults.
//!
//! Lookups try the snapshot first, then the page's `state_defaults`, then
//! the app's. Nothing here writes back into the snapshot.
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{CompileError, Result};
use crate::ir::{self, render_state_path};

#[derive(Debug, Clone, Copy)]
pub struct StateContext<'a> {
    snapshot: &'a Value,
    page_defaults: &'a IndexMap<String, Value>,
    app_defaults: &'a IndexMap<String, Value>,
}

impl<'a> StateContext<'a> {
    pub fn new(
        snapshot: &'a Value,
        page_defaults: &'a IndexMap<String, Value>,
        app_defaults: &'a IndexMap<String, Value>,
    ) -> Self {
        Self { snapshot, page_defaults, app_defaults }
    }

    pub fn lookup(&self, path: &[String]) -> Option<&'a Value> {
        descend(self.snapshot, path)
            .or_else(|| descend_defaults(self.page_defaults, path))
            .or_else(|| descend_defaults(self.app_defaults, path))
    }

    /// A list bound to `path`. Missing and `null` read as empty.
    pub fn read_list(&self, path: &[String], what: &str) -> Result<Vec<Value>> {
        match self.lookup(path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(CompileError::state_binding(format!(
                "{what} {} must be a list",
                render_state_path(path)
            ))),
        }
    }
}

fn descend<'v>(root: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn descend_defaults<'v>(defaults: &'v IndexMap<String, Value>, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    descend(defaults.get(first)?, rest)
}

/// `{app, pages: {name: defaults}}`; pages without defaults are left out.
pub fn manifest_state_defaults(program: &ir::Program) -> Value {
    let to_object = |defaults: &IndexMap<String, Value>| {
        Value::Object(defaults.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    };
    let pages: Map<String, Value> = program
        .pages
        .iter()
        .filter(|page| !page.state_defaults.is_empty())
        .map(|page| (page.name.clone(), to_object(&page.state_defaults)))
        .collect();
    let mut out = Map::new();
    out.insert("app".to_owned(), to_object(&program.state_defaults));
    out.insert("pages".to_owned(), Value::Object(pages));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> Vec<String> {
        raw.split('.').map(str::to_owned).collect()
    }

    fn defaults(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn snapshot_then_page_then_app() {
        let snapshot = json!({"user": {"name": "Ada"}});
        let page = defaults(json!({"user": {"name": "Page default", "role": "viewer"}, "filter": "open"}));
        let app = defaults(json!({"filter": "all", "theme": "dark"}));
        let state = StateContext::new(&snapshot, &page, &app);

        assert_eq!(state.lookup(&path("user.name")), Some(&json!("Ada")));
        assert_eq!(state.lookup(&path("user.role")), Some(&json!("viewer")));
        assert_eq!(state.lookup(&path("filter")), Some(&json!("open")));
        assert_eq!(state.lookup(&path("theme")), Some(&json!("dark")));
        assert_eq!(state.lookup(&path("missing")), None);
    }

    #[test]
    fn lists_index_by_position() {
        let snapshot = json!({"items": [{"id": 1}, {"id": 2}]});
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        assert_eq!(state.lookup(&path("items.1.id")), Some(&json!(2)));
    }

    #[test]
    fn read_list_rejects_scalars() {
        let snapshot = json!({"items": 3});
        let empty = IndexMap::new();
        let state = StateContext::new(&snapshot, &empty, &empty);
        assert!(state.read_list(&path("nothing"), "Messages").unwrap().is_empty());
        let err = state.read_list(&path("items"), "Messages").unwrap_err();
        assert_eq!(err.message, "Messages state.items must be a list");
    }
}
