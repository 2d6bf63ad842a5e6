//! Per-page build context and the recursive element walk.
//!
//! One [`BuildCtx`] exists per page; the set of claimed action ids is
//! borrowed from the enclosing build and shared by every page of it.
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value, json};
use tracing::trace;

use crate::error::{CompileError, ErrorKind, Result};
use crate::ir;

use super::BuildOptions;
use super::elements::{self, ActionMap, Built, Node};
use super::eval::total_order;
use super::ids;
use super::state::StateContext;
use super::storage::{RecordScope, Row, Storage};
use super::theme;
use super::visibility::{evaluate_predicate, evaluate_visibility};

pub struct BuildCtx<'a> {
    pub program: &'a ir::Program,
    pub page: &'a ir::Page,
    pub slug: String,
    pub state: StateContext<'a>,
    pub storage: &'a dyn Storage,
    pub options: &'a BuildOptions,
    /// Action ids claimed so far in this build, across pages, in claim order.
    pub taken: &'a mut IndexSet<String>,
    pub page_tokens: IndexMap<String, String>,
}

pub fn duplicate_action(id: &str) -> CompileError {
    CompileError::new(
        ErrorKind::ActionCollision,
        format!("Duplicate action id '{id}'. Use a unique id or omit to auto-generate."),
    )
    .with_details("duplicate_action_id", Some(id))
}

impl BuildCtx<'_> {
    /// Claims `page.<slug>.<kind>.<key>`, suffixed when already taken.
    pub fn allocate_action(&mut self, kind: &str, key: &str, element_id: &str) -> String {
        let base = ids::action_base_id(&self.slug, kind, key);
        let id = ids::allocate_action_id(base, element_id, self.taken);
        trace!(action_id = %id, element_id, "allocated action id");
        id
    }

    /// Claims an author-supplied id verbatim. Collisions surface in
    /// [`BuildCtx::build_children`].
    pub fn claim_explicit(&mut self, id: &str) -> String {
        self.taken.insert(id.to_owned());
        id.to_owned()
    }

    /// Initial rows of `record`, ordered by its id field.
    pub fn read_rows(&self, record: &str) -> Result<Vec<Row>> {
        let schema = self
            .program
            .records
            .get(record)
            .ok_or_else(|| CompileError::internal(format!("record '{record}' vanished after lowering")))?;
        let scope = RecordScope::for_identity(record, self.options.identity.as_ref());
        let mut rows = self.storage.list_records(schema, &scope, Some(self.options.row_limit))?;
        if let Some(id_field) = schema.id_field() {
            rows.sort_by(|a, b| {
                total_order(a.get(id_field).unwrap_or(&Value::Null), b.get(id_field).unwrap_or(&Value::Null))
            });
        }
        trace!(record, rows = rows.len(), "read initial rows");
        Ok(rows)
    }

    /// Builds a sibling list. Child `i` sits at `prefix + [i]`.
    pub fn build_children(
        &mut self,
        items: &[ir::PageItem],
        prefix: &[usize],
        parent_visible: bool,
    ) -> Result<(Vec<Value>, ActionMap)> {
        let mut elements = Vec::with_capacity(items.len());
        let mut actions = ActionMap::new();
        for (index, item) in items.iter().enumerate() {
            // Claims only grow, so anything indexed below the mark predates this child.
            let mark = self.taken.len();
            let mut path = prefix.to_vec();
            path.push(index);
            let (element, child_actions, child_visible) = self.build_item(item, path, parent_visible)?;
            for (id, action) in child_actions {
                let claimed_earlier = self.taken.get_index_of(&id).is_some_and(|at| at < mark);
                if claimed_earlier || actions.contains_key(&id) {
                    return Err(duplicate_action(&id).at(item.meta.span));
                }
                // Hidden elements keep their ids claimed but register nothing.
                if child_visible {
                    actions.insert(id, action);
                }
            }
            elements.push(element);
        }
        Ok((elements, actions))
    }

    /// Builds one element. Its actions come back unfiltered, together with
    /// its effective visibility.
    pub fn build_item(
        &mut self,
        item: &ir::PageItem,
        path: Vec<usize>,
        parent_visible: bool,
    ) -> Result<(Value, ActionMap, bool)> {
        let meta = &item.meta;
        let span = meta.span;
        let tag = elements::type_tag(&item.kind);
        let element_id = ids::element_id(&self.slug, tag, &path);

        let visibility = evaluate_visibility(meta.visibility.as_ref(), meta.visibility_rule.as_ref(), &self.state, span)?;
        let show_when = meta
            .show_when
            .as_ref()
            .map(|expr| evaluate_predicate(expr, &self.state, span))
            .transpose()?;
        let own = visibility.as_ref().is_none_or(|v| v.visible) && show_when.as_ref().is_none_or(|v| v.visible);
        let visible = parent_visible && own;

        let node = Node { item, path, element_id, visible };
        let Built { element: fields, mut actions } = elements::dispatch(self, &node).map_err(|err| err.or_at(span))?;

        let mut element = Map::new();
        element.insert("type".to_owned(), json!(tag));
        element.insert("element_id".to_owned(), json!(node.element_id));
        element.insert("page".to_owned(), json!(self.page.name));
        element.insert("page_slug".to_owned(), json!(self.slug));
        element.insert("index".to_owned(), json!(node.path.last().copied().unwrap_or(0)));
        element.insert("line".to_owned(), json!(span.line));
        element.insert("column".to_owned(), json!(span.column));
        element.extend(fields);

        if let Some(origin) = &meta.origin {
            element.insert("origin".to_owned(), json!(origin));
        }
        if meta.debug_only {
            element.insert("debug_only".to_owned(), Value::Bool(true));
            for action in actions.values_mut() {
                if let Value::Object(action) = action {
                    action.insert("debug_only".to_owned(), Value::Bool(true));
                }
            }
        }
        element.insert("visible".to_owned(), Value::Bool(visible));
        if let Some(evaluated) = visibility {
            element.insert("visibility".to_owned(), evaluated.info);
        }
        if let Some(evaluated) = show_when {
            element.insert("show_when".to_owned(), evaluated.info);
        }
        if !meta.theme_overrides.is_empty() {
            let tokens = theme::apply_overrides(&self.page_tokens, &meta.theme_overrides, &node.element_id)
                .map_err(|err| err.at(span))?;
            element.insert("theme_overrides".to_owned(), theme::tokens_value(&meta.theme_overrides));
            element.insert("theme".to_owned(), theme::tokens_value(&tokens));
        }

        Ok((Value::Object(element), actions, visible))
    }
}
