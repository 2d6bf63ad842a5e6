//! Collections and data-bound views: tables, lists, forms, views, charts and
//! chat blocks.
use std::collections::BTreeSet;

use crate::ast::{self, ColumnDirective, EntryActionDecl, Expr, ListMappingDecl, PaginationDecl, SortDecl, Span};
use crate::error::{CompileError, Result};
use crate::ir::{self, DataSource, ItemKind as I, Selection};

use super::expr::require_state_path;
use super::{Lowerer, PageCtx};

/// Field types a table may sort on.
const COMPARABLE_TYPES: &[&str] = &["text", "string", "str", "number", "int", "integer", "boolean", "bool"];
const CHART_TYPES: &[&str] = &["bar", "line", "pie", "summary"];
/// Records with at least this many fields are viewed as tables.
const VIEW_TABLE_MIN_FIELDS: usize = 4;

pub struct TableDecl<'a> {
    pub record: Option<&'a str>,
    pub source: Option<&'a Expr>,
    pub columns: &'a [ColumnDirective],
    pub empty_text: &'a Option<String>,
    pub empty_state_hidden: bool,
    pub sort: Option<&'a SortDecl>,
    pub pagination: Option<&'a PaginationDecl>,
    pub selection: Option<&'a str>,
    pub row_actions: &'a [EntryActionDecl],
}

pub struct ListDecl<'a> {
    pub record: Option<&'a str>,
    pub source: Option<&'a Expr>,
    pub variant: Option<&'a str>,
    pub item: Option<&'a ListMappingDecl>,
    pub empty_text: &'a Option<String>,
    pub empty_state_hidden: bool,
    pub selection: Option<&'a str>,
    pub actions: &'a [EntryActionDecl],
}

impl Lowerer {
    /// Exactly one of record / state source.
    pub fn lower_source(
        &self,
        keyword: &str,
        record: Option<&str>,
        source: Option<&Expr>,
        span: Span,
        ctx: &PageCtx,
    ) -> Result<DataSource> {
        match (record, source) {
            (Some(_), Some(_)) => Err(CompileError::state_binding(format!(
                "{keyword} must use either a record or state source, not both"
            ))
            .at(span)),
            (None, None) => Err(CompileError::state_binding(format!(
                "{keyword} must use either a record or state source"
            ))
            .at(span)),
            (Some(record), None) => {
                self.resolve_record(record, &format!("Page '{}'", ctx.page), span)?;
                Ok(DataSource::Record { name: record.to_owned() })
            }
            (None, Some(source)) => Ok(DataSource::State {
                path: require_state_path(source, &format!("{keyword} source"), span)?,
            }),
        }
    }

    pub fn lower_table(&self, decl: TableDecl<'_>, span: Span, ctx: &PageCtx) -> Result<I> {
        let source = self.lower_source("Table", decl.record, decl.source, span, ctx)?;
        if let DataSource::State { .. } = source {
            let disallowed = [
                ("sort", decl.sort.is_some()),
                ("pagination", decl.pagination.is_some()),
                ("selection", decl.selection.is_some()),
                ("row actions", !decl.row_actions.is_empty()),
            ];
            if let Some((what, _)) = disallowed.iter().find(|(_, present)| *present) {
                return Err(CompileError::state_binding(format!(
                    "Table bound to state cannot declare {what}"
                ))
                .at(span));
            }
        }

        let record = match &source {
            DataSource::Record { name } => Some(self.resolve_record(name, "Table", span)?),
            DataSource::State { .. } => None,
        };
        let columns = self.lower_columns(record, decl.columns, span)?;

        let sort = match (decl.sort, record) {
            (Some(sort), Some(record)) => {
                let field = self.resolve_field(record, &sort.by, "Table sort", span)?;
                if !COMPARABLE_TYPES.contains(&field.type_name.as_str()) {
                    return Err(CompileError::structure(format!(
                        "Table sort field '{}' is not comparable",
                        sort.by
                    ))
                    .at(span));
                }
                let order = match sort.order.as_deref() {
                    None | Some("asc") => ir::SortOrder::Asc,
                    Some("desc") => ir::SortOrder::Desc,
                    Some(other) => {
                        return Err(CompileError::structure(format!(
                            "Table sort order '{other}' must be asc or desc"
                        ))
                        .at(span));
                    }
                };
                Some(ir::TableSort { by: sort.by.clone(), order })
            }
            _ => None,
        };

        let page_size = match decl.pagination {
            Some(pagination) if pagination.page_size <= 0 => {
                return Err(CompileError::structure("Table pagination page_size must be positive").at(span));
            }
            Some(pagination) => Some(u32::try_from(pagination.page_size).unwrap_or(u32::MAX)),
            None => None,
        };

        Ok(I::Table {
            source,
            columns,
            empty_text: decl.empty_text.clone(),
            empty_state_hidden: decl.empty_state_hidden,
            sort,
            page_size,
            selection: lower_selection("Table", decl.selection, span)?,
            row_actions: self.lower_entry_actions(decl.row_actions, "Table row", ctx, span)?,
        })
    }

    /// Applies include/exclude/label directives. Record-bound tables check
    /// every field; state-bound tables only get the included columns.
    fn lower_columns(
        &self,
        record: Option<&ast::RecordSchema>,
        directives: &[ColumnDirective],
        span: Span,
    ) -> Result<Vec<ir::TableColumn>> {
        let mut included: Vec<&str> = Vec::new();
        let mut excluded: BTreeSet<&str> = BTreeSet::new();
        let mut labels: Vec<(&str, &str)> = Vec::new();
        for directive in directives {
            let (name, verb) = match directive {
                ColumnDirective::Include { name } => (name.as_str(), "included"),
                ColumnDirective::Exclude { name } => (name.as_str(), "excluded"),
                ColumnDirective::Label { name, .. } => (name.as_str(), "labelled"),
            };
            if let Some(record) = record {
                self.resolve_field(record, name, "Table", span)?;
            }
            let repeated = match directive {
                ColumnDirective::Include { .. } => included.contains(&name) || {
                    included.push(name);
                    false
                },
                ColumnDirective::Exclude { .. } => !excluded.insert(name),
                ColumnDirective::Label { label, .. } => labels.iter().any(|(n, _)| *n == name) || {
                    labels.push((name, label.as_str()));
                    false
                },
            };
            if repeated {
                return Err(CompileError::structure(format!("Column '{name}' is {verb} more than once")).at(span));
            }
        }
        if let Some(name) = included.iter().find(|name| excluded.contains(*name)) {
            return Err(CompileError::structure(format!(
                "Column '{name}' cannot be both included and excluded"
            ))
            .at(span));
        }

        let names: Vec<&str> = match record {
            Some(record) if included.is_empty() => {
                record.field_names().filter(|name| !excluded.contains(name)).collect()
            }
            _ => included,
        };
        Ok(names
            .into_iter()
            .map(|name| ir::TableColumn {
                name: name.to_owned(),
                label: labels
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map_or(name, |(_, label)| *label)
                    .to_owned(),
            })
            .collect())
    }

    pub fn lower_list(&self, decl: ListDecl<'_>, span: Span, ctx: &PageCtx) -> Result<I> {
        let source = self.lower_source("List", decl.record, decl.source, span, ctx)?;
        if let DataSource::State { .. } = source {
            if decl.selection.is_some() {
                return Err(CompileError::state_binding("List bound to state cannot declare selection").at(span));
            }
            if !decl.actions.is_empty() {
                return Err(CompileError::state_binding("List bound to state cannot declare actions").at(span));
            }
        }
        let variant = match decl.variant {
            None | Some("two_line") => ir::ListVariant::TwoLine,
            Some("single_line") => ir::ListVariant::SingleLine,
            Some("icon") => ir::ListVariant::Icon,
            Some(other) => {
                return Err(CompileError::structure(format!(
                    "List variant '{other}' must be single_line, two_line or icon"
                ))
                .at(span));
            }
        };

        let item = match &source {
            DataSource::Record { name } => {
                let record = self.resolve_record(name, "List", span)?;
                let mapping = decl.item.cloned().unwrap_or_default();
                let check = |field: &Option<String>| -> Result<Option<String>> {
                    match field {
                        Some(field) => {
                            self.resolve_field(record, field, "List item mapping", span)?;
                            Ok(Some(field.clone()))
                        }
                        None => Ok(None),
                    }
                };
                let primary = match check(&mapping.primary)? {
                    Some(primary) => primary,
                    None => record
                        .field_names()
                        .find(|name| *name != "id")
                        .or_else(|| record.id_field())
                        .unwrap_or("id")
                        .to_owned(),
                };
                Some(ir::ListMapping {
                    primary,
                    secondary: check(&mapping.secondary)?,
                    meta: check(&mapping.meta)?,
                    icon: check(&mapping.icon)?,
                })
            }
            DataSource::State { .. } => match decl.item {
                Some(mapping) => Some(ir::ListMapping {
                    primary: mapping.primary.clone().ok_or_else(|| {
                        CompileError::structure("List bound to state must name a primary field").at(span)
                    })?,
                    secondary: mapping.secondary.clone(),
                    meta: mapping.meta.clone(),
                    icon: mapping.icon.clone(),
                }),
                None => None,
            },
        };
        if variant == ir::ListVariant::Icon && item.as_ref().and_then(|m| m.icon.as_ref()).is_none() {
            return Err(CompileError::structure("List variant icon requires an icon field").at(span));
        }

        Ok(I::List {
            source,
            variant,
            item,
            empty_text: decl.empty_text.clone(),
            empty_state_hidden: decl.empty_state_hidden,
            selection: lower_selection("List", decl.selection, span)?,
            actions: self.lower_entry_actions(decl.actions, "List", ctx, span)?,
        })
    }

    pub fn lower_form(
        &self,
        record: &str,
        groups: &[ast::FormGroupDecl],
        fields: &[ast::FormFieldDecl],
        span: Span,
        ctx: &PageCtx,
    ) -> Result<I> {
        let schema = self.resolve_record(record, &format!("Page '{}' form", ctx.page), span)?;
        let mut grouped = BTreeSet::new();
        for group in groups {
            for field in &group.fields {
                self.resolve_field(schema, field, "Form group", span)?;
                if !grouped.insert(field.as_str()) {
                    return Err(CompileError::structure(format!(
                        "Form field '{field}' appears in more than one group"
                    ))
                    .at(span));
                }
            }
        }
        let mut configured = BTreeSet::new();
        for field in fields {
            self.resolve_field(schema, &field.name, "Form", span)?;
            if !configured.insert(field.name.as_str()) {
                return Err(CompileError::structure(format!(
                    "Form field '{}' is configured more than once",
                    field.name
                ))
                .at(span));
            }
        }
        let lowered = schema
            .fields
            .iter()
            .map(|schema_field| {
                let config = fields.iter().find(|f| f.name == schema_field.name);
                ir::FormField {
                    name: schema_field.name.clone(),
                    type_name: schema_field.type_name.clone(),
                    required: schema_field.is_required(),
                    help: config.and_then(|c| c.help.clone()),
                    readonly: config.and_then(|c| c.readonly).unwrap_or(false),
                }
            })
            .collect();
        Ok(I::Form {
            record: record.to_owned(),
            groups: groups
                .iter()
                .map(|g| ir::FormGroup { label: g.label.clone(), fields: g.fields.clone() })
                .collect(),
            fields: lowered,
        })
    }

    pub fn lower_view(&self, record: &str, span: Span, ctx: &PageCtx) -> Result<I> {
        let schema = self.resolve_record(record, &format!("Page '{}' view", ctx.page), span)?;
        let representation = if schema.fields.len() >= VIEW_TABLE_MIN_FIELDS {
            ir::ViewRepresentation::Table
        } else {
            ir::ViewRepresentation::List
        };
        Ok(I::View { record: record.to_owned(), representation })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn lower_chart(
        &self,
        record: Option<&str>,
        source: Option<&Expr>,
        chart_type: Option<&str>,
        x: &Option<String>,
        y: &Option<String>,
        explain: &Option<String>,
        span: Span,
        ctx: &PageCtx,
    ) -> Result<I> {
        let source = self.lower_source("Chart", record, source, span, ctx)?;
        let chart_type = chart_type.unwrap_or("bar");
        if !CHART_TYPES.contains(&chart_type) {
            return Err(CompileError::structure(format!(
                "Chart type '{chart_type}' must be one of bar, line, pie, summary"
            ))
            .at(span));
        }
        match &source {
            DataSource::Record { name } => {
                let schema = self.resolve_record(name, "Chart", span)?;
                for field in [x, y].into_iter().flatten() {
                    self.resolve_field(schema, field, "Chart", span)?;
                }
            }
            DataSource::State { .. } => self.require_capability("charts", "chart", span)?,
        }
        Ok(I::Chart {
            source,
            chart_type: chart_type.to_owned(),
            x: x.clone(),
            y: y.clone(),
            explain: explain.clone(),
        })
    }

    pub fn lower_chat_composer(&self, flow: &str, fields: &[String], span: Span) -> Result<I> {
        self.resolve_flow(flow, "Chat composer", span)?;
        let mut seen = BTreeSet::new();
        for field in fields {
            if !seen.insert(field.as_str()) {
                return Err(CompileError::structure(format!("Chat composer field '{field}' is duplicated")).at(span));
            }
        }
        Ok(I::ChatComposer { flow: flow.to_owned(), fields: fields.to_vec() })
    }
}

/// Chat blocks hold chat elements only. `flags` is
/// `[show_avatars, group_messages, streaming, attachments]`.
pub fn lower_chat(
    style: Option<&str>,
    flags: [Option<bool>; 4],
    composer_placeholder: &Option<String>,
    children: Vec<ir::PageItem>,
    span: Span,
) -> Result<I> {
    let style = style.unwrap_or("bubbles");
    if !matches!(style, "bubbles" | "plain") {
        return Err(CompileError::structure(format!("Chat style '{style}' must be bubbles or plain")).at(span));
    }
    for child in &children {
        let allowed = matches!(
            child.kind,
            I::ChatMessages { .. }
                | I::ChatComposer { .. }
                | I::ChatThinking { .. }
                | I::ChatCitations { .. }
                | I::ChatMemory { .. }
        );
        if !allowed {
            return Err(CompileError::structure(
                "Chat blocks may only contain messages, composer, thinking, citations and memory",
            )
            .at(child.meta.span));
        }
    }
    let [show_avatars, group_messages, streaming, attachments] = flags;
    Ok(I::Chat {
        style: style.to_owned(),
        show_avatars: show_avatars.unwrap_or(true),
        group_messages: group_messages.unwrap_or(true),
        streaming: streaming.unwrap_or(false),
        attachments: attachments.unwrap_or(false),
        composer_placeholder: composer_placeholder.clone(),
        children,
    })
}

fn lower_selection(keyword: &str, selection: Option<&str>, span: Span) -> Result<Selection> {
    match selection {
        None | Some("none") => Ok(Selection::None),
        Some("single") => Ok(Selection::Single),
        Some("multi") => Ok(Selection::Multi),
        Some(other) => Err(CompileError::structure(format!(
            "{keyword} selection '{other}' must be none, single or multi"
        ))
        .at(span)),
    }
}

// ------------------------------- Tests ------------------------------------ //
