//! Lowering: parsed page items → validated IR.
//!
//! [`Lowerer`] owns the program-wide lookup tables and is the single
//! dispatcher over [`ast::ItemKind`]. Each item family lives in its own
//! submodule as an `impl Lowerer` block; container families recurse through
//! [`Lowerer::lower_item`] again. Per-page mutable state (compose names,
//! overlays, upload names) lives in [`PageCtx`].
//!
//! UI-pack and pattern uses are expanded before lowering ([`expand`]); the
//! dispatcher never sees them.
pub mod actions;
pub mod custom;
pub mod expand;
pub mod expr;
pub mod layout;
pub mod media;
pub mod numbers;
pub mod polish;
pub mod rag;
pub mod refs;
pub mod story;
pub mod tabs;
pub mod uploads;
pub mod views;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::ast::{self, ItemKind as A};
use crate::error::{CompileError, ErrorKind, Result};
use crate::ir::{self, ItemKind as I};
use crate::suggest::did_you_mean;

pub use expand::Expander;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Program-wide known names.
#[derive(Debug)]
pub struct Lowerer {
    pub records: IndexMap<String, ast::RecordSchema>,
    pub flows: BTreeSet<String>,
    pub pages: BTreeSet<String>,
    pub capabilities: BTreeSet<String>,
    pub components: IndexMap<String, ast::ComponentDecl>,
}

/// Per-page lowering state.
#[derive(Debug, Default)]
pub struct PageCtx {
    pub page: String,
    /// Modal labels declared at the page root.
    pub modals: BTreeSet<String>,
    /// Drawer labels declared at the page root.
    pub drawers: BTreeSet<String>,
    pub compose_names: BTreeSet<String>,
    pub upload_names: BTreeSet<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// Lower a whole program. Aborts on the first error.
pub fn lower_program(program: &ast::Program) -> Result<ir::Program> {
    let lowerer = Lowerer::new(program)?;
    let expander = Expander::new(program, &lowerer)?;
    let theme = lower_theme(&program.theme)?;
    let ui = lower_ui(&program.ui)?;

    let mut pages = Vec::with_capacity(program.pages.len());
    for page in &program.pages {
        pages.push(lowerer.lower_page(page, &expander)?);
    }
    info!(pages = pages.len(), records = lowerer.records.len(), "lowered program");

    Ok(ir::Program {
        records: lowerer.records,
        flows: lowerer.flows,
        pages,
        capabilities: lowerer.capabilities,
        theme,
        ui,
        state_defaults: program.state_defaults.clone(),
        upload_references: program.upload_references.iter().cloned().collect(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Lowerer {
    pub fn new(program: &ast::Program) -> Result<Self> {
        let mut records = IndexMap::new();
        for record in &program.records {
            let mut seen = BTreeSet::new();
            for field in &record.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(CompileError::structure(format!(
                        "Record '{}' declares field '{}' more than once",
                        record.name, field.name
                    )));
                }
            }
            if records.insert(record.name.clone(), record.clone()).is_some() {
                return Err(CompileError::structure(format!(
                    "Record '{}' is declared more than once",
                    record.name
                )));
            }
        }

        let mut pages = BTreeSet::new();
        for page in &program.pages {
            if !pages.insert(page.name.clone()) {
                return Err(CompileError::structure(format!(
                    "Page '{}' is declared more than once",
                    page.name
                ))
                .at(page.span()));
            }
        }

        let mut components = IndexMap::new();
        for component in &program.components {
            if components.insert(component.name.clone(), component.clone()).is_some() {
                return Err(CompileError::structure(format!(
                    "Component '{}' is declared more than once",
                    component.name
                )));
            }
        }

        Ok(Self {
            records,
            flows: program.flows.iter().cloned().collect(),
            pages,
            capabilities: program.capabilities.iter().cloned().collect(),
            components,
        })
    }

    pub fn lower_page(&self, page: &ast::PageDecl, expander: &Expander<'_>) -> Result<ir::Page> {
        debug!(page = %page.name, "lowering page");
        let span = page.span();
        let expand = |items: &[ast::PageItem]| expander.expand_page(&page.name, items);

        let (root_lists, layout) = match &page.layout {
            Some(layout) => {
                if !page.items.is_empty() {
                    return Err(CompileError::structure(format!(
                        "Page '{}' cannot declare both items and a layout",
                        page.name
                    ))
                    .at(span));
                }
                let slots = [
                    expand(&layout.header)?,
                    expand(&layout.sidebar_left)?,
                    expand(&layout.main)?,
                    expand(&layout.drawer_right)?,
                    expand(&layout.footer)?,
                ];
                (Vec::from(slots), true)
            }
            None => (vec![expand(&page.items)?], false),
        };

        let mut ctx = PageCtx { page: page.name.clone(), ..PageCtx::default() };
        for item in root_lists.iter().flatten() {
            ctx.declare_overlay(item)?;
        }

        let mut lowered = Vec::with_capacity(root_lists.len());
        for items in &root_lists {
            lowered.push(self.lower_children(items, &mut ctx)?);
        }

        let body = if layout {
            let mut slots = lowered.into_iter();
            let mut next = || slots.next().unwrap_or_default();
            ir::PageBody::Layout(ir::PageLayout {
                header: next(),
                sidebar_left: next(),
                main: next(),
                drawer_right: next(),
                footer: next(),
            })
        } else {
            ir::PageBody::Elements(lowered.into_iter().flatten().collect())
        };

        let visibility = match &page.visibility {
            Some(expr) => {
                expr::check_predicate(expr, "Visibility", span)?;
                Some(expr.clone())
            }
            None => None,
        };
        let visibility_rule = page
            .visibility_rule
            .as_ref()
            .map(|rule| lower_visibility_rule(rule, span))
            .transpose()?;
        check_theme_tokens(&page.theme, &format!("Page '{}'", page.name))?;

        Ok(ir::Page {
            name: page.name.clone(),
            body,
            visibility,
            visibility_rule,
            state_defaults: page.state_defaults.clone(),
            theme: page.theme.clone(),
            debug_only: page.debug_only,
            purpose: page.purpose.clone(),
            span,
        })
    }

    pub fn lower_children(&self, items: &[ast::PageItem], ctx: &mut PageCtx) -> Result<Vec<ir::PageItem>> {
        items.iter().map(|item| self.lower_item(item, ctx)).collect()
    }

    /// The exhaustive dispatcher from AST kind to lowering module.
    pub fn lower_item(&self, item: &ast::PageItem, ctx: &mut PageCtx) -> Result<ir::PageItem> {
        let span = item.span();
        trace!(kind = item.kind.keyword(), line = span.line, "lowering item");
        let kind = match &item.kind {
            // actions / overlays / containers
            A::Title { value } => I::Title { value: value.clone() },
            A::Text { value } => I::Text { value: value.clone() },
            A::Divider {} => I::Divider,
            A::Button { label, action, id, icon, availability } => {
                self.lower_button(label, action, id.as_deref(), icon, availability.as_ref(), span, ctx)?
            }
            A::Link { label, target } => self.lower_link(label, target, span, ctx)?,
            A::TextInput { name, flow, label } => self.lower_text_input(name, flow, label, span, ctx)?,
            A::Section { label, children } => I::Section {
                label: label.clone(),
                children: self.lower_children(children, ctx)?,
            },
            A::Column { children } => I::Column { children: self.lower_children(children, ctx)? },
            A::Row { children } => self.lower_row(children, ctx)?,
            A::Card { label, stat, actions, children } => {
                self.lower_card(label, stat.as_ref(), actions, children, span, ctx)?
            }
            A::CardGroup { children } => self.lower_card_group(children, ctx)?,
            A::Compose { name, children } => self.lower_compose(name, children, span, ctx)?,
            A::Modal { label, children } => I::Modal {
                label: label.clone(),
                children: self.lower_children(children, ctx)?,
            },
            A::Drawer { label, children } => I::Drawer {
                label: label.clone(),
                children: self.lower_children(children, ctx)?,
            },
            // views / collections
            A::Table {
                record, source, columns, empty_text, empty_state_hidden,
                sort, pagination, selection, row_actions,
            } => self.lower_table(
                views::TableDecl {
                    record: record.as_deref(),
                    source: source.as_ref(),
                    columns,
                    empty_text,
                    empty_state_hidden: *empty_state_hidden,
                    sort: sort.as_ref(),
                    pagination: pagination.as_ref(),
                    selection: selection.as_deref(),
                    row_actions,
                },
                span,
                ctx,
            )?,
            A::List { record, source, variant, item, empty_text, empty_state_hidden, selection, actions } => {
                self.lower_list(
                    views::ListDecl {
                        record: record.as_deref(),
                        source: source.as_ref(),
                        variant: variant.as_deref(),
                        item: item.as_ref(),
                        empty_text,
                        empty_state_hidden: *empty_state_hidden,
                        selection: selection.as_deref(),
                        actions,
                    },
                    span,
                    ctx,
                )?
            }
            A::Form { record, groups, fields } => self.lower_form(record, groups, fields, span, ctx)?,
            A::View { record } => self.lower_view(record, span, ctx)?,
            A::Chart { record, source, chart_type, x, y, explain } => self.lower_chart(
                record.as_deref(),
                source.as_ref(),
                chart_type.as_deref(),
                x,
                y,
                explain,
                span,
                ctx,
            )?,
            A::Chat {
                style, show_avatars, group_messages, streaming, attachments,
                composer_placeholder, children,
            } => {
                let children = self.lower_children(children, ctx)?;
                views::lower_chat(
                    style.as_deref(),
                    [*show_avatars, *group_messages, *streaming, *attachments],
                    composer_placeholder,
                    children,
                    span,
                )?
            }
            A::ChatMessages { source } => I::ChatMessages {
                source: expr::require_state_path(source, "Chat messages source", span)?,
            },
            A::ChatComposer { flow, fields } => self.lower_chat_composer(flow, fields, span)?,
            A::ChatThinking { when } => I::ChatThinking {
                when: expr::require_state_path(when, "Chat thinking indicator", span)?,
            },
            A::ChatCitations { source } => I::ChatCitations {
                source: expr::require_state_path(source, "Chat citations source", span)?,
            },
            A::ChatMemory { source, lane } => I::ChatMemory {
                source: expr::require_state_path(source, "Chat memory source", span)?,
                lane: lane.clone(),
            },
            A::Tabs { tabs, default } => self.lower_tabs(tabs, default.as_deref(), span, ctx)?,
            // media
            A::Image { src, alt, role } => media::lower_image(src, alt, role, span)?,
            A::Icon { name, size, role, label } => media::lower_icon(name, size, role, label, span)?,
            A::Lightbox { images, start_index } => media::lower_lightbox(images, *start_index, span)?,
            // polish
            A::Loading { variant } => polish::lower_loading(variant, span)?,
            A::Snackbar { message, duration } => polish::lower_snackbar(message, *duration, span)?,
            A::Tooltip { text, anchor_label, collapsed_by_default } => {
                polish::lower_tooltip(text, anchor_label, *collapsed_by_default, span)?
            }
            A::Slider { label, min, max, step, value, flow, help_text } => {
                self.lower_slider(label, *min, *max, *step, value, flow, help_text, span, ctx)?
            }
            A::Grid { columns, children } => self.lower_grid(*columns, children, span, ctx)?,
            // numbers / story
            A::Number { entries } => self.lower_number(entries, span, ctx)?,
            A::Story { title, steps } => story::lower_story(title, steps, span)?,
            // layout
            A::SidebarLayout { sidebar, main } => self.lower_sidebar_layout(sidebar, main, span, ctx)?,
            A::Sticky { position, children } => self.lower_sticky(position, children, span, ctx)?,
            A::Conditional { condition, then, otherwise } => {
                self.lower_conditional(condition, then, otherwise.as_deref(), span, ctx)?
            }
            A::ThemeSettings {} => I::ThemeSettings,
            // uploads / custom / rag
            A::Upload { name, accept, multiple, required, preview, label } => self.lower_upload(
                uploads::UploadDecl {
                    name,
                    accept: accept.as_deref(),
                    multiple: multiple.as_ref(),
                    required: required.as_ref(),
                    preview: preview.as_ref(),
                    label: label.as_deref(),
                },
                span,
                ctx,
            )?,
            A::CustomComponent { component, properties } => {
                self.lower_custom_component(component, properties, span, ctx)?
            }
            A::CitationChips { .. }
            | A::SourcePreview { .. }
            | A::TrustIndicator { .. }
            | A::ScopeSelector { .. } => self.lower_rag_widget(&item.kind, span)?,
            A::UsePack { .. } | A::UsePattern { .. } => {
                return Err(CompileError::internal(format!(
                    "'{}' reached lowering without being expanded",
                    item.kind.keyword()
                ))
                .at(span));
            }
        };
        let meta = lower_meta(&item.meta)?;
        Ok(ir::PageItem { kind, meta })
    }
}

impl PageCtx {
    /// Registers a page-root modal or drawer.
    fn declare_overlay(&mut self, item: &ast::PageItem) -> Result<()> {
        let (set, noun, label) = match &item.kind {
            A::Modal { label, .. } => (&mut self.modals, "Modal", label),
            A::Drawer { label, .. } => (&mut self.drawers, "Drawer", label),
            _ => return Ok(()),
        };
        if label.trim().is_empty() {
            return Err(CompileError::structure(format!("{noun} label cannot be empty")).at(item.span()));
        }
        if !set.insert(label.clone()) {
            return Err(CompileError::structure(format!(
                "{noun} '{label}' is duplicated on page '{}'",
                self.page
            ))
            .at(item.span()));
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Carries the envelope over: visibility, show_when, debug flag, theme
/// overrides and origin.
fn lower_meta(meta: &ast::ItemMeta) -> Result<ir::ItemMeta> {
    let span = meta.span();
    if let Some(expr) = &meta.visibility {
        expr::check_predicate(expr, "Visibility", span)?;
    }
    if let Some(expr) = &meta.show_when {
        expr::check_predicate(expr, "Show-when", span)?;
    }
    let visibility_rule = meta
        .visibility_rule
        .as_ref()
        .map(|rule| lower_visibility_rule(rule, span))
        .transpose()?;
    Ok(ir::ItemMeta {
        span,
        visibility: meta.visibility.clone(),
        visibility_rule,
        show_when: meta.show_when.clone(),
        debug_only: meta.debug_only,
        theme_overrides: meta.theme_overrides.clone(),
        origin: meta.origin.clone(),
    })
}

fn lower_visibility_rule(rule: &ast::VisibilityRuleDecl, span: ast::Span) -> Result<ir::VisibilityRule> {
    match rule {
        ast::VisibilityRuleDecl::Path { path, value } => {
            if path.is_empty() {
                return Err(CompileError::new(ErrorKind::Visibility, "Visibility rule needs a state path").at(span));
            }
            if matches!(value, ast::Literal::Null) {
                return Err(CompileError::new(
                    ErrorKind::Visibility,
                    "Visibility rule value must be text, number or boolean",
                )
                .at(span));
            }
            Ok(ir::VisibilityRule::Path { path: path.clone(), value: value.clone() })
        }
        ast::VisibilityRuleDecl::Expression { expression } => {
            expr::check_predicate(expression, "Visibility", span)?;
            Ok(ir::VisibilityRule::Expression { expression: expression.clone() })
        }
    }
}

const THEME_SETTINGS: &[&str] = &["light", "dark", "system"];
const DENSITIES: &[&str] = &["compact", "comfortable", "spacious"];

fn lower_theme(theme: &ast::ThemeDecl) -> Result<ir::Theme> {
    let setting = theme.setting.clone().unwrap_or_else(|| "system".to_owned());
    if !THEME_SETTINGS.contains(&setting.as_str()) {
        return Err(CompileError::new(
            ErrorKind::Theme,
            format!("Theme setting '{setting}' must be one of light, dark, system"),
        ));
    }
    check_theme_tokens(&theme.tokens, "App theme")?;
    Ok(ir::Theme { setting, tokens: theme.tokens.clone() })
}

fn lower_ui(ui: &ast::UiDecl) -> Result<ir::UiSettings> {
    let density = ui.density.clone().unwrap_or_else(|| "comfortable".to_owned());
    if !DENSITIES.contains(&density.as_str()) {
        return Err(CompileError::new(
            ErrorKind::Theme,
            format!("UI density '{density}' must be one of compact, comfortable, spacious"),
        ));
    }
    Ok(ir::UiSettings { density, accent_color: ui.accent_color.clone() })
}

pub(crate) fn check_theme_tokens(tokens: &IndexMap<String, String>, subject: &str) -> Result<()> {
    for name in tokens.keys() {
        if !ir::is_theme_token(name) {
            let hint = did_you_mean(name, ir::THEME_TOKENS.iter().map(|(token, _)| *token));
            return Err(CompileError::new(
                ErrorKind::Theme,
                format!("{subject} sets unknown theme token '{name}'.{hint}"),
            )
            .with_details("unknown_theme_token", Some(name)));
        }
    }
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(value: serde_json::Value) -> ast::Program {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn duplicate_pages_are_rejected() {
        let p = program(json!({"pages": [{"name": "Home"}, {"name": "Home", "line": 9, "column": 1}]}));
        let err = lower_program(&p).unwrap_err();
        assert_eq!(err.message, "Page 'Home' is declared more than once");
        assert_eq!(err.line, Some(9));
    }

    #[test]
    fn items_and_layout_are_exclusive() {
        let p = program(json!({"pages": [{
            "name": "Home",
            "items": [{"type": "title", "value": "Hi"}],
            "layout": {"main": [{"type": "text", "value": "x"}]},
        }]}));
        let err = lower_program(&p).unwrap_err();
        assert!(err.message.contains("cannot declare both items and a layout"));
    }

    #[test]
    fn layout_slots_keep_their_place() {
        let p = program(json!({"pages": [{
            "name": "Home",
            "layout": {
                "header": [{"type": "title", "value": "Top"}],
                "footer": [{"type": "text", "value": "Bottom"}],
            },
        }]}));
        let ir = lower_program(&p).unwrap();
        let ir::PageBody::Layout(layout) = &ir.pages[0].body else { panic!("expected layout") };
        assert_eq!(layout.header.len(), 1);
        assert!(layout.main.is_empty());
        assert!(matches!(layout.footer[0].kind, I::Text { .. }));
    }

    #[test]
    fn unknown_theme_tokens_suggest() {
        let p = program(json!({"theme": {"tokens": {"primary_colr": "#000"}}}));
        let err = lower_program(&p).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Theme);
        assert!(err.message.contains("Did you mean \"primary_color\"?"));
    }

    #[test]
    fn visibility_rejects_pattern_params() {
        let p = program(json!({"pages": [{"name": "Home", "items": [{
            "type": "text", "value": "x",
            "visibility": {"kind": "pattern_param", "name": "flag"},
        }]}]}));
        let err = lower_program(&p).unwrap_err();
        assert_eq!(err.message, "Visibility cannot reference pattern parameter 'flag'");
    }

    #[test]
    fn duplicate_overlays_are_rejected() {
        let p = program(json!({"pages": [{"name": "Home", "items": [
            {"type": "modal", "label": "Confirm"},
            {"type": "modal", "label": "Confirm", "line": 4, "column": 3},
        ]}]}));
        let err = lower_program(&p).unwrap_err();
        assert_eq!(err.message, "Modal 'Confirm' is duplicated on page 'Home'");
        assert_eq!(err.line, Some(4));
    }
}
