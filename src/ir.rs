//! Validated, reference-resolved page items.
//!
//! Every name in this tree is known to exist and every attribute is
//! normalized (defaults filled, enums checked, action targets resolved).
//! Produced once by [`crate::lower`]; read-only afterwards.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

pub use crate::ast::{Expr, Literal, RecordSchema, Span};

/// Theme tokens with their built-in defaults, in manifest order.
pub const THEME_TOKENS: &[(&str, &str)] = &[
    ("primary_color", "#2563eb"),
    ("secondary_color", "#64748b"),
    ("background_color", "#ffffff"),
    ("surface_color", "#f8fafc"),
    ("text_color", "#0f172a"),
    ("font_family", "system-ui"),
    ("font_size", "md"),
    ("radius", "md"),
    ("spacing", "md"),
    ("shadow", "sm"),
];

pub fn is_theme_token(name: &str) -> bool {
    THEME_TOKENS.iter().any(|(token, _)| *token == name)
}

// ————————————————————————————————————————————————————————————————————————————
// PROGRAM
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub records: IndexMap<String, RecordSchema>,
    pub flows: BTreeSet<String>,
    pub pages: Vec<Page>,
    pub capabilities: BTreeSet<String>,
    pub theme: Theme,
    pub ui: UiSettings,
    pub state_defaults: IndexMap<String, Value>,
    pub upload_references: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub setting: String,
    pub tokens: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiSettings {
    pub density: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub name: String,
    pub body: PageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_rule: Option<VisibilityRule>,
    pub state_defaults: IndexMap<String, Value>,
    pub theme: IndexMap<String, String>,
    pub debug_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBody {
    Elements(Vec<PageItem>),
    Layout(PageLayout),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageLayout {
    pub header: Vec<PageItem>,
    pub sidebar_left: Vec<PageItem>,
    pub main: Vec<PageItem>,
    pub drawer_right: Vec<PageItem>,
    pub footer: Vec<PageItem>,
}

impl PageLayout {
    /// Slots in manifest order; the position is the slot's path index.
    pub fn slots(&self) -> [(&'static str, &[PageItem]); 5] {
        [
            ("header", &self.header),
            ("sidebar_left", &self.sidebar_left),
            ("main", &self.main),
            ("drawer_right", &self.drawer_right),
            ("footer", &self.footer),
        ]
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ANNOTATIONS
// ————————————————————————————————————————————————————————————————————————————

/// `only when` rule; a path rule compares one state value to a literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisibilityRule {
    Path { path: Vec<String>, value: Literal },
    Expression { expression: Expr },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemMeta {
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_rule: Option<VisibilityRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_when: Option<Expr>,
    pub debug_only: bool,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub theme_overrides: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<IndexMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    CallFlow { flow: String },
    NavigateTo { page: String },
    GoBack,
    OpenModal { target: String },
    CloseModal { target: String },
    OpenDrawer { target: String },
    CloseDrawer { target: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryAction {
    pub label: String,
    pub action: Action,
}

/// Enables or disables an action without hiding its element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityRule {
    pub path: Vec<String>,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Record { name: String },
    State { path: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection { None, Single, Multi }

// ————————————————————————————————————————————————————————————————————————————
// ITEM PARTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Serialize)]
pub struct CardStat {
    pub value: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tab {
    pub label: String,
    pub children: Vec<PageItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder { Asc, Desc }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSort {
    pub by: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListMapping {
    pub primary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListVariant { SingleLine, TwoLine, Icon }

#[derive(Debug, Clone, Serialize)]
pub struct FormGroup {
    pub label: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub readonly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRepresentation { Table, List }

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumberEntry {
    Phrase { value: String },
    Count { record: String, label: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryStep {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewSource {
    State { path: Vec<String> },
    Text { value: String },
}

// ————————————————————————————————————————————————————————————————————————————
// PAGE ITEMS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Serialize)]
pub struct PageItem {
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(flatten)]
    pub meta: ItemMeta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Title { value: String },
    Text { value: String },
    Divider,
    Image { src: String, alt: String, role: Option<String> },
    Icon { name: String, size: String, role: String, label: Option<String> },
    Lightbox { images: Vec<String>, start_index: usize },
    Loading { variant: String },
    Snackbar { message: String, duration: u64 },
    Tooltip { text: String, anchor_label: String, collapsed_by_default: bool },
    Button {
        label: String,
        action: Action,
        explicit_id: Option<String>,
        icon: Option<String>,
        availability: Option<AvailabilityRule>,
    },
    Link { label: String, target: String },
    TextInput { name: String, flow: String, label: String },
    Slider {
        label: String,
        min: f64,
        max: f64,
        step: f64,
        value: Vec<String>,
        flow: Option<String>,
        help_text: Option<String>,
    },
    Section { label: Option<String>, children: Vec<PageItem> },
    Row { children: Vec<PageItem> },
    Column { children: Vec<PageItem> },
    Grid { columns: u8, children: Vec<PageItem> },
    Card {
        label: Option<String>,
        stat: Option<CardStat>,
        actions: Vec<EntryAction>,
        children: Vec<PageItem>,
    },
    CardGroup { children: Vec<PageItem> },
    Compose { name: String, children: Vec<PageItem> },
    Modal { label: String, children: Vec<PageItem> },
    Drawer { label: String, children: Vec<PageItem> },
    Tabs { tabs: Vec<Tab>, default: String },
    Table {
        source: DataSource,
        columns: Vec<TableColumn>,
        empty_text: Option<String>,
        empty_state_hidden: bool,
        sort: Option<TableSort>,
        page_size: Option<u32>,
        selection: Selection,
        row_actions: Vec<EntryAction>,
    },
    List {
        source: DataSource,
        variant: ListVariant,
        item: Option<ListMapping>,
        empty_text: Option<String>,
        empty_state_hidden: bool,
        selection: Selection,
        actions: Vec<EntryAction>,
    },
    Form { record: String, groups: Vec<FormGroup>, fields: Vec<FormField> },
    View { record: String, representation: ViewRepresentation },
    Number { entries: Vec<NumberEntry> },
    Chart {
        source: DataSource,
        chart_type: String,
        x: Option<String>,
        y: Option<String>,
        explain: Option<String>,
    },
    Chat {
        style: String,
        show_avatars: bool,
        group_messages: bool,
        streaming: bool,
        attachments: bool,
        composer_placeholder: Option<String>,
        children: Vec<PageItem>,
    },
    ChatMessages { source: Vec<String> },
    ChatComposer { flow: String, fields: Vec<String> },
    ChatThinking { when: Vec<String> },
    ChatCitations { source: Vec<String> },
    ChatMemory { source: Vec<String>, lane: Option<String> },
    Story { title: String, steps: Vec<StoryStep> },
    Upload {
        name: String,
        accept: Vec<String>,
        multiple: bool,
        required: bool,
        preview: bool,
        label: String,
    },
    CustomComponent { component: String, plugin: String, properties: IndexMap<String, Expr> },
    CitationChips { source: Vec<String> },
    SourcePreview { source: PreviewSource },
    TrustIndicator { source: Vec<String> },
    ScopeSelector { options_source: Vec<String>, active: Vec<String> },
    SidebarLayout { sidebar: Vec<PageItem>, main: Vec<PageItem> },
    Sticky { position: String, children: Vec<PageItem> },
    Conditional { condition: Expr, then: Vec<PageItem>, otherwise: Option<Vec<PageItem>> },
    ThemeSettings,
}

/// Renders a state path as written in source, `state.a.b`.
pub fn render_state_path(path: &[String]) -> String {
    let mut out = String::from("state");
    for segment in path {
        out.push('.');
        out.push_str(segment);
    }
    out
}
