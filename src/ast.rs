//! Parsed page descriptions, as handed over by the parser.
//!
//! Nothing here is validated: names may dangle, labels may repeat and
//! annotations are carried uninterpreted. [`crate::lower`] turns this tree
//! into [`crate::ir`].
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// SOURCE POSITIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

// ————————————————————————————————————————————————————————————————————————————
// EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp { Not, Neg }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp { And, Or, Add, Sub, Mul, Div, Mod }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp { Eq, Ne, Gt, Lt, Gte, Lte, In, Nin }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOpKind { Get, Length, Append, Contains, First, Last }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapOpKind { Get, Set, Has, Keys }

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal { value: Literal },
    /// `state.a.b` is `path: ["a", "b"]`.
    StatePath { path: Vec<String> },
    /// A variable bound by map/filter/reduce.
    Name { name: String },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Comparison { op: CompareOp, left: Box<Expr>, right: Box<Expr> },
    List { items: Vec<Expr> },
    Map { entries: Vec<MapEntry> },
    ListOp {
        op: ListOpKind,
        target: Box<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<Expr>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<Box<Expr>>,
    },
    MapOp {
        op: MapOpKind,
        target: Box<Expr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<Box<Expr>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<Expr>>,
    },
    ListMap { target: Box<Expr>, var: String, body: Box<Expr> },
    ListFilter { target: Box<Expr>, var: String, predicate: Box<Expr> },
    ListReduce { target: Box<Expr>, acc: String, var: String, start: Box<Expr>, body: Box<Expr> },
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    CallFunction {
        function: String,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    /// A pattern parameter that survived expansion unsubstituted.
    PatternParam { name: String },
}

impl Expr {
    pub fn state_path(&self) -> Option<&[String]> {
        match self {
            Expr::StatePath { path } => Some(path),
            _ => None,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ITEM ANNOTATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibilityRuleDecl {
    /// `only when state.x is <literal>`
    Path { path: Vec<String>, value: Literal },
    Expression { expression: Expr },
}

/// Envelope shared by every page item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_rule: Option<VisibilityRuleDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<Expr>,
    #[serde(default)]
    pub debug_only: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub theme_overrides: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<IndexMap<String, Value>>,
}

impl ItemMeta {
    pub fn span(&self) -> Span {
        Span { line: self.line, column: self.column }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ITEM SUB-ENTITIES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecl {
    pub kind: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// A labelled action attached to a card, table row or list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryActionDecl {
    pub label: String,
    #[serde(flatten)]
    pub action: ActionDecl,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDecl {
    pub path: Vec<String>,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStatDecl {
    pub value: Expr,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabDecl {
    pub label: String,
    #[serde(default)]
    pub children: Vec<PageItem>,
    #[serde(default)]
    pub visibility: Option<Expr>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum ColumnDirective {
    Include { name: String },
    Exclude { name: String },
    Label { name: String, label: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDecl {
    pub by: String,
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationDecl {
    pub page_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMappingDecl {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormGroupDecl {
    pub label: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldDecl {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub readonly: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumberEntryDecl {
    Phrase { value: String },
    Count {
        record: String,
        #[serde(default)]
        label: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryStepDecl {
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub requires: Option<Expr>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl StoryStepDecl {
    pub fn span(&self) -> Span {
        Span { line: self.line, column: self.column }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PAGE ITEMS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageItem {
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(flatten)]
    pub meta: ItemMeta,
}

impl PageItem {
    pub fn span(&self) -> Span {
        self.meta.span()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Title { value: String },
    Text { value: String },
    Divider {},
    Image {
        src: String,
        #[serde(default)]
        alt: Option<String>,
        #[serde(default)]
        role: Option<String>,
    },
    Icon {
        name: String,
        #[serde(default)]
        size: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
    Lightbox {
        images: Vec<String>,
        #[serde(default)]
        start_index: Option<usize>,
    },
    Loading {
        #[serde(default)]
        variant: Option<String>,
    },
    Snackbar {
        message: String,
        #[serde(default)]
        duration: Option<u64>,
    },
    Tooltip {
        text: String,
        anchor_label: String,
        #[serde(default)]
        collapsed_by_default: Option<bool>,
    },
    Button {
        label: String,
        action: ActionDecl,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        availability: Option<AvailabilityDecl>,
    },
    Link { label: String, target: String },
    TextInput {
        name: String,
        flow: String,
        #[serde(default)]
        label: Option<String>,
    },
    Slider {
        label: String,
        min: f64,
        max: f64,
        #[serde(default)]
        step: Option<f64>,
        value: Expr,
        #[serde(default)]
        flow: Option<String>,
        #[serde(default)]
        help_text: Option<String>,
    },
    Section {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Row {
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Column {
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Grid {
        columns: i64,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Card {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        stat: Option<CardStatDecl>,
        #[serde(default)]
        actions: Vec<EntryActionDecl>,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    CardGroup {
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Compose {
        name: String,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Modal {
        label: String,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Drawer {
        label: String,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Tabs {
        #[serde(default)]
        tabs: Vec<TabDecl>,
        #[serde(default)]
        default: Option<String>,
    },
    Table {
        #[serde(default)]
        record: Option<String>,
        #[serde(default)]
        source: Option<Expr>,
        #[serde(default)]
        columns: Vec<ColumnDirective>,
        #[serde(default)]
        empty_text: Option<String>,
        #[serde(default)]
        empty_state_hidden: bool,
        #[serde(default)]
        sort: Option<SortDecl>,
        #[serde(default)]
        pagination: Option<PaginationDecl>,
        #[serde(default)]
        selection: Option<String>,
        #[serde(default)]
        row_actions: Vec<EntryActionDecl>,
    },
    List {
        #[serde(default)]
        record: Option<String>,
        #[serde(default)]
        source: Option<Expr>,
        #[serde(default)]
        variant: Option<String>,
        #[serde(default)]
        item: Option<ListMappingDecl>,
        #[serde(default)]
        empty_text: Option<String>,
        #[serde(default)]
        empty_state_hidden: bool,
        #[serde(default)]
        selection: Option<String>,
        #[serde(default)]
        actions: Vec<EntryActionDecl>,
    },
    Form {
        record: String,
        #[serde(default)]
        groups: Vec<FormGroupDecl>,
        #[serde(default)]
        fields: Vec<FormFieldDecl>,
    },
    View { record: String },
    Number {
        #[serde(default)]
        entries: Vec<NumberEntryDecl>,
    },
    Chart {
        #[serde(default)]
        record: Option<String>,
        #[serde(default)]
        source: Option<Expr>,
        #[serde(default)]
        chart_type: Option<String>,
        #[serde(default)]
        x: Option<String>,
        #[serde(default)]
        y: Option<String>,
        #[serde(default)]
        explain: Option<String>,
    },
    Chat {
        #[serde(default)]
        style: Option<String>,
        #[serde(default)]
        show_avatars: Option<bool>,
        #[serde(default)]
        group_messages: Option<bool>,
        #[serde(default)]
        streaming: Option<bool>,
        #[serde(default)]
        attachments: Option<bool>,
        #[serde(default)]
        composer_placeholder: Option<String>,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    ChatMessages { source: Expr },
    ChatComposer {
        flow: String,
        #[serde(default)]
        fields: Vec<String>,
    },
    ChatThinking { when: Expr },
    ChatCitations { source: Expr },
    ChatMemory {
        source: Expr,
        #[serde(default)]
        lane: Option<String>,
    },
    Story {
        title: String,
        #[serde(default)]
        steps: Vec<StoryStepDecl>,
    },
    Upload {
        name: String,
        #[serde(default)]
        accept: Option<Vec<String>>,
        #[serde(default)]
        multiple: Option<Expr>,
        #[serde(default)]
        required: Option<Expr>,
        #[serde(default)]
        preview: Option<Expr>,
        #[serde(default)]
        label: Option<String>,
    },
    CustomComponent {
        component: String,
        #[serde(default)]
        properties: IndexMap<String, Expr>,
    },
    CitationChips { source: Expr },
    SourcePreview { source: Expr },
    TrustIndicator { source: Expr },
    ScopeSelector { options_source: Expr, active: Expr },
    SidebarLayout {
        #[serde(default)]
        sidebar: Vec<PageItem>,
        #[serde(default)]
        main: Vec<PageItem>,
    },
    Sticky {
        position: String,
        #[serde(default)]
        children: Vec<PageItem>,
    },
    Conditional {
        condition: Expr,
        #[serde(default)]
        then: Vec<PageItem>,
        #[serde(default, rename = "else")]
        otherwise: Option<Vec<PageItem>>,
    },
    ThemeSettings {},
    #[serde(rename = "use_ui_pack")]
    UsePack { pack: String, fragment: String },
    UsePattern {
        pattern: String,
        #[serde(default)]
        arguments: IndexMap<String, Value>,
    },
}

impl ItemKind {
    /// Source-level keyword, used in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            ItemKind::Title { .. } => "title",
            ItemKind::Text { .. } => "text",
            ItemKind::Divider {} => "divider",
            ItemKind::Image { .. } => "image",
            ItemKind::Icon { .. } => "icon",
            ItemKind::Lightbox { .. } => "lightbox",
            ItemKind::Loading { .. } => "loading",
            ItemKind::Snackbar { .. } => "snackbar",
            ItemKind::Tooltip { .. } => "tooltip",
            ItemKind::Button { .. } => "button",
            ItemKind::Link { .. } => "link",
            ItemKind::TextInput { .. } => "text_input",
            ItemKind::Slider { .. } => "slider",
            ItemKind::Section { .. } => "section",
            ItemKind::Row { .. } => "row",
            ItemKind::Column { .. } => "column",
            ItemKind::Grid { .. } => "grid",
            ItemKind::Card { .. } => "card",
            ItemKind::CardGroup { .. } => "card_group",
            ItemKind::Compose { .. } => "compose",
            ItemKind::Modal { .. } => "modal",
            ItemKind::Drawer { .. } => "drawer",
            ItemKind::Tabs { .. } => "tabs",
            ItemKind::Table { .. } => "table",
            ItemKind::List { .. } => "list",
            ItemKind::Form { .. } => "form",
            ItemKind::View { .. } => "view",
            ItemKind::Number { .. } => "number",
            ItemKind::Chart { .. } => "chart",
            ItemKind::Chat { .. } => "chat",
            ItemKind::ChatMessages { .. } => "chat_messages",
            ItemKind::ChatComposer { .. } => "chat_composer",
            ItemKind::ChatThinking { .. } => "chat_thinking",
            ItemKind::ChatCitations { .. } => "chat_citations",
            ItemKind::ChatMemory { .. } => "chat_memory",
            ItemKind::Story { .. } => "story",
            ItemKind::Upload { .. } => "upload",
            ItemKind::CustomComponent { .. } => "custom_component",
            ItemKind::CitationChips { .. } => "citation_chips",
            ItemKind::SourcePreview { .. } => "source_preview",
            ItemKind::TrustIndicator { .. } => "trust_indicator",
            ItemKind::ScopeSelector { .. } => "scope_selector",
            ItemKind::SidebarLayout { .. } => "sidebar_layout",
            ItemKind::Sticky { .. } => "sticky",
            ItemKind::Conditional { .. } => "conditional",
            ItemKind::ThemeSettings {} => "theme_settings",
            ItemKind::UsePack { .. } => "use_ui_pack",
            ItemKind::UsePattern { .. } => "use_pattern",
        }
    }

    /// Every nested item list, in source order.
    pub fn child_lists_mut(&mut self) -> Vec<&mut Vec<PageItem>> {
        match self {
            ItemKind::Section { children, .. }
            | ItemKind::Row { children }
            | ItemKind::Column { children }
            | ItemKind::Grid { children, .. }
            | ItemKind::Card { children, .. }
            | ItemKind::CardGroup { children }
            | ItemKind::Compose { children, .. }
            | ItemKind::Modal { children, .. }
            | ItemKind::Drawer { children, .. }
            | ItemKind::Chat { children, .. }
            | ItemKind::Sticky { children, .. } => vec![children],
            ItemKind::Tabs { tabs, .. } => tabs.iter_mut().map(|tab| &mut tab.children).collect(),
            ItemKind::SidebarLayout { sidebar, main } => vec![sidebar, main],
            ItemKind::Conditional { then, otherwise, .. } => {
                let mut lists = vec![then];
                if let Some(otherwise) = otherwise {
                    lists.push(otherwise);
                }
                lists
            }
            _ => Vec::new(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PROGRAM
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    Present,
    Unique,
    Length {
        #[serde(default)]
        min: Option<u64>,
        #[serde(default)]
        max: Option<u64>,
    },
    Pattern { regex: String },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Type { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub type_name: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

fn default_field_type() -> String {
    "text".to_owned()
}

impl FieldSchema {
    pub fn is_required(&self) -> bool {
        self.constraints.iter().any(|c| matches!(c, Constraint::Present))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
    /// `id` when declared, else the first field.
    pub fn id_field(&self) -> Option<&str> {
        self.field("id")
            .or_else(|| self.fields.first())
            .map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayoutDecl {
    #[serde(default)]
    pub header: Vec<PageItem>,
    #[serde(default)]
    pub sidebar_left: Vec<PageItem>,
    #[serde(default)]
    pub main: Vec<PageItem>,
    #[serde(default)]
    pub drawer_right: Vec<PageItem>,
    #[serde(default)]
    pub footer: Vec<PageItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDecl {
    pub name: String,
    #[serde(default)]
    pub items: Vec<PageItem>,
    #[serde(default)]
    pub layout: Option<PageLayoutDecl>,
    #[serde(default)]
    pub visibility: Option<Expr>,
    #[serde(default)]
    pub visibility_rule: Option<VisibilityRuleDecl>,
    #[serde(default)]
    pub state_defaults: IndexMap<String, Value>,
    #[serde(default)]
    pub theme: IndexMap<String, String>,
    #[serde(default)]
    pub debug_only: bool,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl PageDecl {
    pub fn span(&self) -> Span {
        Span { line: self.line, column: self.column }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDecl {
    pub name: String,
    #[serde(default)]
    pub items: Vec<PageItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPackDecl {
    pub name: String,
    #[serde(default = "default_pack_version")]
    pub version: String,
    #[serde(default)]
    pub fragments: Vec<FragmentDecl>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

fn default_pack_version() -> String {
    "1".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternParamDecl {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub type_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

/// Items stay raw JSON so `{"$param": name}` holes can sit anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<PatternParamDecl>,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPropDecl {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    pub plugin: String,
    #[serde(default)]
    pub props: Vec<ComponentPropDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeDecl {
    #[serde(default)]
    pub setting: Option<String>,
    #[serde(default)]
    pub tokens: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiDecl {
    #[serde(default)]
    pub density: Option<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub records: Vec<RecordSchema>,
    #[serde(default)]
    pub flows: Vec<String>,
    #[serde(default)]
    pub pages: Vec<PageDecl>,
    #[serde(default)]
    pub ui_packs: Vec<UiPackDecl>,
    #[serde(default)]
    pub patterns: Vec<PatternDecl>,
    #[serde(default)]
    pub components: Vec<ComponentDecl>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub theme: ThemeDecl,
    #[serde(default)]
    pub ui: UiDecl,
    #[serde(default)]
    pub state_defaults: IndexMap<String, Value>,
    /// Upload names read by flows; feeds the unused-upload warning.
    #[serde(default)]
    pub upload_references: Vec<String>,
}

// ------------------------------- Tests ------------------------------------ //
