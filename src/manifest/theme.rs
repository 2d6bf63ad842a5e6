//! Theme tokens and the manifest `theme` / `ui` blocks.
use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::error::{CompileError, ErrorKind, Result};
use crate::ir::{self, THEME_TOKENS};
use crate::lower::check_theme_tokens;

use super::storage::StorageMetadata;

const RUNTIME_THEMES: &[&str] = &["light", "dark", "system"];

/// Built-in defaults overlaid with the app's tokens.
pub fn app_tokens(program: &ir::Program) -> IndexMap<String, String> {
    let mut tokens: IndexMap<String, String> =
        THEME_TOKENS.iter().map(|(name, value)| ((*name).to_owned(), (*value).to_owned())).collect();
    merge(&mut tokens, &program.theme.tokens);
    tokens
}

/// Page-level tokens win over app tokens.
pub fn page_tokens(app: &IndexMap<String, String>, page: &ir::Page) -> IndexMap<String, String> {
    let mut tokens = app.clone();
    merge(&mut tokens, &page.theme);
    tokens
}

/// Checks an element's overrides and returns the effective tokens.
pub fn apply_overrides(
    ambient: &IndexMap<String, String>,
    overrides: &IndexMap<String, String>,
    element_id: &str,
) -> Result<IndexMap<String, String>> {
    check_theme_tokens(overrides, &format!("Element '{element_id}'"))?;
    let mut tokens = ambient.clone();
    merge(&mut tokens, overrides);
    Ok(tokens)
}

pub fn tokens_value(tokens: &IndexMap<String, String>) -> Value {
    Value::Object(tokens.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect())
}

/// `{schema_version, setting, current, tokens}`. `current` is the runtime
/// theme when given, else the declared setting.
pub fn theme_manifest(program: &ir::Program, runtime_theme: Option<&str>) -> Result<Value> {
    let current = match runtime_theme {
        Some(theme) if RUNTIME_THEMES.contains(&theme) => theme,
        Some(theme) => {
            return Err(CompileError::new(
                ErrorKind::Theme,
                format!("Runtime theme '{theme}' must be one of light, dark, system"),
            )
            .with_details("invalid_runtime_theme", Some(theme)));
        }
        None => program.theme.setting.as_str(),
    };
    let mut out = Map::new();
    out.insert("schema_version".to_owned(), json!("1"));
    out.insert("setting".to_owned(), json!(program.theme.setting));
    out.insert("current".to_owned(), json!(current));
    out.insert("tokens".to_owned(), tokens_value(&app_tokens(program)));
    Ok(Value::Object(out))
}

pub fn ui_manifest(program: &ir::Program, persistence: &StorageMetadata) -> Value {
    let mut settings = Map::new();
    settings.insert("density".to_owned(), json!(program.ui.density));
    if let Some(accent) = &program.ui.accent_color {
        settings.insert("accent_color".to_owned(), json!(accent));
    }
    json!({"settings": settings, "persistence": persistence})
}

fn merge(tokens: &mut IndexMap<String, String>, overrides: &IndexMap<String, String>) {
    for (name, value) in overrides {
        tokens.insert(name.clone(), value.clone());
    }
}
