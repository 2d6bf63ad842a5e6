//! Images, icons and lightboxes.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use crate::ir::ItemKind as I;

const IMAGE_ROLES: &[&str] = &["hero", "thumbnail", "avatar", "illustration", "icon"];
const ICON_SIZES: &[&str] = &["small", "medium", "large"];
const ICON_ROLES: &[&str] = &["decorative", "informative"];

static ICON_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex"));

fn one_of(value: &str, allowed: &[&str], what: &str, span: Span) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(CompileError::structure(format!("{what} '{value}' must be one of {}", allowed.join(", "))).at(span))
}

pub fn lower_image(src: &str, alt: &Option<String>, role: &Option<String>, span: Span) -> Result<I> {
    if src.trim().is_empty() {
        return Err(CompileError::structure("Image source cannot be empty").at(span));
    }
    if let Some(role) = role {
        one_of(role, IMAGE_ROLES, "Image role", span)?;
    }
    let decorative = role.as_deref() == Some("icon");
    let alt = match alt {
        Some(alt) if !alt.trim().is_empty() || decorative => alt.clone(),
        None if decorative => String::new(),
        _ => {
            return Err(CompileError::structure(format!("Image '{src}' needs alt text")).at(span));
        }
    };
    Ok(I::Image { src: src.to_owned(), alt, role: role.clone() })
}

pub fn lower_icon(
    name: &str,
    size: &Option<String>,
    role: &Option<String>,
    label: &Option<String>,
    span: Span,
) -> Result<I> {
    if !ICON_NAME.is_match(name) {
        return Err(CompileError::structure(format!("Icon name '{name}' must be snake_case")).at(span));
    }
    let size = size.clone().unwrap_or_else(|| "medium".to_owned());
    one_of(&size, ICON_SIZES, "Icon size", span)?;
    let role = role.clone().unwrap_or_else(|| "decorative".to_owned());
    one_of(&role, ICON_ROLES, "Icon role", span)?;
    if role == "informative" && label.as_deref().is_none_or(|l| l.trim().is_empty()) {
        return Err(CompileError::structure(format!("Informative icon '{name}' needs a label")).at(span));
    }
    Ok(I::Icon { name: name.to_owned(), size, role, label: label.clone() })
}

pub fn lower_lightbox(images: &[String], start_index: Option<usize>, span: Span) -> Result<I> {
    if images.is_empty() {
        return Err(CompileError::structure("Lightbox needs at least one image").at(span));
    }
    let start_index = start_index.unwrap_or(0);
    if start_index >= images.len() {
        return Err(CompileError::structure(format!(
            "Lightbox start_index {start_index} is out of range for {} images",
            images.len()
        ))
        .at(span));
    }
    Ok(I::Lightbox { images: images.to_vec(), start_index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("check_circle", true)]
    #[case("CheckCircle", false)]
    #[case("9lives", false)]
    fn icon_names_are_snake_case(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(lower_icon(name, &None, &None, &None, Span::default()).is_ok(), ok);
    }

    #[test]
    fn informative_icons_need_labels() {
        let err = lower_icon("info", &None, &Some("informative".into()), &None, Span::default()).unwrap_err();
        assert_eq!(err.message, "Informative icon 'info' needs a label");
    }

    #[test]
    fn image_alt_rules() {
        assert!(lower_image("hero.png", &None, &None, Span::default()).is_err());
        assert!(lower_image("dot.svg", &None, &Some("icon".into()), Span::default()).is_ok());
        let err = lower_image("x.png", &Some("x".into()), &Some("banner".into()), Span::default()).unwrap_err();
        assert_eq!(err.message, "Image role 'banner' must be one of hero, thumbnail, avatar, illustration, icon");
    }

    #[test]
    fn lightbox_bounds() {
        let images = vec!["a.png".to_owned(), "b.png".to_owned()];
        assert!(lower_lightbox(&images, Some(1), Span::default()).is_ok());
        assert!(lower_lightbox(&images, Some(2), Span::default()).is_err());
        assert!(lower_lightbox(&[], None, Span::default()).is_err());
    }
}
