//! Slugs, element ids and action ids.
//!
//! Element ids are `page.<slug>.<type>.<i0>.<i1>…`, a pure function of the
//! page, the element type and the sibling-index path from the page root.
//! Action ids start from `page.<slug>.<kind>.<key>`; an id that is already
//! taken gets a `__<type>_<i0>_<i1>…` suffix derived from the owning
//! element id.
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() { "item".to_owned() } else { slug.to_owned() }
}

pub fn element_id(page_slug: &str, type_tag: &str, path: &[usize]) -> String {
    let mut id = format!("page.{page_slug}.{type_tag}");
    for index in path {
        id.push('.');
        id.push_str(&index.to_string());
    }
    id
}

pub fn action_base_id(page_slug: &str, kind: &str, key: &str) -> String {
    format!("page.{page_slug}.{kind}.{}", slugify(key))
}

/// Stable id of a page-root modal or drawer.
pub fn overlay_id(page_slug: &str, kind: &str, label: &str) -> String {
    format!("page.{page_slug}.{kind}.{}", slugify(label))
}

/// `page.home.button.0.2` → `button_0_2`.
fn element_suffix(element_id: &str) -> String {
    element_id.splitn(3, '.').nth(2).unwrap_or(element_id).replace('.', "_")
}

/// Claims `base`, or `base__<suffix>` when `base` is already taken. The
/// returned id is always recorded in `taken`.
pub fn allocate_action_id(base: String, element_id: &str, taken: &mut IndexSet<String>) -> String {
    let id = if taken.contains(&base) {
        format!("{base}__{}", element_suffix(element_id))
    } else {
        base
    };
    taken.insert(id.clone());
    id
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Home", "home")]
    #[case("Save & Exit!", "save_exit")]
    #[case("  Order   History ", "order_history")]
    #[case("Ünïcode", "n_code")]
    #[case("!!!", "item")]
    #[case("", "item")]
    fn slugs(#[case] name: &str, #[case] slug: &str) {
        assert_eq!(slugify(name), slug);
    }

    #[test]
    fn element_ids_follow_the_path() {
        assert_eq!(element_id("home", "button", &[2, 0, 1]), "page.home.button.2.0.1");
    }

    #[test]
    fn second_claim_is_suffixed() {
        let mut taken = IndexSet::new();
        let first = allocate_action_id(action_base_id("home", "button", "Save"), "page.home.button.0", &mut taken);
        let second = allocate_action_id(action_base_id("home", "button", "Save"), "page.home.button.1", &mut taken);
        assert_eq!(first, "page.home.button.save");
        assert_eq!(second, "page.home.button.save__button_1");
        assert_eq!(taken.len(), 2);
    }
}
