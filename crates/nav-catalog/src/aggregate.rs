use crate::model::{Category, Link};
use std::collections::{BTreeMap, HashMap};

pub const UNCATEGORIZED: &str = "uncategorized";

/// Canonical category key and its localized display name.
pub const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("tools", "工具"),
    ("resources", "资源"),
    ("websites", "网站"),
    ("design", "设计"),
    ("development", "开发"),
    ("education", "教育"),
    ("entertainment", "娱乐"),
    ("social", "社交"),
    ("utilities", "实用工具"),
];

/// Display name for a canonical key, e.g. `tools` -> `工具`.
pub fn alias_display(key: &str) -> Option<&'static str> {
    CATEGORY_ALIASES
        .iter()
        .find(|(canonical, _)| *canonical == key)
        .map(|(_, display)| *display)
}

/// Canonical key for a display name, e.g. `工具` -> `tools`.
pub fn alias_key(display: &str) -> Option<&'static str> {
    CATEGORY_ALIASES
        .iter()
        .find(|(_, name)| *name == display)
        .map(|(canonical, _)| *canonical)
}

pub fn slugify(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|value| !value.is_empty()) else {
        return UNCATEGORIZED.to_string();
    };
    if let Some(key) = alias_key(raw) {
        return key.to_string();
    }

    let lowered = raw.to_lowercase();
    let hyphenated = lowered.split_whitespace().collect::<Vec<_>>().join("-");
    let slug: String = hyphenated
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-' || *ch == '_')
        .collect();

    if slug.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        slug
    }
}

/// Per-category counts in first-seen order.
pub fn aggregate(links: &[Link]) -> Vec<Category> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut categories: Vec<Category> = Vec::new();

    for link in links {
        match positions.get(link.category_id.as_str()) {
            Some(&index) => categories[index].count += 1,
            None => {
                positions.insert(link.category_id.as_str(), categories.len());
                categories.push(Category {
                    id: link.category_id.clone(),
                    name: link
                        .category_name
                        .clone()
                        .unwrap_or_else(|| link.category_id.clone()),
                    count: 1,
                });
            }
        }
    }

    categories
}

pub fn group_by_category(links: &[Link]) -> BTreeMap<String, Vec<Link>> {
    let mut grouped: BTreeMap<String, Vec<Link>> = BTreeMap::new();
    for link in links {
        grouped
            .entry(link.category_id.clone())
            .or_default()
            .push(link.clone());
    }
    grouped
}

/// Case-insensitive, stable ordering by link name.
pub fn sort_by_name(links: &mut [Link]) {
    links.sort_by_cached_key(|link| link.name_str().to_lowercase());
}
