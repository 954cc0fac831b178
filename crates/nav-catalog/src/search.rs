//! Query-time filtering over a snapshot.
//!
//! Every entry point treats an absent or blank query as "no filter" and hands
//! its inputs back unchanged; an empty result only ever means nothing matched.

use crate::aggregate::{group_by_category, sort_by_name};
use crate::model::{Category, Link};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub categories: Vec<Category>,
    pub links: Vec<Link>,
}

impl SearchResults {
    fn identity(categories: &[Category], links: &[Link]) -> Self {
        Self {
            categories: categories.to_vec(),
            links: links.to_vec(),
        }
    }

    pub fn links_by_category(&self) -> BTreeMap<String, Vec<Link>> {
        group_by_category(&self.links)
    }

    pub fn total(&self) -> usize {
        self.links.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Keep the order the links came in.
    #[default]
    Source,
    Name,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedOptions {
    pub category_id: Option<String>,
    pub sort: SortOrder,
}

/// Case-insensitive substring match, falling back to an ordered subsequence
/// match (`"gh"` matches `"GitHub"`, `"hg"` does not).
pub fn fuzzy_match(text: &str, query: &str) -> bool {
    if text.is_empty() || query.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    let query = query.to_lowercase();
    if text.contains(&query) {
        return true;
    }

    let mut pending = query.chars().peekable();
    for ch in text.chars() {
        match pending.peek() {
            Some(&wanted) if wanted == ch => {
                pending.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    pending.peek().is_none()
}

fn usable_query(query: Option<&str>) -> Option<&str> {
    match query {
        None => {
            tracing::debug!("search called without a query");
            None
        }
        Some(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        }
    }
}

fn link_text_matches(link: &Link, query: &str) -> bool {
    fuzzy_match(link.name_str(), query) || fuzzy_match(link.description_str(), query)
}

pub fn global_search(query: Option<&str>, categories: &[Category], links: &[Link]) -> SearchResults {
    let Some(query) = usable_query(query) else {
        return SearchResults::identity(categories, links);
    };

    SearchResults {
        categories: categories
            .iter()
            .filter(|category| fuzzy_match(&category.name, query))
            .cloned()
            .collect(),
        links: links
            .iter()
            .filter(|link| {
                link_text_matches(link, query) || link.tags.iter().any(|tag| fuzzy_match(tag, query))
            })
            .cloned()
            .collect(),
    }
}

/// Name or description search within one category's links.
pub fn category_search(query: Option<&str>, links: &[Link]) -> Vec<Link> {
    let Some(query) = usable_query(query) else {
        return links.to_vec();
    };
    links
        .iter()
        .filter(|link| link_text_matches(link, query))
        .cloned()
        .collect()
}

fn tag_token_regex() -> Option<&'static Regex> {
    static TAG_TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TAG_TOKEN
        .get_or_init(|| RegexBuilder::new(r"#(\w+)").unicode(true).build().ok())
        .as_ref()
}

/// Splits `#tag` tokens from the rest of the query.
pub fn parse_advanced_query(query: &str) -> (Vec<String>, String) {
    let Some(regex) = tag_token_regex() else {
        return (Vec::new(), query.trim().to_string());
    };
    let tags = regex
        .captures_iter(query)
        .filter_map(|captures| captures.get(1))
        .map(|tag| tag.as_str().to_lowercase())
        .collect();
    let text = regex.replace_all(query, "").trim().to_string();
    (tags, text)
}

/// `#tag` tokens require any listed tag to match any link tag; the remaining
/// text must also match name or description.
pub fn advanced_search(
    query: Option<&str>,
    categories: &[Category],
    links: &[Link],
    options: &AdvancedOptions,
) -> SearchResults {
    let Some(query) = usable_query(query) else {
        return SearchResults::identity(categories, links);
    };
    let (tags, text) = parse_advanced_query(query);

    let categories = if text.is_empty() {
        categories.to_vec()
    } else {
        categories
            .iter()
            .filter(|category| fuzzy_match(&category.name, &text))
            .cloned()
            .collect()
    };

    let mut links: Vec<Link> = links
        .iter()
        .filter(|link| text.is_empty() || link_text_matches(link, &text))
        .filter(|link| {
            tags.is_empty()
                || link
                    .tags
                    .iter()
                    .any(|tag| tags.iter().any(|wanted| fuzzy_match(tag, wanted)))
        })
        .filter(|link| {
            options
                .category_id
                .as_deref()
                .map_or(true, |category_id| link.category_id == category_id)
        })
        .cloned()
        .collect();

    if options.sort == SortOrder::Name {
        sort_by_name(&mut links);
    }

    SearchResults { categories, links }
}

/// Distinct link names containing the query, shortest first.
pub fn suggest(query: &str, links: &[Link], limit: usize) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut names: Vec<&str> = links
        .iter()
        .filter_map(|link| link.name.as_deref())
        .filter(|name| name.to_lowercase().contains(&query))
        .filter(|name| seen.insert(*name))
        .collect();
    names.sort_by_key(|name| name.chars().count());
    names.into_iter().take(limit).map(str::to_string).collect()
}
