use crate::model::Link;
use crate::outcome::{Issue, Outcome};
use url::Url;

/// True when `value` parses as an absolute http or https URL.
pub fn is_valid_url(value: &str) -> bool {
    match Url::parse(value.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Explains why a link cannot be published, or `None` when it can.
pub fn check_link(link: &Link) -> Option<Issue> {
    if link.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
        return Some(Issue::MissingName {
            id: link.id.clone(),
        });
    }
    match link.href.as_deref().map(str::trim) {
        None | Some("") => Some(Issue::MissingHref {
            id: link.id.clone(),
            name: link.name.clone(),
        }),
        Some(href) if !is_valid_url(href) => Some(Issue::InvalidHref {
            id: link.id.clone(),
            href: href.to_string(),
        }),
        Some(_) => None,
    }
}

/// Keeps links that carry a name and a usable href, in input order.
pub fn filter_valid(links: Vec<Link>) -> Outcome<Vec<Link>> {
    let mut kept = Vec::with_capacity(links.len());
    let mut issues = Vec::new();
    for link in links {
        match check_link(&link) {
            Some(issue) => issues.push(issue),
            None => kept.push(link),
        }
    }
    Outcome::with_issues(kept, issues)
}
