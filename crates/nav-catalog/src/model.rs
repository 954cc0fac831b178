use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A normalized directory link.
///
/// `name` and `href` are optional straight out of extraction; links that made
/// it through [`crate::validate::filter_valid`] always carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub href: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_name: Option<String>,
    pub category_id: String,
}

impl Link {
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn description_str(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Upstream,
    Fallback,
}

impl SnapshotOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotOrigin::Upstream => "upstream",
            SnapshotOrigin::Fallback => "fallback",
        }
    }
}

/// One immutable build of the directory. Replaced as a whole on refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub categories: Vec<Category>,
    pub links: Vec<Link>,
    pub fetched_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    pub fn links_by_category(&self) -> BTreeMap<String, Vec<Link>> {
        crate::aggregate::group_by_category(&self.links)
    }

    pub fn links_in_category(&self, category_id: &str) -> Vec<Link> {
        self.links
            .iter()
            .filter(|link| link.category_id == category_id)
            .cloned()
            .collect()
    }

    pub fn link(&self, link_id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id == link_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }
}
