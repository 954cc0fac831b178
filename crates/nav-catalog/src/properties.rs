use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalField {
    Name,
    Description,
    Url,
    Tags,
    Category,
}

/// Candidate source column names per logical field. Matching is
/// case-insensitive and the earliest candidate present on a record wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyTables {
    pub name: Vec<String>,
    pub description: Vec<String>,
    pub url: Vec<String>,
    pub tags: Vec<String>,
    pub category: Vec<String>,
}

const NAME_CANDIDATES: &[&str] = &[
    "Name", "Title", "Site Name", "名称", "标题", "网站名称", "网站标题", "导航名称",
];
const DESCRIPTION_CANDIDATES: &[&str] = &[
    "Description", "Desc", "描述", "说明", "简介", "网站描述", "备注",
];
const URL_CANDIDATES: &[&str] = &[
    "URL", "Link", "Website URL", "链接", "网址", "网站链接", "地址", "网站地址",
];
const TAG_CANDIDATES: &[&str] = &[
    "Tag", "Tags", "Website Tags", "标签", "网站标签", "导航标签", "关键词",
];
const CATEGORY_CANDIDATES: &[&str] = &[
    "Category",
    "Category Link",
    "Website Categories",
    "Category ID",
    "分类",
    "分类关联",
    "分类ID",
    "导航分类",
    "分类名称",
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for PropertyTables {
    fn default() -> Self {
        Self {
            name: owned(NAME_CANDIDATES),
            description: owned(DESCRIPTION_CANDIDATES),
            url: owned(URL_CANDIDATES),
            tags: owned(TAG_CANDIDATES),
            category: owned(CATEGORY_CANDIDATES),
        }
    }
}

#[derive(Deserialize)]
struct TableOverrides {
    name: Option<Vec<String>>,
    description: Option<Vec<String>>,
    url: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    category: Option<Vec<String>>,
}

impl PropertyTables {
    pub fn candidates(&self, field: LogicalField) -> &[String] {
        match field {
            LogicalField::Name => &self.name,
            LogicalField::Description => &self.description,
            LogicalField::Url => &self.url,
            LogicalField::Tags => &self.tags,
            LogicalField::Category => &self.category,
        }
    }

    /// Builds tables from a JSON object; absent or empty lists keep the defaults.
    pub fn from_json(value: &Value) -> Result<Self> {
        let overrides: TableOverrides =
            serde_json::from_value(value.clone()).context("invalid property table overrides")?;
        let defaults = Self::default();
        let pick = |custom: Option<Vec<String>>, fallback: Vec<String>| {
            custom
                .map(|names| {
                    names
                        .into_iter()
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|names| !names.is_empty())
                .unwrap_or(fallback)
        };
        Ok(Self {
            name: pick(overrides.name, defaults.name),
            description: pick(overrides.description, defaults.description),
            url: pick(overrides.url, defaults.url),
            tags: pick(overrides.tags, defaults.tags),
            category: pick(overrides.category, defaults.category),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read property tables {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse property tables {}", path.display()))?;
        Self::from_json(&value)
    }

    pub fn lookup<'a>(
        &self,
        properties: &'a Map<String, Value>,
        field: LogicalField,
    ) -> Option<&'a Value> {
        find_property(properties, self.candidates(field))
    }
}

/// Returns the value of the first candidate that names a property on the record.
///
/// Candidate order decides between two synonym columns on one record, not the
/// record's own key order (which `serde_json::Map` does not keep).
pub fn find_property<'a>(
    properties: &'a Map<String, Value>,
    candidates: &[String],
) -> Option<&'a Value> {
    let keys: Vec<(String, &'a Value)> = properties
        .iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();
    candidates.iter().find_map(|candidate| {
        let wanted = candidate.to_lowercase();
        keys.iter()
            .find(|(key, _)| *key == wanted)
            .map(|(_, value)| *value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn find_property_is_case_insensitive() {
        let record = props(json!({ "website url": { "url": "https://a.example" } }));
        let found = find_property(&record, &PropertyTables::default().url).unwrap();
        assert_eq!(found["url"], "https://a.example");
    }

    #[test]
    fn find_property_prefers_earlier_candidates() {
        let record = props(json!({
            "Link": { "url": "https://second.example" },
            "URL": { "url": "https://first.example" }
        }));
        let found = find_property(&record, &PropertyTables::default().url).unwrap();
        assert_eq!(found["url"], "https://first.example");
    }

    #[test]
    fn find_property_matches_localized_names() {
        let record = props(json!({ "网站名称": { "title": [] } }));
        assert!(PropertyTables::default()
            .lookup(&record, LogicalField::Name)
            .is_some());
        assert!(PropertyTables::default()
            .lookup(&record, LogicalField::Description)
            .is_none());
    }

    #[test]
    fn from_json_overrides_only_given_fields() {
        let tables = PropertyTables::from_json(&json!({
            "name": ["Site", "  "],
            "tags": []
        }))
        .unwrap();
        assert_eq!(tables.name, vec!["Site".to_string()]);
        assert_eq!(tables.tags, PropertyTables::default().tags);
        assert_eq!(tables.url, PropertyTables::default().url);
    }

    #[test]
    fn from_json_rejects_wrong_shape() {
        assert!(PropertyTables::from_json(&json!({ "name": "Site" })).is_err());
    }
}
