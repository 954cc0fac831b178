use crate::aggregate::{alias_display, slugify};
use crate::model::Link;
use crate::outcome::{Issue, Outcome};
use crate::properties::{LogicalField, PropertyTables};
use crate::validate::is_valid_url;
use serde::Deserialize;
use serde_json::{Map, Value};

/// The slice of a Notion page object the extractor reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl RawRecord {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Maps a record onto a [`Link`]. Missing or unusable fields never fail the
/// call; they surface as issues next to the partially filled link.
pub fn extract(record: &RawRecord, tables: &PropertyTables) -> Outcome<Link> {
    let props = &record.properties;
    let name = tables
        .lookup(props, LogicalField::Name)
        .and_then(text_value);
    let description = tables
        .lookup(props, LogicalField::Description)
        .and_then(text_value);
    let href = tables.lookup(props, LogicalField::Url).and_then(url_value);
    let tags = tables
        .lookup(props, LogicalField::Tags)
        .map(tag_values)
        .unwrap_or_default();
    let raw_category = tables
        .lookup(props, LogicalField::Category)
        .and_then(category_value);

    let category_name = raw_category
        .as_deref()
        .map(|raw| alias_display(raw).unwrap_or(raw).to_string());
    let category_id = slugify(raw_category.as_deref());

    let mut issues = Vec::new();
    if name.is_none() {
        issues.push(Issue::MissingName {
            id: record.id.clone(),
        });
    }
    match href.as_deref() {
        None => issues.push(Issue::MissingHref {
            id: record.id.clone(),
            name: name.clone(),
        }),
        Some(value) if !is_valid_url(value) => issues.push(Issue::InvalidHref {
            id: record.id.clone(),
            href: value.to_string(),
        }),
        Some(_) => {}
    }

    Outcome::with_issues(
        Link {
            id: record.id.clone(),
            name,
            description,
            href,
            tags,
            category_name,
            category_id,
        },
        issues,
    )
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// First `title` or `rich_text` run.
fn text_value(property: &Value) -> Option<String> {
    ["title", "rich_text"].iter().find_map(|kind| {
        property
            .get(*kind)
            .and_then(Value::as_array)
            .and_then(|runs| runs.first())
            .and_then(|run| run.get("plain_text"))
            .and_then(Value::as_str)
            .and_then(non_empty)
    })
}

fn url_value(property: &Value) -> Option<String> {
    property
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .and_then(non_empty)
}

fn tag_values(property: &Value) -> Vec<String> {
    property
        .get("multi_select")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|option| option.get("name").and_then(Value::as_str))
                .filter_map(non_empty)
                .collect()
        })
        .unwrap_or_default()
}

fn category_value(property: &Value) -> Option<String> {
    let is_relation = match property.get("type").and_then(Value::as_str) {
        Some(kind) => kind == "relation",
        None => property.get("relation").is_some(),
    };
    if is_relation {
        return property
            .get("relation")
            .and_then(Value::as_array)
            .and_then(|related| related.first())
            .and_then(|first| first.get("id"))
            .and_then(Value::as_str)
            .and_then(non_empty);
    }
    property
        .get("select")
        .and_then(|select| select.get("name"))
        .and_then(Value::as_str)
        .and_then(non_empty)
}
