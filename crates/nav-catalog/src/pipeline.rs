use crate::aggregate::aggregate;
use crate::extract::{extract, RawRecord};
use crate::model::{Category, Link};
use crate::outcome::{Issue, Outcome};
use crate::properties::PropertyTables;
use crate::validate::filter_valid;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub links: Vec<Link>,
}

/// Per-record view of extraction, used by diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub index: usize,
    pub link: Option<Link>,
    pub issues: Vec<Issue>,
}

fn parse_record(index: usize, value: Value) -> Result<RawRecord, Issue> {
    RawRecord::from_value(value).map_err(|err| Issue::MalformedRecord {
        index,
        reason: err.to_string(),
    })
}

/// extract -> filter -> aggregate. Issues cover unreadable records and
/// every link the filter dropped.
pub fn build_catalog(records: Vec<Value>, tables: &PropertyTables) -> Outcome<Catalog> {
    let mut issues = Vec::new();
    let mut links = Vec::with_capacity(records.len());

    for (index, value) in records.into_iter().enumerate() {
        match parse_record(index, value) {
            Ok(record) => links.push(extract(&record, tables).value),
            Err(issue) => issues.push(issue),
        }
    }

    let (links, dropped) = filter_valid(links).into_parts();
    issues.extend(dropped);
    let categories = aggregate(&links);

    Outcome::with_issues(Catalog { categories, links }, issues)
}

pub fn inspect_records(records: Vec<Value>, tables: &PropertyTables) -> Vec<RecordReport> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| match parse_record(index, value) {
            Ok(record) => {
                let (link, issues) = extract(&record, tables).into_parts();
                RecordReport {
                    index,
                    link: Some(link),
                    issues,
                }
            }
            Err(issue) => RecordReport {
                index,
                link: None,
                issues: vec![issue],
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(id: &str, name: Option<&str>, url: Option<&str>, category: &str) -> Value {
        let mut properties = json!({
            "Category": { "type": "select", "select": { "name": category } }
        });
        if let Some(name) = name {
            properties["Name"] = json!({ "type": "title", "title": [{ "plain_text": name }] });
        }
        if let Some(url) = url {
            properties["URL"] = json!({ "type": "url", "url": url });
        }
        json!({ "id": id, "properties": properties })
    }

    #[test]
    fn build_catalog_drops_invalid_records_and_counts_the_rest() {
        let records = vec![
            page("a", Some("Notion"), Some("https://notion.so"), "工具"),
            page("b", None, Some("https://b.example"), "工具"),
            page("c", Some("Docs"), Some("not-a-url"), "资源"),
            json!({ "properties": {} }),
            page("d", Some("React"), Some("https://react.dev"), "资源"),
            page("e", Some("Vite"), Some("https://vitejs.dev"), "Build Tools"),
        ];
        let outcome = build_catalog(records, &PropertyTables::default());

        let ids: Vec<_> = outcome.value.links.iter().map(|link| link.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "e"]);

        let categories: Vec<_> = outcome
            .value
            .categories
            .iter()
            .map(|category| (category.id.as_str(), category.name.as_str(), category.count))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("tools", "工具", 1),
                ("resources", "资源", 1),
                ("build-tools", "Build Tools", 1)
            ]
        );

        let reasons: Vec<_> = outcome.issues.iter().map(Issue::reason).collect();
        assert_eq!(reasons, vec!["malformed_record", "missing_name", "invalid_href"]);
    }

    #[test]
    fn inspect_records_keeps_every_record() {
        let reports = inspect_records(
            vec![
                page("a", Some("Notion"), None, "工具"),
                json!("not an object"),
            ],
            &PropertyTables::default(),
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].issues[0].reason(), "missing_href");
        assert!(reports[1].link.is_none());
        assert_eq!(reports[1].issues[0].reason(), "malformed_record");
    }
}
