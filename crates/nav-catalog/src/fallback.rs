use crate::model::{Category, Link, Snapshot, SnapshotOrigin};
use chrono::{DateTime, Utc};

struct FallbackLink {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    href: &'static str,
    tags: &'static [&'static str],
    category_name: &'static str,
    category_id: &'static str,
}

const FALLBACK_CATEGORIES: &[(&str, &str, usize)] =
    &[("tools", "工具", 3), ("resources", "资源", 2), ("websites", "网站", 1)];

const FALLBACK_LINKS: &[FallbackLink] = &[
    FallbackLink {
        id: "1",
        name: "Notion官方",
        description: "强大的笔记和协作工具",
        href: "https://notion.so",
        tags: &["工具", "笔记"],
        category_name: "工具",
        category_id: "tools",
    },
    FallbackLink {
        id: "2",
        name: "GitHub",
        description: "代码托管平台",
        href: "https://github.com",
        tags: &["开发", "协作"],
        category_name: "工具",
        category_id: "tools",
    },
    FallbackLink {
        id: "3",
        name: "React文档",
        description: "React官方文档",
        href: "https://reactjs.org",
        tags: &["前端", "文档"],
        category_name: "资源",
        category_id: "resources",
    },
    FallbackLink {
        id: "4",
        name: "Next.js",
        description: "React框架",
        href: "https://nextjs.org",
        tags: &["前端", "框架"],
        category_name: "工具",
        category_id: "tools",
    },
    FallbackLink {
        id: "5",
        name: "Tailwind CSS",
        description: "实用优先的CSS框架",
        href: "https://tailwindcss.com",
        tags: &["样式", "CSS"],
        category_name: "资源",
        category_id: "resources",
    },
    FallbackLink {
        id: "6",
        name: "Vercel",
        description: "前端部署平台",
        href: "https://vercel.com",
        tags: &["部署", "云服务"],
        category_name: "网站",
        category_id: "websites",
    },
];

pub fn categories() -> Vec<Category> {
    FALLBACK_CATEGORIES
        .iter()
        .map(|(id, name, count)| Category {
            id: id.to_string(),
            name: name.to_string(),
            count: *count,
        })
        .collect()
}

pub fn links() -> Vec<Link> {
    FALLBACK_LINKS
        .iter()
        .map(|link| Link {
            id: link.id.to_string(),
            name: Some(link.name.to_string()),
            description: Some(link.description.to_string()),
            href: Some(link.href.to_string()),
            tags: link.tags.iter().map(|tag| tag.to_string()).collect(),
            category_name: Some(link.category_name.to_string()),
            category_id: link.category_id.to_string(),
        })
        .collect()
}

/// The built-in directory served whenever the upstream pipeline fails.
pub fn snapshot(fetched_at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        categories: categories(),
        links: links(),
        fetched_at,
        origin: SnapshotOrigin::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::validate::filter_valid;

    #[test]
    fn fallback_counts_match_links() {
        assert_eq!(aggregate(&links()), categories());
    }

    #[test]
    fn fallback_links_are_all_valid() {
        let outcome = filter_valid(links());
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.value.len(), 6);
    }
}
