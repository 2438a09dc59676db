//! Content records served by the demo application
//!
//! A tiny in-memory repository standing in for the real content database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A published item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Renders the item page. Every field is HTML-escaped.
    pub fn render(&self) -> String {
        format!(
            "<article id=\"item-{}\"><h1>{}</h1><p>{}</p></article>",
            escape_html(&self.id),
            escape_html(&self.title),
            escape_html(&self.body)
        )
    }
}

/// Renders the item list page.
pub fn render_list(items: &[Item]) -> String {
    let entries: String = items
        .iter()
        .map(|item| {
            format!(
                "<li><a href=\"/item/{}\">{}</a></li>",
                escape_html(&item.id),
                escape_html(&item.title)
            )
        })
        .collect();
    format!("<ul class=\"items\">{entries}</ul>")
}

/// Escapes text for use in element content and quoted attributes.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Items keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ContentRepo {
    items: BTreeMap<String, Item>,
}

impl ContentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository with a few sample items.
    pub fn seeded() -> Self {
        let mut repo = Self::new();
        repo.upsert(Item::new("1", "Hello", "First post."));
        repo.upsert(Item::new("2", "Caching", "Views are memoized per URL."));
        repo.upsert(Item::new("3", "Invalidation", "Edits purge related pages."));
        repo
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn list(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    /// Inserts or replaces an item; returns whether it already existed.
    pub fn upsert(&mut self, item: Item) -> bool {
        self.items.insert(item.id.clone(), item).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_repo() {
        let repo = ContentRepo::seeded();
        assert_eq!(repo.list().len(), 3);
        assert_eq!(repo.get("1").unwrap().title, "Hello");
    }

    #[test]
    fn test_upsert_and_render() {
        let mut repo = ContentRepo::new();
        assert!(!repo.upsert(Item::new("9", "Nine", "body")));
        assert!(repo.upsert(Item::new("9", "Nine v2", "body")));

        let html = repo.get("9").unwrap().render();
        assert!(html.contains("Nine v2"));
        assert!(render_list(&repo.list()).contains("/item/9"));
    }

    #[test]
    fn test_render_escapes_markup() {
        let item = Item::new("7\"x", "<script>alert(1)</script>", "Fish & \'chips\'");

        let html = item.render();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Fish &amp; &#39;chips&#39;"));
        assert!(html.contains("id=\"item-7&quot;x\""));

        let list = render_list(&[item]);
        assert!(!list.contains("<script>"));
        assert!(list.contains("href=\"/item/7&quot;x\""));
    }
}
