//! Defines the [`TagIndex`], which summarizes how a list field (normally
//! `tags`) is used across a content tree. Tags aren't stored entities; the
//! index is recomputed from the documents whenever it's needed.
//!
//! Tags are grouped by their normalized form (see [`normalize`]), so `Rust`
//! and ` rust ` count as one tag. The displayed name is the first spelling
//! encountered in walk order and every spelling seen is kept in
//! [`TagEntry::variants`].

use crate::content::{ContentRepository, Document, Result};
use crate::tree::Pages;
use serde::Serialize;
use std::collections::HashMap;

/// The list field indexed unless another one is requested.
pub const DEFAULT_FIELD: &str = "tags";

/// The matching form of a tag: trimmed and lowercased.
pub fn normalize(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// A document which carries a tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArticleRef {
    pub title: String,
    pub path: String,
}

/// The usage of one tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    /// The display name: the first spelling encountered.
    pub name: String,

    /// The tag's URL slug, as used by taxonomy pages.
    pub slug: String,

    /// The number of documents carrying the tag.
    pub count: usize,

    /// Every distinct (trimmed) spelling seen, in encounter order.
    pub variants: Vec<String>,

    pub articles: Vec<ArticleRef>,
}

/// Tag usage for one list field across a content tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagIndex {
    field: String,
    entries: Vec<TagEntry>,
}

impl TagIndex {
    /// Walks every Markdown file below the repository root (landing pages
    /// included) and indexes `field`. Unreadable files are logged and
    /// skipped.
    pub fn build(repository: &ContentRepository, field: &str) -> Result<TagIndex> {
        let documents = repository.documents(Pages::All)?;
        Ok(TagIndex::from_documents(&documents, field))
    }

    /// Indexes `field` over `documents`. A document counts at most once per
    /// tag, however many spellings of it the document lists.
    pub fn from_documents<'a, I>(documents: I, field: &str) -> TagIndex
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut entries: Vec<TagEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let tags = match document.frontmatter.list(field) {
                Some(tags) => tags,
                None => continue,
            };
            let mut seen_here: Vec<String> = Vec::new();
            for tag in tags {
                let spelling = tag.trim();
                if spelling.is_empty() {
                    continue;
                }
                let key = normalize(spelling);
                let position = *positions.entry(key.clone()).or_insert_with(|| {
                    entries.push(TagEntry {
                        name: spelling.to_owned(),
                        slug: slug::slugify(spelling),
                        count: 0,
                        variants: Vec::new(),
                        articles: Vec::new(),
                    });
                    entries.len() - 1
                });
                let entry = &mut entries[position];
                if !entry.variants.iter().any(|v| v == spelling) {
                    entry.variants.push(spelling.to_owned());
                }
                if !seen_here.contains(&key) {
                    entry.count += 1;
                    entry.articles.push(ArticleRef {
                        title: document.title().to_owned(),
                        path: document.relative_path.clone(),
                    });
                    seen_here.push(key);
                }
            }
        }

        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| normalize(&a.name).cmp(&normalize(&b.name)))
                .then_with(|| a.name.cmp(&b.name))
        });
        TagIndex {
            field: field.to_owned(),
            entries,
        }
    }

    /// The indexed field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// All entries, most used first, then by name.
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Looks a tag up by any of its spellings.
    pub fn get(&self, tag: &str) -> Option<&TagEntry> {
        let key = normalize(tag);
        self.entries.iter().find(|entry| normalize(&entry.name) == key)
    }

    /// The number of documents carrying `tag`; zero when unused.
    pub fn count(&self, tag: &str) -> usize {
        self.get(tag).map_or(0, |entry| entry.count)
    }

    /// Just the display names, in index order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::{Frontmatter, Value};
    use chrono::Utc;

    fn document(path: &str, title: &str, tags: &[&str]) -> Document {
        let mut frontmatter = Frontmatter::new();
        frontmatter.insert("title", title);
        frontmatter.insert("tags", tags.to_vec());
        Document {
            relative_path: path.to_owned(),
            section: "blog".to_owned(),
            category: None,
            slug: path.trim_end_matches(".md").to_owned(),
            frontmatter,
            body: String::new(),
            has_frontmatter: true,
            modified: Utc::now(),
        }
    }

    #[test]
    fn test_counts_are_case_insensitive() {
        let documents = vec![
            document("blog/a.md", "A", &["Rust", "web"]),
            document("blog/b.md", "B", &[" rust ", "RUST"]),
            document("blog/c.md", "C", &["web", "Go Lang"]),
        ];
        let index = TagIndex::from_documents(&documents, DEFAULT_FIELD);

        assert_eq!(index.names(), vec!["Rust", "web", "Go Lang"]);

        let rust = index.get("rust").unwrap();
        assert_eq!(rust.count, 2);
        assert_eq!(rust.variants, vec!["Rust", "rust", "RUST"]);
        assert_eq!(
            rust.articles,
            vec![
                ArticleRef {
                    title: "A".to_owned(),
                    path: "blog/a.md".to_owned(),
                },
                ArticleRef {
                    title: "B".to_owned(),
                    path: "blog/b.md".to_owned(),
                },
            ]
        );
        assert_eq!(index.get("Go Lang").unwrap().slug, "go-lang");
        assert_eq!(index.count("WEB"), 2);
        assert_eq!(index.count("missing"), 0);
    }

    #[test]
    fn test_other_fields_and_non_lists() {
        let mut with_keywords = document("blog/k.md", "K", &[]);
        with_keywords
            .frontmatter
            .insert("keywords", vec!["seo", "", "  "]);
        let mut scalar_tags = document("blog/s.md", "S", &[]);
        scalar_tags.frontmatter.insert("tags", Value::from("solo"));

        let documents = vec![with_keywords, scalar_tags];
        let keywords = TagIndex::from_documents(&documents, "keywords");
        assert_eq!(keywords.field(), "keywords");
        assert_eq!(keywords.names(), vec!["seo"]);

        let tags = TagIndex::from_documents(&documents, DEFAULT_FIELD);
        assert!(tags.is_empty());
    }
}
