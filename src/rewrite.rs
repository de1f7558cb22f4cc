//! Bulk tag mutations. A [`TagRewriter`] renames, merges, or deletes a tag in
//! every document of a content tree that carries it. The operations are
//! best effort: each affected document is rewritten on its own (under its
//! path lock), a failure is recorded and the walk carries on, and nothing is
//! rolled back.

use crate::content::{ContentRepository, Error, Result};
use crate::frontmatter::Frontmatter;
use crate::tag::{normalize, DEFAULT_FIELD};
use crate::tree::{self, Pages};
use log::{info, warn};
use serde::Serialize;
use std::fmt;

/// A document that couldn't be rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: String,
    pub message: String,
}

/// The outcome of a bulk rewrite.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// The number of documents written.
    pub count: usize,

    /// The relative paths of the documents written.
    pub files: Vec<String>,

    pub failures: Vec<Failure>,

    /// The number of Markdown files visited.
    pub scanned: usize,
}

impl fmt::Display for RewriteReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} of {} files updated", self.count, self.scanned)?;
        if !self.failures.is_empty() {
            write!(f, ", {} failed", self.failures.len())?;
        }
        Ok(())
    }
}

/// Applies tag mutations across one content tree.
#[derive(Clone, Debug)]
pub struct TagRewriter {
    repository: ContentRepository,
    field: String,
}

impl TagRewriter {
    /// Creates a rewriter for the `tags` field of `repository`'s tree.
    pub fn new(repository: ContentRepository) -> TagRewriter {
        TagRewriter {
            repository,
            field: DEFAULT_FIELD.to_owned(),
        }
    }

    /// Targets another list field, e.g. `keywords`.
    pub fn with_field(mut self, field: &str) -> TagRewriter {
        self.field = field.to_owned();
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Replaces every spelling of `old` with `new`, keeping its position.
    /// The resulting list is de-duplicated case-insensitively (first
    /// occurrence wins).
    pub fn rename(&self, old: &str, new: &str) -> Result<RewriteReport> {
        let (old, new) = (old.trim(), new.trim());
        if old.is_empty() || new.is_empty() {
            return Err(Error::Validation(
                "both the old and the new tag name are required".to_owned(),
            ));
        }
        if old == new {
            return Err(Error::Validation(format!(
                "'{}' is already named '{}'",
                old, new
            )));
        }

        let key = normalize(old);
        let report = self.apply(|tags| {
            if !tags.iter().any(|t| normalize(t) == key) {
                return false;
            }
            let renamed: Vec<String> = tags
                .iter()
                .map(|t| {
                    if normalize(t) == key {
                        new.to_owned()
                    } else {
                        t.clone()
                    }
                })
                .collect();
            let renamed = dedup(renamed);
            if renamed == *tags {
                return false;
            }
            *tags = renamed;
            true
        })?;
        info!("Renamed {} '{}' to '{}': {}", self.field, old, new, report);
        Ok(report)
    }

    /// Removes every spelling of `source` and adds `target` to each
    /// document that had `source` and doesn't already carry `target`.
    /// Afterwards no document carries `source`, and every document that did
    /// carries `target`.
    pub fn merge(&self, source: &str, target: &str) -> Result<RewriteReport> {
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(Error::Validation(
                "both the source and the target tag are required".to_owned(),
            ));
        }
        let (source_key, target_key) = (normalize(source), normalize(target));
        if source_key == target_key {
            return Err(Error::Validation(format!(
                "cannot merge '{}' into itself; rename it to change its spelling",
                source
            )));
        }

        let report = self.apply(|tags| {
            if !tags.iter().any(|t| normalize(t) == source_key) {
                return false;
            }
            tags.retain(|t| normalize(t) != source_key);
            if !tags.iter().any(|t| normalize(t) == target_key) {
                tags.push(target.to_owned());
            }
            true
        })?;
        info!("Merged {} '{}' into '{}': {}", self.field, source, target, report);
        Ok(report)
    }

    /// Removes every spelling of `tag`. A list left empty is removed from
    /// the frontmatter altogether.
    pub fn delete(&self, tag: &str) -> Result<RewriteReport> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::Validation("a tag name is required".to_owned()));
        }

        let key = normalize(tag);
        let report = self.apply(|tags| {
            let before = tags.len();
            tags.retain(|t| normalize(t) != key);
            tags.len() != before
        })?;
        info!("Deleted {} '{}': {}", self.field, tag, report);
        Ok(report)
    }

    // Visits every Markdown file and runs `edit` on the field's list. Files
    // without the field (or where it isn't a list) are left alone, as are
    // files where `edit` reports no change.
    fn apply<F>(&self, edit: F) -> Result<RewriteReport>
    where
        F: Fn(&mut Vec<String>) -> bool,
    {
        let mut report = RewriteReport::default();
        for result in tree::markdown_files(self.repository.root(), Pages::All) {
            let path = match result {
                Ok(path) => path,
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    report.failures.push(Failure {
                        path: err
                            .path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            report.scanned += 1;
            let relative = self.repository.relative(&path)?;
            match self
                .repository
                .modify(&path, |frontmatter| self.edit_field(frontmatter, &edit))
            {
                Ok(true) => {
                    report.count += 1;
                    report.files.push(relative);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!("Failed to rewrite {}: {}", relative, err);
                    report.failures.push(Failure {
                        path: relative,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn edit_field<F>(&self, frontmatter: &mut Frontmatter, edit: &F) -> bool
    where
        F: Fn(&mut Vec<String>) -> bool,
    {
        let changed = match frontmatter.list_mut(&self.field) {
            Some(tags) => edit(tags),
            None => return false,
        };
        if changed && frontmatter.list(&self.field).map_or(false, <[String]>::is_empty) {
            frontmatter.remove(&self.field);
        }
        changed
    }
}

fn dedup(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut unique = Vec::with_capacity(tags.len());
    for tag in tags {
        let key = normalize(&tag);
        if !seen.contains(&key) {
            seen.push(key);
            unique.push(tag);
        }
    }
    unique
}
