//! CRUD over the Markdown documents of one content tree. The
//! [`ContentRepository`] combines the frontmatter codec with a
//! [`PathResolver`] so that every path a caller hands in is confined to the
//! content root before anything touches the disk.

use crate::frontmatter::{self, is_valid_key, Frontmatter, Value};
use crate::lock::PathLocks;
use crate::path::{self, is_plain_segment, sanitize_slug, DocumentPath, PathResolver};
use crate::schema::ContentTypes;
use crate::tree::{self, Pages};
use crate::util;
use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Today's date in the `YYYY-MM-DD` form used by `date` and `lastmod`.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// A document read from disk.
#[derive(Clone, Debug, Serialize)]
pub struct Document {
    /// The path relative to the content root, e.g. `blog/rust/hello.md`.
    pub relative_path: String,
    pub section: String,
    pub category: Option<String>,
    pub slug: String,
    pub frontmatter: Frontmatter,
    pub body: String,

    /// Whether the file had a frontmatter block at all.
    pub has_frontmatter: bool,

    /// The file's last-modified time. Pass it back to
    /// [`ContentRepository::update_if_unmodified`] to detect concurrent
    /// edits.
    pub modified: DateTime<Utc>,
}

impl Document {
    /// The `title` field, or the slug when there is none.
    pub fn title(&self) -> &str {
        match self.frontmatter.str("title") {
            Some(title) if !title.is_empty() => title,
            _ => &self.slug,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.frontmatter.is_draft()
    }

    /// The public URL of the document: `section/[category/]slug/` below
    /// `site_url`.
    pub fn permalink(&self, site_url: &Url) -> Option<Url> {
        let mut path = self.section.clone();
        if let Some(category) = &self.category {
            path.push('/');
            path.push_str(category);
        }
        path.push('/');
        path.push_str(&self.slug);
        path.push('/');
        site_url.join(&path).ok()
    }

    pub fn summary(&self) -> DocumentSummary {
        let text = |key: &str| {
            self.frontmatter
                .get(key)
                .filter(|v| !v.is_empty())
                .map(Value::to_display)
        };
        let list = |key: &str| {
            self.frontmatter
                .list(key)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        };
        DocumentSummary {
            relative_path: self.relative_path.clone(),
            section: self.section.clone(),
            category: self.category.clone(),
            slug: self.slug.clone(),
            title: self.title().to_owned(),
            description: text("description"),
            author: text("author"),
            date: text("date"),
            lastmod: text("lastmod"),
            draft: self.is_draft(),
            tags: list("tags"),
            keywords: list("keywords"),
            translation_key: text("translationKey"),
            modified: self.modified,
        }
    }
}

/// The listing view of a document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub relative_path: String,
    pub section: String,
    pub category: Option<String>,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub lastmod: Option<String>,
    pub draft: bool,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub translation_key: Option<String>,
    pub modified: DateTime<Utc>,
}

/// Narrows [`ContentRepository::list`].
#[derive(Clone, Debug, Default)]
pub struct ListFilter {
    /// Only documents below this top-level directory.
    pub section: Option<String>,

    /// Only documents marked as drafts.
    pub drafts_only: bool,
}

/// The input to [`ContentRepository::create`].
#[derive(Clone, Debug, Default)]
pub struct NewDocument {
    pub section: String,
    pub category: Option<String>,

    /// Sanitized before use, so a title-like value is acceptable.
    pub slug: String,
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// A top-level directory of the content tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub title: String,
    pub count: usize,
}

/// A sub-directory of a section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub slug: String,
    pub name: String,
    pub count: usize,
}

/// What [`ContentRepository::delete`] removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub relative_path: String,
    pub title: String,
}

/// Reads and writes the documents below one content root.
#[derive(Clone, Debug)]
pub struct ContentRepository {
    resolver: PathResolver,
    locks: Arc<PathLocks>,
    default_author: String,
    content_types: Arc<ContentTypes>,
}

impl ContentRepository {
    /// Opens the content tree at `root`, which must exist.
    pub fn new(root: &Path) -> Result<ContentRepository> {
        Ok(ContentRepository {
            resolver: PathResolver::new(root)?,
            locks: Arc::new(PathLocks::new()),
            default_author: String::new(),
            content_types: Arc::new(ContentTypes::default()),
        })
    }

    /// Shares `locks` with other repositories (and rewriters) of the same
    /// process.
    pub fn with_locks(mut self, locks: Arc<PathLocks>) -> ContentRepository {
        self.locks = locks;
        self
    }

    pub fn with_default_author(mut self, author: &str) -> ContentRepository {
        self.default_author = author.to_owned();
        self
    }

    pub fn with_content_types(
        mut self,
        content_types: Arc<ContentTypes>,
    ) -> ContentRepository {
        self.content_types = content_types;
        self
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Reads the document at `relative_path`.
    pub fn get(&self, relative_path: &str) -> Result<Document> {
        let path = self.existing_file(relative_path)?;
        self.load(&path)
    }

    /// Lists document summaries, newest first. `_index.md` landing pages are
    /// not included. Ties on modification time are broken by path.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<DocumentSummary>> {
        let mut summaries = Vec::new();
        for document in self.documents(Pages::ContentOnly)? {
            if let Some(section) = &filter.section {
                if document.section != *section {
                    continue;
                }
            }
            if filter.drafts_only && !document.is_draft() {
                continue;
            }
            summaries.push(document.summary());
        }
        summaries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        Ok(summaries)
    }

    /// Writes a new document. Fields the caller doesn't supply are filled in
    /// from the section's content type and then from the standard defaults
    /// (empty title and description, the default author, today's date,
    /// `draft: false`, empty keyword/tag/related lists, `weight: 0`).
    pub fn create(&self, new: NewDocument) -> Result<Document> {
        let section = new.section.trim();
        if section.is_empty() {
            return Err(Error::Validation("section is required".to_owned()));
        }
        if !is_plain_segment(section) {
            return Err(Error::Validation(format!(
                "invalid section name: '{}'",
                section
            )));
        }
        let category = match new.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(category) if is_plain_segment(category) => Some(category.to_owned()),
            Some(category) => {
                return Err(Error::Validation(format!(
                    "invalid category name: '{}'",
                    category
                )))
            }
        };
        if new.slug.trim().is_empty() {
            return Err(Error::Validation("slug is required".to_owned()));
        }
        let slug = sanitize_slug(&new.slug);
        if slug.is_empty() {
            return Err(Error::Validation(format!(
                "slug '{}' has no usable characters",
                new.slug
            )));
        }
        check_keys(&new.frontmatter)?;

        let document_path = DocumentPath {
            section: section.to_owned(),
            category,
            slug,
        };
        let relative_path = document_path.to_relative();
        let path = self.resolver.resolve(&relative_path)?;
        if path.exists() {
            return Err(Error::AlreadyExists(relative_path));
        }

        let today = today();
        let mut frontmatter = standard_defaults(&self.default_author, &today);
        frontmatter.merge(self.content_types.for_section(section).defaults(&today));
        frontmatter.merge(new.frontmatter);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        util::write_new(&path, &frontmatter::serialize(&frontmatter, &new.body))
            .map_err(|err| match err.kind() {
                io::ErrorKind::AlreadyExists => {
                    Error::AlreadyExists(relative_path.clone())
                }
                _ => Error::Io {
                    path: path.clone(),
                    err,
                },
            })?;
        info!("Created {}", relative_path);
        self.load(&path)
    }

    /// Merges `patch` over the document's frontmatter. Keys absent from
    /// `patch` are untouched; keys whose merged value is empty are removed;
    /// `lastmod` is set to today. The body is replaced only when `body` is
    /// given.
    pub fn update(
        &self,
        relative_path: &str,
        patch: Frontmatter,
        body: Option<String>,
    ) -> Result<Document> {
        self.update_inner(relative_path, patch, body, None)
    }

    /// Like [`ContentRepository::update`], but fails with
    /// [`Error::Conflict`] without writing when the file changed since
    /// `expected` (as returned in [`Document::modified`]).
    pub fn update_if_unmodified(
        &self,
        relative_path: &str,
        patch: Frontmatter,
        body: Option<String>,
        expected: DateTime<Utc>,
    ) -> Result<Document> {
        self.update_inner(relative_path, patch, body, Some(expected))
    }

    fn update_inner(
        &self,
        relative_path: &str,
        patch: Frontmatter,
        body: Option<String>,
        expected: Option<DateTime<Utc>>,
    ) -> Result<Document> {
        check_keys(&patch)?;
        let path = self.existing_file(relative_path)?;
        self.locks.with_lock(&path, || {
            if let Some(expected) = expected {
                let found = modified_time(&path)?;
                if found != expected {
                    return Err(Error::Conflict {
                        path: relative_path.to_owned(),
                        expected,
                        found,
                    });
                }
            }

            let contents = util::read_document(&path).map_err(io_error(&path))?;
            let (mut frontmatter, existing_body) =
                frontmatter::parse(&contents).into_parts();
            frontmatter.merge(patch);
            frontmatter.retain(|_, value| !value.is_empty());
            frontmatter.insert("lastmod", today());
            let body = body.unwrap_or(existing_body);

            util::write_atomic(&path, &frontmatter::serialize(&frontmatter, &body))
                .map_err(io_error(&path))?;
            info!("Updated {}", relative_path);
            self.load(&path)
        })
    }

    /// Removes the document. Parent directories are left in place.
    pub fn delete(&self, relative_path: &str) -> Result<Deleted> {
        let path = self.existing_file(relative_path)?;
        self.locks.with_lock(&path, || {
            let title = self
                .load(&path)
                .map(|document| document.title().to_owned())
                .unwrap_or_default();
            fs::remove_file(&path).map_err(io_error(&path))?;
            info!("Deleted {}", relative_path);
            Ok(Deleted {
                relative_path: self.relative(&path)?,
                title,
            })
        })
    }

    /// Lists the top-level directories with their document counts, sorted
    /// case-insensitively. The title comes from the section's `_index.md`,
    /// else the humanized directory name.
    pub fn sections(&self) -> Result<Vec<SectionInfo>> {
        let mut sections = Vec::new();
        for dir in tree::subdirectories(self.root())? {
            let name = file_name(&dir);
            let mut count = 0;
            for result in tree::markdown_files(&dir, Pages::ContentOnly) {
                result?;
                count += 1;
            }
            let title = self
                .index_title(&dir)
                .unwrap_or_else(|| humanize(&name));
            sections.push(SectionInfo { name, title, count });
        }
        sections.sort_by_key(|section| section.name.to_lowercase());
        Ok(sections)
    }

    /// Lists the categories (sub-directories) of `section`. Counts include
    /// only the documents directly inside each category.
    pub fn categories(&self, section: &str) -> Result<Vec<CategoryInfo>> {
        if !is_plain_segment(section) {
            return Err(Error::Validation(format!(
                "invalid section name: '{}'",
                section
            )));
        }
        let dir = self.resolver.resolve(section)?;
        if !dir.is_dir() {
            return Err(Error::NotFound(section.to_owned()));
        }

        let mut categories = Vec::new();
        for category_dir in tree::subdirectories(&dir)? {
            let mut count = 0;
            let entries =
                fs::read_dir(&category_dir).map_err(io_error(&category_dir))?;
            for entry in entries {
                let entry = entry.map_err(io_error(&category_dir))?;
                let file = entry.path();
                if file.is_file()
                    && file.extension().map_or(false, |e| e == path::MARKDOWN_EXTENSION)
                    && entry.file_name() != path::INDEX_FILE_NAME
                {
                    count += 1;
                }
            }
            let slug = file_name(&category_dir);
            categories.push(CategoryInfo {
                name: title_case(&slug),
                slug,
                count,
            });
        }
        Ok(categories)
    }

    /// Finds the first document (landing pages included) whose
    /// `translationKey` is `key`.
    pub fn find_by_translation_key(&self, key: &str) -> Result<Option<Document>> {
        Ok(self
            .documents(Pages::All)?
            .into_iter()
            .find(|document| document.frontmatter.str("translationKey") == Some(key)))
    }

    /// Loads every document of the tree in walk order. Files that can't be
    /// read are logged and skipped; only a failed walk is an error.
    pub fn documents(&self, pages: Pages) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for result in tree::markdown_files(self.root(), pages) {
            let path = result?;
            match self.load(&path) {
                Ok(document) => documents.push(document),
                Err(err) => warn!("Skipping {}: {}", path.display(), err),
            }
        }
        Ok(documents)
    }

    /// Runs a read-mutate-write cycle on the file at `path` (already
    /// resolved) under its lock. `mutate` returns whether it changed
    /// anything; unchanged files and files without frontmatter aren't
    /// written. Returns whether the file was written.
    pub(crate) fn modify<F>(&self, path: &Path, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Frontmatter) -> bool,
    {
        self.locks.with_lock(path, || {
            let contents = util::read_document(path).map_err(io_error(path))?;
            let (mut frontmatter, body) = match frontmatter::parse(&contents) {
                frontmatter::Parsed::Document { frontmatter, body } => {
                    (frontmatter, body)
                }
                frontmatter::Parsed::NoFrontmatter { .. } => {
                    debug!("Skipping {}: no frontmatter", path.display());
                    return Ok(false);
                }
            };
            if !mutate(&mut frontmatter) {
                return Ok(false);
            }
            util::write_atomic(path, &frontmatter::serialize(&frontmatter, &body))
                .map_err(io_error(path))?;
            Ok(true)
        })
    }

    /// Reads the document at an already-resolved path.
    fn load(&self, path: &Path) -> Result<Document> {
        let relative_path = self.relative(path)?;
        let contents = util::read_document(path).map_err(io_error(path))?;
        let modified = modified_time(path)?;
        let parsed = frontmatter::parse(&contents);
        let has_frontmatter = parsed.has_frontmatter();
        let (frontmatter, body) = parsed.into_parts();
        let DocumentPath {
            section,
            category,
            slug,
        } = DocumentPath::from_relative(&relative_path);
        Ok(Document {
            relative_path,
            section,
            category,
            slug,
            frontmatter,
            body,
            has_frontmatter,
            modified,
        })
    }

    pub(crate) fn relative(&self, path: &Path) -> Result<String> {
        self.resolver
            .relative(path)
            .ok_or_else(|| Error::Path(path::Error::OutsideRoot(path.to_owned())))
    }

    fn existing_file(&self, relative_path: &str) -> Result<PathBuf> {
        let trimmed = relative_path.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(Error::Validation("content path is required".to_owned()));
        }
        let path = self.resolver.resolve(trimmed)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::NotFound(trimmed.to_owned()))
        }
    }

    fn index_title(&self, dir: &Path) -> Option<String> {
        let index = dir.join(path::INDEX_FILE_NAME);
        if !index.is_file() {
            return None;
        }
        let contents = util::read_document(&index).ok()?;
        let (frontmatter, _) = frontmatter::parse(&contents).into_parts();
        frontmatter
            .str("title")
            .filter(|title| !title.is_empty())
            .map(str::to_owned)
    }
}

fn standard_defaults(author: &str, today: &str) -> Frontmatter {
    let mut defaults = Frontmatter::new();
    defaults.insert("title", "");
    defaults.insert("description", "");
    defaults.insert("author", author);
    defaults.insert("date", today);
    defaults.insert("lastmod", today);
    defaults.insert("draft", false);
    defaults.insert("keywords", Vec::<String>::new());
    defaults.insert("tags", Vec::<String>::new());
    defaults.insert("related", Vec::<String>::new());
    defaults.insert("weight", 0i64);
    defaults
}

fn check_keys(frontmatter: &Frontmatter) -> Result<()> {
    match frontmatter.keys().find(|key| !is_valid_key(key)) {
        Some(key) => Err(Error::Validation(format!(
            "invalid frontmatter field name: '{}'",
            key
        ))),
        None => Ok(()),
    }
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    util::modified(path)
        .map(DateTime::<Utc>::from)
        .map_err(io_error(path))
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |err| Error::Io {
        path: path.to_owned(),
        err,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// "getting-started" -> "Getting started"
fn humanize(name: &str) -> String {
    let spaced = name.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// "getting-started" -> "Getting Started"
fn title_case(name: &str) -> String {
    name.split('-')
        .filter(|word| !word.is_empty())
        .map(humanize)
        .collect::<Vec<_>>()
        .join(" ")
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed content operation.
#[derive(Debug)]
pub enum Error {
    /// Returned when a request is rejected before any I/O: a missing section
    /// or slug, an unusable name, or an invalid field name.
    Validation(String),

    /// Returned when the addressed document doesn't exist.
    NotFound(String),

    /// Returned when a create targets an existing file.
    AlreadyExists(String),

    /// Returned by [`ContentRepository::update_if_unmodified`] when the file
    /// changed since it was read.
    Conflict {
        path: String,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },

    /// Returned when a path escapes the content root.
    Path(path::Error),

    /// Returned for I/O failures on a specific file.
    Io { path: PathBuf, err: io::Error },

    /// Returned when walking the content tree fails.
    Walk(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Validation(message) => f.write_str(message),
            Error::NotFound(path) => write!(f, "content not found: {}", path),
            Error::AlreadyExists(path) => {
                write!(f, "content already exists: {}", path)
            }
            Error::Conflict {
                path,
                expected,
                found,
            } => write!(
                f,
                "{} was modified at {} (expected {}); reload and try again",
                path,
                found.to_rfc3339(),
                expected.to_rfc3339()
            ),
            Error::Path(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "I/O error on '{}': {}", path.display(), err)
            }
            Error::Walk(err) => write!(f, "walking content tree: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(_)
            | Error::NotFound(_)
            | Error::AlreadyExists(_)
            | Error::Conflict { .. } => None,
            Error::Path(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::Walk(err) => Some(err),
        }
    }
}

impl From<path::Error> for Error {
    fn from(err: path::Error) -> Error {
        Error::Path(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> Result<(TempDir, ContentRepository)> {
        let dir = TempDir::new().map_err(io_error(Path::new(".")))?;
        let repo = ContentRepository::new(dir.path())?.with_default_author("Site Team");
        Ok((dir, repo))
    }

    fn write(repo: &ContentRepository, relative: &str, contents: &str) {
        let path = repo.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn new_document(section: &str, slug: &str, title: &str) -> NewDocument {
        NewDocument {
            section: section.to_owned(),
            slug: slug.to_owned(),
            frontmatter: vec![("title", title)].into_iter().collect(),
            body: "Body text".to_owned(),
            ..NewDocument::default()
        }
    }

    #[test]
    fn test_create_fills_defaults() -> Result<()> {
        let (_dir, repo) = fixture()?;
        let document = repo.create(new_document("users", "Hello World", "Hello"))?;

        assert_eq!(document.relative_path, "users/hello-world.md");
        assert_eq!(document.section, "users");
        assert_eq!(document.category, None);
        assert_eq!(document.frontmatter.str("title"), Some("Hello"));
        assert_eq!(document.frontmatter.get("draft"), Some(&Value::Bool(false)));
        assert_eq!(document.frontmatter.str("author"), Some("Site Team"));
        assert_eq!(document.frontmatter.str("date"), Some(today().as_str()));
        assert_eq!(document.frontmatter.get("weight"), Some(&Value::Integer(0)));
        assert_eq!(document.frontmatter.list("tags"), Some(&[][..]));
        assert_eq!(document.body, "Body text");
        Ok(())
    }

    #[test]
    fn test_create_with_category() -> Result<()> {
        let (_dir, repo) = fixture()?;
        let mut new = new_document("blog", "intro", "Intro");
        new.category = Some("rust".to_owned());
        let document = repo.create(new)?;
        assert_eq!(document.relative_path, "blog/rust/intro.md");
        assert_eq!(document.category.as_deref(), Some("rust"));
        Ok(())
    }

    #[test]
    fn test_create_rejections() -> Result<()> {
        let (_dir, repo) = fixture()?;
        repo.create(new_document("blog", "taken", "One"))?;

        let cases = vec![
            new_document("", "slug", "T"),
            new_document("blog", " ", "T"),
            new_document("blog", "!!!", "T"),
            new_document("..", "slug", "T"),
            new_document("a/b", "slug", "T"),
        ];
        for new in cases {
            match repo.create(new.clone()) {
                Err(Error::Validation(_)) => {}
                other => panic!("expected validation error for {:?}: {:?}", new, other),
            }
        }

        let mut bad_key = new_document("blog", "bad-key", "T");
        bad_key.frontmatter.insert("not valid", "x");
        assert!(matches!(repo.create(bad_key), Err(Error::Validation(_))));

        match repo.create(new_document("blog", "taken", "Two")) {
            Err(Error::AlreadyExists(path)) => assert_eq!(path, "blog/taken.md"),
            other => panic!("expected AlreadyExists: {:?}", other),
        }
        assert_eq!(repo.get("blog/taken.md")?.title(), "One");
        Ok(())
    }

    #[test]
    fn test_get_missing_and_outside() -> Result<()> {
        let (_dir, repo) = fixture()?;
        assert!(matches!(repo.get("blog/nope.md"), Err(Error::NotFound(_))));
        assert!(matches!(
            repo.get("../etc/passwd"),
            Err(Error::Path(path::Error::OutsideRoot(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_get_without_frontmatter() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(&repo, "notes/plain.md", "just text\n");
        let document = repo.get("/notes/plain.md")?;
        assert!(!document.has_frontmatter);
        assert!(document.frontmatter.is_empty());
        assert_eq!(document.body, "just text\n");
        assert_eq!(document.title(), "plain");
        Ok(())
    }

    #[test]
    fn test_update_merge_semantics() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(
            &repo,
            "blog/post.md",
            "---\ntitle: \"Old\"\ndescription: \"X\"\n---\nOriginal body\n",
        );

        let patch: Frontmatter = vec![("title", "New")].into_iter().collect();
        let document = repo.update("blog/post.md", patch, None)?;
        let expected: Frontmatter = vec![
            ("title", "New".to_owned()),
            ("description", "X".to_owned()),
            ("lastmod", today()),
        ]
        .into_iter()
        .collect();
        assert_eq!(document.frontmatter, expected);
        assert_eq!(document.body, "Original body\n");

        let clear: Frontmatter = vec![("description", "")].into_iter().collect();
        let document = repo.update("blog/post.md", clear, Some("New body".to_owned()))?;
        assert!(!document.frontmatter.contains_key("description"));
        assert_eq!(document.body, "New body");
        Ok(())
    }

    #[test]
    fn test_update_missing() -> Result<()> {
        let (_dir, repo) = fixture()?;
        assert!(matches!(
            repo.update("blog/none.md", Frontmatter::new(), None),
            Err(Error::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_update_if_unmodified() -> Result<()> {
        let (_dir, repo) = fixture()?;
        let created = repo.create(new_document("blog", "cas", "First"))?;

        let stale = created.modified - chrono::Duration::seconds(10);
        let patch: Frontmatter = vec![("title", "Second")].into_iter().collect();
        match repo.update_if_unmodified("blog/cas.md", patch.clone(), None, stale) {
            Err(Error::Conflict { .. }) => {}
            other => panic!("expected Conflict: {:?}", other),
        }
        assert_eq!(repo.get("blog/cas.md")?.title(), "First");

        let updated =
            repo.update_if_unmodified("blog/cas.md", patch, None, created.modified)?;
        assert_eq!(updated.title(), "Second");
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let (_dir, repo) = fixture()?;
        repo.create(new_document("blog", "gone", "Gone"))?;
        let deleted = repo.delete("blog/gone.md")?;
        assert_eq!(deleted.title, "Gone");
        assert_eq!(deleted.relative_path, "blog/gone.md");
        assert!(repo.root().join("blog").is_dir());
        assert!(matches!(repo.delete("blog/gone.md"), Err(Error::NotFound(_))));
        assert!(matches!(repo.delete("../x.md"), Err(Error::Path(_))));
        Ok(())
    }

    #[test]
    fn test_list_filters_and_order() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(&repo, "blog/_index.md", "---\ntitle: \"Blog\"\n---\n");
        write(&repo, "blog/a.md", "---\ntitle: \"A\"\ndraft: true\n---\n");
        write(&repo, "blog/rust/b.md", "---\ntitle: \"B\"\n---\n");
        write(&repo, "docs/c.md", "---\ntitle: \"C\"\ndraft: \"true\"\n---\n");

        let all = repo.list(&ListFilter::default())?;
        let mut paths: Vec<_> = all.iter().map(|s| s.relative_path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["blog/a.md", "blog/rust/b.md", "docs/c.md"]);
        for pair in all.windows(2) {
            assert!(
                pair[0].modified > pair[1].modified
                    || (pair[0].modified == pair[1].modified
                        && pair[0].relative_path < pair[1].relative_path)
            );
        }

        let blog = repo.list(&ListFilter {
            section: Some("blog".to_owned()),
            drafts_only: false,
        })?;
        assert_eq!(blog.len(), 2);

        let drafts = repo.list(&ListFilter {
            section: None,
            drafts_only: true,
        })?;
        let mut draft_paths: Vec<_> =
            drafts.iter().map(|s| s.relative_path.as_str()).collect();
        draft_paths.sort();
        assert_eq!(draft_paths, vec!["blog/a.md", "docs/c.md"]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_documents_are_skipped() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, repo) = fixture()?;
        write(&repo, "blog/a.md", "---\ntitle: \"A\"\ntranslationKey: \"k\"\n---\n");
        write(&repo, "blog/x.md", "---\ntitle: \"X\"\ntranslationKey: \"k\"\n---\n");
        let locked = repo.root().join("blog/x.md");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // File permissions don't bind a privileged user.
        if fs::read(&locked).is_ok() {
            return Ok(());
        }

        let listed = repo.list(&ListFilter::default());
        let found = repo.find_by_translation_key("k");
        let indexed = crate::tag::TagIndex::build(&repo, "tags");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        let paths: Vec<_> = listed?.into_iter().map(|s| s.relative_path).collect();
        assert_eq!(paths, vec!["blog/a.md"]);
        assert_eq!(found?.map(|d| d.relative_path), Some("blog/a.md".to_owned()));
        assert!(indexed?.is_empty());
        Ok(())
    }

    #[test]
    fn test_find_by_translation_key_skips_other_keys() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(&repo, "blog/_index.md", "---\ntranslationKey: \"blog\"\n---\n");
        write(&repo, "blog/a.md", "---\ntitle: \"A\"\ntranslationKey: \"a\"\n---\n");
        write(&repo, "blog/plain.md", "no frontmatter");

        let found = repo.find_by_translation_key("blog")?;
        assert_eq!(found.map(|d| d.relative_path), Some("blog/_index.md".to_owned()));
        assert!(repo.find_by_translation_key("missing")?.is_none());
        assert_eq!(repo.documents(Pages::All)?.len(), 3);
        assert_eq!(repo.documents(Pages::ContentOnly)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_sections_and_categories() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(&repo, "blog/_index.md", "---\ntitle: \"The Blog\"\n---\n");
        write(&repo, "blog/a.md", "");
        write(&repo, "blog/getting-started/b.md", "");
        write(&repo, "blog/getting-started/c.md", "");
        write(&repo, "blog/getting-started/_index.md", "");
        write(&repo, "Guides/d.md", "");
        write(&repo, "user-docs/e.md", "");

        let sections = repo.sections()?;
        assert_eq!(
            sections,
            vec![
                SectionInfo {
                    name: "blog".to_owned(),
                    title: "The Blog".to_owned(),
                    count: 3,
                },
                SectionInfo {
                    name: "Guides".to_owned(),
                    title: "Guides".to_owned(),
                    count: 1,
                },
                SectionInfo {
                    name: "user-docs".to_owned(),
                    title: "User docs".to_owned(),
                    count: 1,
                },
            ]
        );

        let categories = repo.categories("blog")?;
        assert_eq!(
            categories,
            vec![CategoryInfo {
                slug: "getting-started".to_owned(),
                name: "Getting Started".to_owned(),
                count: 2,
            }]
        );
        assert!(matches!(repo.categories("missing"), Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_permalink_and_summary() -> Result<()> {
        let (_dir, repo) = fixture()?;
        write(
            &repo,
            "blog/rust/hello.md",
            "---\ntitle: \"Hello\"\ntags: [a, b]\ntranslationKey: \"hello\"\n---\n",
        );
        let document = repo.get("blog/rust/hello.md")?;
        let site = Url::parse("https://example.org/").unwrap();
        assert_eq!(
            document.permalink(&site).unwrap().as_str(),
            "https://example.org/blog/rust/hello/"
        );

        let summary = document.summary();
        assert_eq!(summary.tags, vec!["a", "b"]);
        assert_eq!(summary.translation_key.as_deref(), Some("hello"));
        assert!(!summary.draft);

        let found = repo.find_by_translation_key("hello")?;
        assert_eq!(found.map(|d| d.relative_path).as_deref(), Some("blog/rust/hello.md"));
        assert!(repo.find_by_translation_key("other")?.is_none());
        Ok(())
    }
}
