//! Maps logical content locations onto paths inside a content root and
//! refuses any path which would land outside of it. Also home to the slug
//! rules used to turn titles into file names.

use log::warn;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// The extension of content documents.
pub const MARKDOWN_EXTENSION: &str = "md";

/// The file name of section and category landing pages.
pub const INDEX_FILE_NAME: &str = "_index.md";

/// Resolves relative paths against a canonical content root.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for `root`, which must exist.
    pub fn new(root: &Path) -> Result<PathResolver> {
        match root.canonicalize() {
            Ok(root) => Ok(PathResolver { root }),
            Err(err) => Err(Error::RootUnavailable {
                path: root.to_owned(),
                err,
            }),
        }
    }

    /// The canonical content root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `relative` onto the root and verifies that the result stays
    /// within it. The target doesn't need to exist; its deepest existing
    /// ancestor is canonicalized so symlinks can't be used to escape.
    ///
    /// Absolute paths, `..` components, symlink escapes, and resolution
    /// failures all yield [`Error::OutsideRoot`].
    pub fn resolve<P: AsRef<Path>>(&self, relative: P) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let outside = || {
            warn!(
                "refusing path outside content root {:?}: {:?}",
                self.root, relative
            );
            Error::OutsideRoot(relative.to_owned())
        };

        let mut joined = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => joined.push(part),
                Component::CurDir => {}
                Component::ParentDir
                | Component::RootDir
                | Component::Prefix(_) => return Err(outside()),
            }
        }

        // Canonicalize the deepest ancestor that exists, then re-attach the
        // components which don't exist yet.
        let mut existing = joined.as_path();
        let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => return Err(outside()),
            }
        }

        let mut resolved = existing.canonicalize().map_err(|_| outside())?;
        for name in missing.into_iter().rev() {
            resolved.push(name);
        }

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(outside())
        }
    }

    /// Returns `path` relative to the root with `/` separators, e.g.
    /// `blog/rust/hello-world.md`.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// The logical address of a document: `section/[category/]slug.md`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentPath {
    pub section: String,
    pub category: Option<String>,
    pub slug: String,
}

impl DocumentPath {
    /// Splits a relative path into section, category, and slug. The section
    /// is the first segment and the slug is the file stem. Only paths with
    /// three or more segments have a category (the second segment).
    pub fn from_relative(relative: &str) -> DocumentPath {
        let parts: Vec<&str> =
            relative.split('/').filter(|p| !p.is_empty()).collect();
        let file_name = parts.last().copied().unwrap_or("");
        let slug = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        DocumentPath {
            section: parts.first().copied().unwrap_or("").to_owned(),
            category: if parts.len() > 2 {
                Some(parts[1].to_owned())
            } else {
                None
            },
            slug,
        }
    }

    /// Renders the relative path with `/` separators.
    pub fn to_relative(&self) -> String {
        match &self.category {
            Some(category) => format!(
                "{}/{}/{}.{}",
                self.section, category, self.slug, MARKDOWN_EXTENSION
            ),
            None => {
                format!("{}/{}.{}", self.section, self.slug, MARKDOWN_EXTENSION)
            }
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_relative())
    }
}

/// Derives a file name stem from a human title: lowercase, whitespace runs
/// become a single hyphen, anything outside `[a-z0-9-]` is dropped, repeated
/// hyphens collapse, and leading or trailing hyphens are trimmed.
///
/// ```
/// assert_eq!(runestone::path::slug_from_title("  Hello,  World! "), "hello-world");
/// ```
pub fn slug_from_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
    }
    slug
}

/// Cleans a caller-supplied slug: a trailing `.md` is dropped and the rest
/// goes through [`slug_from_title`].
pub fn sanitize_slug(slug: &str) -> String {
    let slug = slug.trim();
    let slug = slug
        .strip_suffix(&format!(".{}", MARKDOWN_EXTENSION))
        .unwrap_or(slug);
    slug_from_title(slug)
}

/// Returns whether `segment` can be used as a single directory name below the
/// content root (a section or category).
pub fn is_plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !segment.contains('/')
        && !segment.contains('\\')
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a path resolution failure.
#[derive(Debug)]
pub enum Error {
    /// Returned when a path would resolve outside of the content root.
    OutsideRoot(PathBuf),

    /// Returned when the content root itself can't be canonicalized.
    RootUnavailable { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OutsideRoot(path) => {
                write!(f, "path is outside the content root: {}", path.display())
            }
            Error::RootUnavailable { path, err } => write!(
                f,
                "content root '{}' is unavailable: {}",
                path.display(),
                err
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OutsideRoot(_) => None,
            Error::RootUnavailable { path: _, err } => Some(err),
        }
    }
}
