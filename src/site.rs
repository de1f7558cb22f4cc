//! Ties the configured languages together. A [`Site`] hands out one
//! [`ContentRepository`] per language (all sharing one set of path locks)
//! and answers the questions that span languages: which translations of a
//! document exist, and which sections are missing where.

use crate::build::Builder;
use crate::config::{self, Config, Language};
use crate::content::{self, ContentRepository};
use crate::lock::PathLocks;
use crate::publish::Publisher;
use crate::rewrite::TagRewriter;
use crate::schema::ContentTypes;
use crate::tag::TagIndex;
use crate::tree;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Whether one language has a translation of a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub language: String,
    pub language_name: String,
    pub exists: bool,
    pub path: Option<String>,
    pub lastmod: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A section of the default language is missing from a translation.
    Warning,

    /// A section only exists in a translation.
    Info,
}

/// A section which isn't present in every language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParityIssue {
    pub severity: Severity,
    pub language: String,
    pub section: String,
    pub message: String,
}

/// The configured site.
#[derive(Clone, Debug)]
pub struct Site {
    config: Config,
    locks: Arc<PathLocks>,
    content_types: Arc<ContentTypes>,
}

impl Site {
    pub fn new(config: Config) -> Site {
        let content_types = Arc::new(config.content_types.clone());
        Site {
            config,
            locks: Arc::new(PathLocks::new()),
            content_types,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The repository for `language` (the default language for `None`).
    pub fn repository(&self, language: Option<&str>) -> Result<ContentRepository> {
        let language = self.config.language(language)?;
        Ok(ContentRepository::new(&language.content_dir)?
            .with_locks(Arc::clone(&self.locks))
            .with_default_author(&self.config.default_author)
            .with_content_types(Arc::clone(&self.content_types)))
    }

    pub fn tag_index(&self, language: Option<&str>, field: &str) -> Result<TagIndex> {
        let repository = self.repository(language)?;
        Ok(TagIndex::build(&repository, field)?)
    }

    pub fn rewriter(&self, language: Option<&str>, field: &str) -> Result<TagRewriter> {
        Ok(TagRewriter::new(self.repository(language)?).with_field(field))
    }

    pub fn builder(&self) -> Builder {
        Builder::new(&self.config.site_root, &self.config.build)
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(&self.config.site_root, &self.config.git)
    }

    /// Reports, for every language in configuration order, whether a
    /// document with `translationKey: key` exists. Languages whose content
    /// directory is missing report no translation.
    pub fn translation_status(&self, key: &str) -> Result<Vec<Translation>> {
        let mut translations = Vec::with_capacity(self.config.languages.len());
        for language in &self.config.languages {
            let found = if language.content_dir.is_dir() {
                self.repository(Some(language.code.as_str()))?
                    .find_by_translation_key(key)?
            } else {
                None
            };
            translations.push(Translation {
                language: language.code.clone(),
                language_name: language.name.clone(),
                exists: found.is_some(),
                lastmod: found
                    .as_ref()
                    .and_then(|d| d.frontmatter.get("lastmod"))
                    .map(|v| v.to_display()),
                path: found.map(|d| d.relative_path),
            });
        }
        Ok(translations)
    }

    /// Compares every language's sections with the default language's.
    pub fn section_parity(&self) -> Result<Vec<ParityIssue>> {
        let default = self.config.language(None)?;
        let default_sections = sections(default)?;

        let mut issues = Vec::new();
        for language in &self.config.languages {
            if language.code == default.code {
                continue;
            }
            let these = sections(language)?;
            for section in &default_sections {
                if !these.contains(section) {
                    issues.push(ParityIssue {
                        severity: Severity::Warning,
                        language: language.code.clone(),
                        section: section.clone(),
                        message: format!(
                            "Section '{}' exists in {} but not in {}",
                            section, default.code, language.code
                        ),
                    });
                }
            }
            for section in &these {
                if !default_sections.contains(section) {
                    issues.push(ParityIssue {
                        severity: Severity::Info,
                        language: language.code.clone(),
                        section: section.clone(),
                        message: format!(
                            "Section '{}' exists in {} but not in {}",
                            section, language.code, default.code
                        ),
                    });
                }
            }
        }
        Ok(issues)
    }
}

// The section names of one language; none when its directory is missing.
fn sections(language: &Language) -> Result<Vec<String>> {
    if !language.content_dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(tree::subdirectories(&language.content_dir)
        .map_err(content::Error::from)?
        .iter()
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect())
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure of a site-level operation.
#[derive(Debug)]
pub enum Error {
    Config(config::Error),
    Content(content::Error),

    /// Returned when a language's content directory doesn't exist.
    MissingContent(PathBuf),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Content(err) => err.fmt(f),
            Error::MissingContent(dir) => {
                write!(f, "content directory '{}' does not exist", dir.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Content(err) => Some(err),
            Error::MissingContent(_) => None,
        }
    }
}

impl From<config::Error> for Error {
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<content::Error> for Error {
    fn from(err: content::Error) -> Error {
        match err {
            content::Error::Path(crate::path::Error::RootUnavailable { path, .. }) => {
                Error::MissingContent(path)
            }
            err => Error::Content(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const PROJECT: &str = "
default_author: \"Site Team\"
languages:
  - { code: en, name: English, content_dir: content }
  - { code: fr, name: Français, content_dir: content.fr }
  - { code: de, name: Deutsch, content_dir: content.de }
";

    type TestResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

    fn site(files: &[(&str, &str)]) -> TestResult<(TempDir, Site)> {
        let dir = TempDir::new()?;
        for (relative, contents) in files {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
            fs::write(path, contents)?;
        }
        let config = Config::from_yaml(PROJECT, dir.path())?;
        Ok((dir, Site::new(config)))
    }

    #[test]
    fn test_translation_status() -> TestResult<()> {
        let (_dir, site) = site(&[
            (
                "content/blog/hello.md",
                "---\ntitle: \"Hello\"\nlastmod: \"2025-01-15\"\ntranslationKey: \"hello\"\n---\n",
            ),
            (
                "content.fr/blog/bonjour.md",
                "---\ntitle: \"Bonjour\"\ntranslationKey: \"hello\"\n---\n",
            ),
        ])?;

        let status = site.translation_status("hello")?;
        assert_eq!(
            status,
            vec![
                Translation {
                    language: "en".to_owned(),
                    language_name: "English".to_owned(),
                    exists: true,
                    path: Some("blog/hello.md".to_owned()),
                    lastmod: Some("2025-01-15".to_owned()),
                },
                Translation {
                    language: "fr".to_owned(),
                    language_name: "Français".to_owned(),
                    exists: true,
                    path: Some("blog/bonjour.md".to_owned()),
                    lastmod: None,
                },
                Translation {
                    language: "de".to_owned(),
                    language_name: "Deutsch".to_owned(),
                    exists: false,
                    path: None,
                    lastmod: None,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_section_parity() -> TestResult<()> {
        let (_dir, site) = site(&[
            ("content/blog/_index.md", ""),
            ("content/docs/_index.md", ""),
            ("content.fr/blog/_index.md", ""),
            ("content.fr/nouvelles/_index.md", ""),
        ])?;

        let issues = site.section_parity()?;
        let summary: Vec<_> = issues
            .iter()
            .map(|i| (i.severity, i.language.as_str(), i.section.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Severity::Warning, "fr", "docs"),
                (Severity::Info, "fr", "nouvelles"),
                (Severity::Warning, "de", "blog"),
                (Severity::Warning, "de", "docs"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_repositories_share_settings() -> TestResult<()> {
        let (_dir, site) = site(&[("content/.keep", ""), ("content.fr/.keep", "")])?;

        let en = site.repository(None)?;
        let created = en.create(content::NewDocument {
            section: "blog".to_owned(),
            slug: "hi".to_owned(),
            ..Default::default()
        })?;
        assert_eq!(created.frontmatter.str("author"), Some("Site Team"));

        let fr = site.repository(Some("fr"))?;
        assert!(fr.list(&Default::default())?.is_empty());

        assert!(matches!(
            site.repository(Some("de")),
            Err(Error::MissingContent(_))
        ));
        assert!(matches!(
            site.repository(Some("xx")),
            Err(Error::Config(config::Error::UnknownLanguage(_)))
        ));
        Ok(())
    }
}
