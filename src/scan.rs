//! A lint pass over every language's content tree. It reports file and folder
//! names that don't follow the lowercase-hyphen convention, sections and
//! categories without a landing page, missing or oversized fields, and how
//! much of the default language each translation covers.

use crate::content::{self, Document};
use crate::frontmatter::{Frontmatter, Value};
use crate::path::{slug_from_title, INDEX_FILE_NAME};
use crate::schema::ContentType;
use crate::site::{self, Site};
use crate::tree::{self, Pages};
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Fields every document and landing page needs.
pub const REQUIRED_FIELDS: &[&str] = &["title", "description"];

/// Fields documents should have.
pub const RECOMMENDED_FIELDS: &[&str] = &["date", "author", "translationKey"];

/// Longer descriptions get cut off in search results.
pub const MAX_DESCRIPTION_LENGTH: usize = 160;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Naming,
    Structure,
    Frontmatter,
    Seo,
    Translation,
}

/// One finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: Kind,
    pub language: String,

    /// Relative to the language's content root. Directories end in `/`.
    pub path: String,
    pub message: String,
    pub fix: String,
}

/// How many of the default language's translation keys a language has.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub language: String,
    pub language_name: String,
    pub translated: usize,
    pub total: usize,
    pub percent: usize,
}

impl Coverage {
    fn new(language: &str, language_name: &str, translated: usize, total: usize) -> Coverage {
        Coverage {
            language: language.to_owned(),
            language_name: language_name.to_owned(),
            translated,
            total,
            percent: if total == 0 {
                0
            } else {
                (translated * 100 + total / 2) / total
            },
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} articles translated ({}%)",
            self.language_name, self.translated, self.total, self.percent
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// The number of Markdown files read, landing pages included.
    pub scanned: usize,

    /// Errors first, then warnings, then info.
    pub issues: Vec<Issue>,
    pub coverage: Vec<Coverage>,
}

impl ScanReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "scanned {} files: {} errors, {} warnings, {} info",
            self.scanned,
            self.count(Severity::Error),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )
    }
}

/// Scans every configured language. Languages whose content directory is
/// missing are reported, not failed.
pub fn scan(site: &Site) -> site::Result<ScanReport> {
    let config = site.config();
    let default = config.language(None)?;
    let known_sections = if default.content_dir.is_dir() {
        directory_names(&default.content_dir)?
    } else {
        Vec::new()
    };

    let mut report = ScanReport::default();
    let mut default_keys: Option<HashSet<String>> = None;
    let mut translated_keys = Vec::new();

    for language in &config.languages {
        let is_default = language.code == default.code;
        let mut scan = Scan {
            language: &language.code,
            issues: &mut report.issues,
        };

        if !language.content_dir.is_dir() {
            scan.push(
                if is_default {
                    Severity::Error
                } else {
                    Severity::Info
                },
                Kind::Structure,
                "",
                format!("Content directory missing for {}", language.name),
                format!("Create directory: {}", language.content_dir.display()),
            );
            translated_keys.push((language, HashSet::new()));
            continue;
        }

        let repository = site.repository(Some(language.code.as_str()))?;
        let documents = repository.documents(Pages::All)?;
        for document in &documents {
            let content_type = repository.content_types().for_section(&document.section);
            scan.document(document, content_type, &known_sections, !is_default);
        }
        scan.structure(&language.content_dir)?;

        report.scanned += documents.len();
        let keys = translation_keys(&documents);
        if is_default {
            default_keys = Some(keys);
        } else {
            translated_keys.push((language, keys));
        }
    }

    if let Some(default_keys) = default_keys.filter(|keys| !keys.is_empty()) {
        for (language, keys) in translated_keys {
            let coverage = Coverage::new(
                &language.code,
                &language.name,
                keys.intersection(&default_keys).count(),
                default_keys.len(),
            );
            report.issues.push(Issue {
                severity: Severity::Info,
                kind: Kind::Translation,
                language: language.code.clone(),
                path: String::new(),
                message: coverage.to_string(),
                fix: if coverage.translated < coverage.total {
                    "Create missing translations".to_owned()
                } else {
                    "All articles translated".to_owned()
                },
            });
            report.coverage.push(coverage);
        }
    }

    for parity in site.section_parity()? {
        let (severity, fix) = match parity.severity {
            site::Severity::Warning => (
                Severity::Warning,
                format!(
                    "Create the section folder and {} for {}",
                    INDEX_FILE_NAME, parity.language
                ),
            ),
            site::Severity::Info => (
                Severity::Info,
                format!("This section only exists in {}", parity.language),
            ),
        };
        report.issues.push(Issue {
            severity,
            kind: Kind::Translation,
            path: format!("{}/", parity.section),
            language: parity.language,
            message: parity.message,
            fix,
        });
    }

    report.issues.sort_by_key(|issue| issue.severity);
    info!("Scan finished: {}", report);
    Ok(report)
}

struct Scan<'a> {
    language: &'a str,
    issues: &'a mut Vec<Issue>,
}

impl<'a> Scan<'a> {
    fn push(
        &mut self,
        severity: Severity,
        kind: Kind,
        path: &str,
        message: String,
        fix: String,
    ) {
        self.issues.push(Issue {
            severity,
            kind,
            language: self.language.to_owned(),
            path: path.to_owned(),
            message,
            fix,
        });
    }

    fn document(
        &mut self,
        document: &Document,
        content_type: &ContentType,
        known_sections: &[String],
        translation: bool,
    ) {
        let path = document.relative_path.as_str();
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let frontmatter = &document.frontmatter;

        if file_name == INDEX_FILE_NAME {
            for field in REQUIRED_FIELDS {
                self.required(path, frontmatter, field);
            }
            self.description_length(path, frontmatter);
            return;
        }

        if file_name.chars().any(char::is_uppercase) {
            self.push(
                Severity::Error,
                Kind::Naming,
                path,
                "Filename must be lowercase".to_owned(),
                format!("Rename to: {}", file_name.to_lowercase()),
            );
        }
        if file_name.contains(|c: char| c == '_' || c == ' ') {
            self.push(
                Severity::Error,
                Kind::Naming,
                path,
                "Filename must use hyphens, not spaces or underscores".to_owned(),
                format!("Rename to: {}.md", suggested_name(&document.slug)),
            );
        }

        if !path.contains('/') {
            self.push(
                Severity::Warning,
                Kind::Structure,
                path,
                "Document is outside any section".to_owned(),
                "Move it into a section folder".to_owned(),
            );
        } else if !known_sections.contains(&document.section) {
            self.push(
                Severity::Warning,
                Kind::Structure,
                path,
                format!(
                    "Unknown section: '{}' (expected: {})",
                    document.section,
                    known_sections.join(", ")
                ),
                "Move to a known section or add the section to the default language".to_owned(),
            );
        }

        for issue in content_type.validate(frontmatter) {
            self.push(
                Severity::Error,
                Kind::Frontmatter,
                path,
                issue.message,
                format!("Fix '{}' in the frontmatter", issue.field),
            );
        }
        for field in REQUIRED_FIELDS {
            if content_type.field(field).is_none() {
                self.required(path, frontmatter, field);
            }
        }
        if content_type
            .field("description")
            .and_then(|f| f.max_length)
            .is_none()
        {
            self.description_length(path, frontmatter);
        }

        for field in RECOMMENDED_FIELDS {
            let required = content_type.field(field).map_or(false, |f| f.required);
            let reported_below = translation && *field == "translationKey";
            if !required && !reported_below && is_missing(frontmatter, field) {
                self.push(
                    Severity::Info,
                    Kind::Frontmatter,
                    path,
                    format!("Missing recommended field: {}", field),
                    format!("Consider adding '{}' to frontmatter", field),
                );
            }
        }
        if translation && is_missing(frontmatter, "translationKey") {
            self.push(
                Severity::Error,
                Kind::Translation,
                path,
                "Missing translationKey (required for translations)".to_owned(),
                "Add the translationKey of the original article".to_owned(),
            );
        }
    }

    fn required(&mut self, path: &str, frontmatter: &Frontmatter, field: &str) {
        if is_missing(frontmatter, field) {
            self.push(
                Severity::Error,
                Kind::Frontmatter,
                path,
                format!("Missing required field: {}", field),
                format!("Add '{}' to frontmatter", field),
            );
        }
    }

    fn description_length(&mut self, path: &str, frontmatter: &Frontmatter) {
        let length = frontmatter
            .str("description")
            .map_or(0, |d| d.chars().count());
        if length > MAX_DESCRIPTION_LENGTH {
            self.push(
                Severity::Warning,
                Kind::Seo,
                path,
                format!(
                    "Description too long ({} chars, max {})",
                    length, MAX_DESCRIPTION_LENGTH
                ),
                "Shorten description for better SEO".to_owned(),
            );
        }
    }

    // Landing pages of sections and categories, and category folder names.
    fn structure(&mut self, content_dir: &Path) -> site::Result<()> {
        for section_dir in subdirectories(content_dir)? {
            let section = dir_name(&section_dir);
            if !section_dir.join(INDEX_FILE_NAME).is_file() {
                self.push(
                    Severity::Error,
                    Kind::Structure,
                    &format!("{}/{}", section, INDEX_FILE_NAME),
                    format!("Section '{}' missing {}", section, INDEX_FILE_NAME),
                    format!("Create {} with title and description", INDEX_FILE_NAME),
                );
            }

            for category_dir in subdirectories(&section_dir)? {
                let category = dir_name(&category_dir);
                if !category_dir.join(INDEX_FILE_NAME).is_file() {
                    self.push(
                        Severity::Warning,
                        Kind::Structure,
                        &format!("{}/{}/{}", section, category, INDEX_FILE_NAME),
                        format!("Category '{}' missing {}", category, INDEX_FILE_NAME),
                        format!("Create {} with title and description", INDEX_FILE_NAME),
                    );
                }
                if category.contains(|c: char| c.is_uppercase() || c == '_' || c == ' ') {
                    self.push(
                        Severity::Error,
                        Kind::Naming,
                        &format!("{}/{}/", section, category),
                        format!("Category folder name invalid: '{}'", category),
                        format!("Rename to: {}", suggested_name(&category)),
                    );
                }
            }
        }
        Ok(())
    }
}

fn is_missing(frontmatter: &Frontmatter, field: &str) -> bool {
    frontmatter.get(field).map_or(true, Value::is_empty)
}

// Underscores read as word breaks.
fn suggested_name(name: &str) -> String {
    slug_from_title(&name.replace('_', " "))
}

// The translation keys of a language's documents (landing pages excluded).
fn translation_keys(documents: &[Document]) -> HashSet<String> {
    documents
        .iter()
        .filter(|d| !d.relative_path.ends_with(INDEX_FILE_NAME))
        .filter_map(|d| d.frontmatter.str("translationKey"))
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .collect()
}

fn subdirectories(dir: &Path) -> site::Result<Vec<std::path::PathBuf>> {
    Ok(tree::subdirectories(dir).map_err(content::Error::from)?)
}

fn directory_names(dir: &Path) -> site::Result<Vec<String>> {
    Ok(subdirectories(dir)?.iter().map(|d| dir_name(d)).collect())
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
