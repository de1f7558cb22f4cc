//! Loads the `runestone.yaml` project file into a [`Config`]. Nothing here
//! is global: the pieces of a [`Config`] are handed to the components that
//! need them when they're constructed.

use crate::schema::{ContentType, ContentTypes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "runestone.yaml";

#[derive(Deserialize)]
struct Project {
    #[serde(default)]
    site_url: Option<Url>,

    #[serde(default)]
    site_root: Option<PathBuf>,

    #[serde(default)]
    default_author: String,

    #[serde(default)]
    default_language: Option<String>,

    #[serde(default)]
    languages: Vec<Language>,

    #[serde(default)]
    build: BuildSettings,

    #[serde(default)]
    git: GitSettings,

    #[serde(default)]
    content_types: Vec<ContentType>,
}

/// A content language and the directory holding its content tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,

    #[serde(default)]
    pub name: String,

    /// Relative to the site root in the project file; absolute once loaded.
    pub content_dir: PathBuf,
}

/// The external programs run by [`crate::build::Builder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// The static-site generator: program followed by leading arguments.
    /// `--minify` is appended when it runs.
    #[serde(default = "default_generator")]
    pub generator: Vec<String>,

    /// The search indexer, run after a successful build. Empty disables it.
    #[serde(default)]
    pub indexer: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> BuildSettings {
        BuildSettings {
            generator: default_generator(),
            indexer: Vec::new(),
        }
    }
}

fn default_generator() -> Vec<String> {
    vec!["hugo".to_owned()]
}

/// Version-control settings used by [`crate::publish::Publisher`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSettings {
    #[serde(default = "enabled")]
    pub enabled: bool,

    /// The commit identity, passed per command rather than written into the
    /// repository's configuration.
    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub user_email: Option<String>,
}

impl Default for GitSettings {
    fn default() -> GitSettings {
        GitSettings {
            enabled: true,
            user_name: None,
            user_email: None,
        }
    }
}

fn enabled() -> bool {
    true
}

/// The project configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The site root: the generator's working directory and the
    /// version-control root.
    pub site_root: PathBuf,
    pub site_url: Option<Url>,
    pub default_author: String,

    /// The code of the default language; always one of `languages`.
    pub default_language: String,

    /// The configured languages in file order, with absolute content
    /// directories.
    pub languages: Vec<Language>,
    pub build: BuildSettings,
    pub git: GitSettings,
    pub content_types: ContentTypes,
}

impl Config {
    /// Finds the project file in `dir` or the nearest parent directory that
    /// has one, and loads it.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        for ancestor in dir.ancestors() {
            let path = ancestor.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path);
            }
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    /// Loads the project file at `path`. The site root defaults to the
    /// file's directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        let project: Project =
            serde_yaml::from_reader(file).map_err(|err| Error::Parse {
                path: path.to_owned(),
                err,
            })?;
        let project_dir = match path.parent() {
            Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
            Some(dir) => dir,
            None => Path::new("."),
        };
        Config::from_project(project, project_dir)
    }

    /// Parses project YAML as if it were read from a file in `project_dir`.
    pub fn from_yaml(yaml: &str, project_dir: &Path) -> Result<Config> {
        let project: Project =
            serde_yaml::from_str(yaml).map_err(|err| Error::Parse {
                path: project_dir.join(PROJECT_FILE),
                err,
            })?;
        Config::from_project(project, project_dir)
    }

    fn from_project(project: Project, project_dir: &Path) -> Result<Config> {
        let site_root = match project.site_root {
            Some(root) => project_dir.join(root),
            None => project_dir.to_owned(),
        };

        let mut languages = project.languages;
        if languages.is_empty() {
            languages.push(Language {
                code: project
                    .default_language
                    .clone()
                    .unwrap_or_else(|| "en".to_owned()),
                name: String::new(),
                content_dir: PathBuf::from("content"),
            });
        }
        for language in &mut languages {
            if language.code.trim().is_empty() {
                return Err(Error::Invalid("a language has an empty code".to_owned()));
            }
            if language.name.is_empty() {
                language.name = language.code.clone();
            }
            language.content_dir = site_root.join(&language.content_dir);
        }

        let default_language = match project.default_language {
            Some(code) => {
                if !languages.iter().any(|l| l.code == code) {
                    return Err(Error::UnknownLanguage(code));
                }
                code
            }
            None => languages[0].code.clone(),
        };

        if project.build.generator.is_empty() {
            return Err(Error::Invalid("build.generator must name a program".to_owned()));
        }

        Ok(Config {
            site_root,
            site_url: project.site_url,
            default_author: project.default_author,
            default_language,
            languages,
            build: project.build,
            git: project.git,
            content_types: ContentTypes::new(project.content_types),
        })
    }

    /// Looks up a language by code, or the default language for `None`.
    pub fn language(&self, code: Option<&str>) -> Result<&Language> {
        let code = code.unwrap_or(&self.default_language);
        self.languages
            .iter()
            .find(|l| l.code == code)
            .ok_or_else(|| Error::UnknownLanguage(code.to_owned()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the start directory or any
    /// of its parents.
    NotFound(PathBuf),

    /// Returned when the project file can't be opened.
    Open { path: PathBuf, err: io::Error },

    /// Returned when the project file isn't valid.
    Parse { path: PathBuf, err: serde_yaml::Error },

    /// Returned for a language code that isn't configured.
    UnknownLanguage(String),

    /// Returned for settings that parse but make no sense.
    Invalid(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(dir) => write!(
                f,
                "could not find `{}` in '{}' or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::Open { path, err } => {
                write!(f, "opening '{}': {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "loading '{}': {}", path.display(), err)
            }
            Error::UnknownLanguage(code) => write!(f, "unknown language: {}", code),
            Error::Invalid(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) | Error::UnknownLanguage(_) | Error::Invalid(_) => None,
            Error::Open { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
        }
    }
}
