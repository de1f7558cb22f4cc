//! Exports the [`Builder`], which runs the external static-site generator
//! and, optionally, the search indexer over the generated output. Programs
//! are spawned directly, never through a shell.

use crate::config::BuildSettings;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The flag appended to the generator command.
pub const MINIFY_FLAG: &str = "--minify";

/// The outcome of a successful build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// The generator's combined stdout and stderr.
    pub output: String,

    /// Whether the indexer was run.
    pub indexer_ran: bool,

    /// Whether the indexer ran and succeeded.
    pub indexer_succeeded: bool,

    /// The indexer's combined output, or the reason it couldn't start.
    pub indexer_output: String,
}

/// Runs the configured generator and indexer in the site root.
#[derive(Clone, Debug)]
pub struct Builder {
    site_root: PathBuf,
    generator: Vec<String>,
    indexer: Vec<String>,
}

impl Builder {
    pub fn new(site_root: &Path, settings: &BuildSettings) -> Builder {
        Builder {
            site_root: site_root.to_owned(),
            generator: settings.generator.clone(),
            indexer: settings.indexer.clone(),
        }
    }

    /// Runs `<generator> --minify`. A non-zero exit fails the build. When
    /// `run_indexer` is set and an indexer is configured it runs next; its
    /// failure is reported but doesn't fail the build.
    pub fn build(&self, run_indexer: bool) -> Result<BuildReport> {
        info!("Building site in {}", self.site_root.display());
        let (success, output) = self.run(&self.generator, &[MINIFY_FLAG])?;
        if !success {
            return Err(Error::GeneratorFailed { output });
        }

        let mut report = BuildReport {
            output,
            indexer_ran: false,
            indexer_succeeded: false,
            indexer_output: String::new(),
        };
        if run_indexer && !self.indexer.is_empty() {
            report.indexer_ran = true;
            match self.run(&self.indexer, &[]) {
                Ok((success, output)) => {
                    report.indexer_succeeded = success;
                    report.indexer_output = output;
                }
                Err(err) => report.indexer_output = err.to_string(),
            }
            if !report.indexer_succeeded {
                warn!("Search indexer failed: {}", report.indexer_output.trim());
            }
        }
        Ok(report)
    }

    fn run(&self, command: &[String], extra: &[&str]) -> Result<(bool, String)> {
        let (program, args) = match command.split_first() {
            Some(split) => split,
            None => return Err(Error::NoProgram),
        };
        let output = Command::new(program)
            .args(args)
            .args(extra)
            .current_dir(&self.site_root)
            .output()
            .map_err(|err| Error::Spawn {
                program: program.clone(),
                err,
            })?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.success(), text))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site.
#[derive(Debug)]
pub enum Error {
    /// Returned when the generator command is empty.
    NoProgram,

    /// Returned when a program can't be started.
    Spawn { program: String, err: io::Error },

    /// Returned when the generator exits unsuccessfully.
    GeneratorFailed { output: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoProgram => f.write_str("no generator program configured"),
            Error::Spawn { program, err } => {
                write!(f, "starting '{}': {}", program, err)
            }
            Error::GeneratorFailed { output } => {
                write!(f, "build failed:\n{}", output)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NoProgram | Error::GeneratorFailed { .. } => None,
            Error::Spawn { program: _, err } => Some(err),
        }
    }
}
