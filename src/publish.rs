//! Exports the [`Publisher`], which stages, commits, and pushes the site
//! through `git`.

use crate::config::GitSettings;
use log::info;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One line of `git status --porcelain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    /// The two-letter status code, trimmed (e.g. `M`, `??`).
    pub status: String,
    pub file: String,
}

/// The working-tree state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Status {
    /// `None` before the first commit.
    pub branch: Option<String>,

    /// The abbreviated hash and subject of the last commit.
    pub last_commit: Option<String>,
    pub changes: Vec<FileStatus>,
}

/// The outcome of [`Publisher::publish`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// There was nothing to commit; nothing was pushed.
    NoChanges,

    /// The changes were committed and pushed.
    Published { files: usize, message: String },
}

/// Parses `git status --porcelain` output.
pub fn parse_porcelain(output: &str) -> Vec<FileStatus> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| FileStatus {
            status: line[..2].trim().to_owned(),
            file: line[3..].to_owned(),
        })
        .collect()
}

/// Runs `git` in the site root.
#[derive(Clone, Debug)]
pub struct Publisher {
    repository: PathBuf,
    settings: GitSettings,
}

impl Publisher {
    pub fn new(repository: &Path, settings: &GitSettings) -> Publisher {
        Publisher {
            repository: repository.to_owned(),
            settings: settings.clone(),
        }
    }

    pub fn status(&self) -> Result<Status> {
        self.check_enabled()?;
        let changes = parse_porcelain(&self.git_ok(&["status", "--porcelain"])?);
        let branch = self
            .git(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .ok()
            .map(|s| s.trim().to_owned());
        let last_commit = self
            .git(&["log", "-1", "--format=%h %s"])?
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        Ok(Status {
            branch,
            last_commit,
            changes,
        })
    }

    /// Stages everything, commits with `message`, and pushes. A clean tree
    /// (or a commit reporting "nothing to commit") yields
    /// [`Outcome::NoChanges`].
    pub fn publish(&self, message: &str) -> Result<Outcome> {
        self.check_enabled()?;
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let changes = parse_porcelain(&self.git_ok(&["status", "--porcelain"])?);
        if changes.is_empty() {
            return Ok(Outcome::NoChanges);
        }

        self.git_ok(&["add", "-A"])?;

        let mut commit: Vec<String> = Vec::new();
        if let Some(name) = &self.settings.user_name {
            commit.push("-c".to_owned());
            commit.push(format!("user.name={}", name));
        }
        if let Some(email) = &self.settings.user_email {
            commit.push("-c".to_owned());
            commit.push(format!("user.email={}", email));
        }
        commit.extend(vec!["commit".to_owned(), "-m".to_owned(), message.to_owned()]);
        let commit: Vec<&str> = commit.iter().map(String::as_str).collect();
        if let Err(output) = self.git(&commit)? {
            if output.contains("nothing to commit") {
                return Ok(Outcome::NoChanges);
            }
            return Err(Error::CommandFailed {
                command: "git commit".to_owned(),
                output,
            });
        }

        self.git_ok(&["push"])?;
        info!("Published {} changed files: {}", changes.len(), message);
        Ok(Outcome::Published {
            files: changes.len(),
            message: message.to_owned(),
        })
    }

    fn check_enabled(&self) -> Result<()> {
        if self.settings.enabled {
            Ok(())
        } else {
            Err(Error::Disabled)
        }
    }

    // Runs git, returning its stdout on success and its combined output on
    // failure.
    fn git(&self, args: &[&str]) -> Result<std::result::Result<String, String>> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repository)
            .output()
            .map_err(Error::Spawn)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(Ok(stdout))
        } else {
            Ok(Err(stdout + &String::from_utf8_lossy(&output.stderr)))
        }
    }

    fn git_ok(&self, args: &[&str]) -> Result<String> {
        self.git(args)?.map_err(|output| Error::CommandFailed {
            command: format!("git {}", args.join(" ")),
            output,
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for publishing.
#[derive(Debug)]
pub enum Error {
    /// Returned when version control is disabled in the configuration.
    Disabled,

    /// Returned for an empty commit message.
    EmptyMessage,

    /// Returned when `git` can't be started.
    Spawn(io::Error),

    /// Returned when a `git` step exits unsuccessfully.
    CommandFailed { command: String, output: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Disabled => f.write_str("version control is disabled"),
            Error::EmptyMessage => f.write_str("a commit message is required"),
            Error::Spawn(err) => write!(f, "starting git: {}", err),
            Error::CommandFailed { command, output } => {
                write!(f, "'{}' failed:\n{}", command, output)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_porcelain() {
        let output = " M content/blog/a.md\n?? content/blog/new.md\nR  old.md -> new.md\n\n";
        assert_eq!(
            parse_porcelain(output),
            vec![
                FileStatus {
                    status: "M".to_owned(),
                    file: "content/blog/a.md".to_owned(),
                },
                FileStatus {
                    status: "??".to_owned(),
                    file: "content/blog/new.md".to_owned(),
                },
                FileStatus {
                    status: "R".to_owned(),
                    file: "old.md -> new.md".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_disabled() {
        let settings = GitSettings {
            enabled: false,
            user_name: None,
            user_email: None,
        };
        let publisher = Publisher::new(Path::new("."), &settings);
        assert!(matches!(publisher.status(), Err(Error::Disabled)));
        assert!(matches!(publisher.publish("x"), Err(Error::Disabled)));
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_publish_commits_then_reports_push_failure() -> std::io::Result<()> {
        if !git_available() {
            return Ok(());
        }
        let dir = TempDir::new()?;
        let init = Command::new("git")
            .args(&["init", "-q"])
            .current_dir(dir.path())
            .status()?;
        assert!(init.success());

        let publisher = Publisher::new(
            dir.path(),
            &GitSettings {
                enabled: true,
                user_name: Some("Site Admin".to_owned()),
                user_email: Some("admin@example.org".to_owned()),
            },
        );
        assert_eq!(publisher.publish("nothing yet").unwrap(), Outcome::NoChanges);
        assert!(matches!(publisher.publish("  "), Err(Error::EmptyMessage)));

        fs::write(dir.path().join("post.md"), "---\ntitle: \"Hi\"\n---\n")?;
        let status = publisher.status().unwrap();
        assert_eq!(
            status.changes,
            vec![FileStatus {
                status: "??".to_owned(),
                file: "post.md".to_owned(),
            }]
        );
        assert_eq!(status.last_commit, None);

        // No remote is configured, so the push step fails after the commit.
        match publisher.publish("Add post") {
            Err(Error::CommandFailed { command, .. }) => assert_eq!(command, "git push"),
            other => panic!("expected push failure: {:?}", other),
        }
        let status = publisher.status().unwrap();
        assert!(status.changes.is_empty());
        assert!(status.last_commit.unwrap().ends_with(" Add post"));
        Ok(())
    }
}
