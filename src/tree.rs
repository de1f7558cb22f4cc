//! Walks a content tree. The tree isn't held in memory; every listing,
//! index, or bulk rewrite performs its own walk.

use crate::path::{INDEX_FILE_NAME, MARKDOWN_EXTENSION};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Which Markdown files a walk yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pages {
    /// Every Markdown file, landing pages included.
    All,

    /// Content documents only: `_index.md` landing pages are skipped.
    ContentOnly,
}

/// Yields the Markdown files below `root` in a stable (file name) order.
/// Hidden files and directories (names starting with `.`) are skipped, which
/// also keeps in-flight temporary files out of every walk.
pub fn markdown_files(
    root: &Path,
    pages: Pages,
) -> impl Iterator<Item = Result<PathBuf, walkdir::Error>> {
    WalkDir::new(root)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(move |result| match result {
            Err(err) => Some(Err(err)),
            Ok(entry) => {
                if is_markdown(&entry)
                    && !(pages == Pages::ContentOnly && is_index(&entry))
                {
                    Some(Ok(entry.into_path()))
                } else {
                    None
                }
            }
        })
}

/// Returns the immediate sub-directories of `dir`, sorted by name and without
/// hidden entries.
pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut dirs = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if entry.file_type().is_dir() && !is_hidden(&entry) {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION)
}

fn is_index(entry: &DirEntry) -> bool {
    entry.file_name() == INDEX_FILE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_markdown_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let root = dir.path();
        fs::create_dir_all(root.join("blog/rust"))?;
        fs::create_dir_all(root.join(".git"))?;
        fs::write(root.join("blog/_index.md"), "")?;
        fs::write(root.join("blog/b.md"), "")?;
        fs::write(root.join("blog/a.md"), "")?;
        fs::write(root.join("blog/rust/c.md"), "")?;
        fs::write(root.join("blog/notes.txt"), "")?;
        fs::write(root.join("blog/.a.md.123.tmp"), "")?;
        fs::write(root.join(".git/x.md"), "")?;

        let relative = |pages| -> Result<Vec<String>, walkdir::Error> {
            markdown_files(root, pages)
                .map(|r| {
                    r.map(|p| {
                        p.strip_prefix(root)
                            .unwrap()
                            .to_string_lossy()
                            .replace('\\', "/")
                    })
                })
                .collect()
        };

        assert_eq!(
            relative(Pages::All)?,
            vec!["blog/_index.md", "blog/a.md", "blog/b.md", "blog/rust/c.md"]
        );
        assert_eq!(
            relative(Pages::ContentOnly)?,
            vec!["blog/a.md", "blog/b.md", "blog/rust/c.md"]
        );
        Ok(())
    }

    #[test]
    fn test_subdirectories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("docs"))?;
        fs::create_dir_all(dir.path().join("blog/nested"))?;
        fs::create_dir_all(dir.path().join(".hidden"))?;
        fs::write(dir.path().join("file.md"), "")?;

        let names: Vec<_> = subdirectories(dir.path())?
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["blog", "docs"]);
        Ok(())
    }
}
