use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Reads a document as text. Invalid UTF-8 is replaced rather than treated as
/// an error so that one stray byte doesn't hide a document from listings.
pub fn read_document(path: &Path) -> io::Result<String> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Replaces the contents of `path` by writing a sibling temporary file and
/// renaming it over the target, so readers never observe a half-written
/// document.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let temp_path = temp_sibling(path)?;
    if let Err(err) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

/// Writes a new file, failing with [`io::ErrorKind::AlreadyExists`] if
/// something is already at `path`.
pub fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// The last-modified time of `path`.
pub fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn temp_sibling(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let mut temp_path = path.to_path_buf();
    temp_path.set_file_name(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        std::process::id()
    ));
    Ok(temp_path)
}
