//! Access to the process table root (normally `/proc`).
//!
//! The aggregation engine never touches the filesystem directly. Everything it
//! needs from the process table (listing, ownership stat, opening per-process
//! files) goes through [`ProcessTable`], so tests and offline analysis can
//! point it at a fixture tree or an instrumented double.

use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Default process table root.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Result of stat-ing one process table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    pub uid: u32,
    /// The entry itself is a symlink (`self`, `thread-self` on a live `/proc`).
    pub is_link: bool,
}

/// Enumerable, stat-able view of a process table.
pub trait ProcessTable {
    /// Root path, used for log messages.
    fn root(&self) -> &Path;

    /// Lists entry names under the root. Fails only if the root itself cannot
    /// be opened.
    fn entries(&self) -> io::Result<Vec<String>>;

    /// Stats `<root>/<entry>`, following symlinks.
    fn metadata(&self, entry: &str) -> io::Result<EntryMeta>;

    /// Opens `<root>/<entry>/<file>` for reading.
    fn open(&self, entry: &str, file: &str) -> io::Result<Box<dyn Read + '_>>;
}

/// Process table backed by a real directory.
#[derive(Debug, Clone)]
pub struct FsProcessTable {
    root: PathBuf,
}

impl FsProcessTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for FsProcessTable {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessTable for FsProcessTable {
    fn root(&self) -> &Path {
        &self.root
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            // Entries can vanish while the directory is being read
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if let Ok(name) = entry.file_name().into_string() {
                out.push(name);
            }
        }
        Ok(out)
    }

    fn metadata(&self, entry: &str) -> io::Result<EntryMeta> {
        let path = self.root.join(entry);
        let meta = fs::metadata(&path)?;
        let is_link = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        Ok(EntryMeta {
            is_dir: meta.is_dir(),
            uid: meta.uid(),
            is_link,
        })
    }

    fn open(&self, entry: &str, file: &str) -> io::Result<Box<dyn Read + '_>> {
        let f = fs::File::open(self.root.join(entry).join(file))?;
        Ok(Box::new(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entries_lists_children() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("1")).unwrap();
        fs::create_dir(dir.path().join("42")).unwrap();
        fs::write(dir.path().join("uptime"), "1.0 2.0").unwrap();

        let table = FsProcessTable::new(dir.path());
        let mut names = table.entries().unwrap();
        names.sort();
        assert_eq!(names, vec!["1", "42", "uptime"]);
    }

    #[test]
    fn test_entries_missing_root() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table = FsProcessTable::new(dir.path().join("nope"));
        assert!(table.entries().is_err());
    }

    #[test]
    fn test_metadata_and_open() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("7")).unwrap();
        fs::write(dir.path().join("7").join("stat"), "7 (x) S").unwrap();

        let table = FsProcessTable::new(dir.path());
        let meta = table.metadata("7").unwrap();
        assert!(meta.is_dir);
        assert!(!meta.is_link);
        assert_eq!(meta.uid, nix::unistd::getuid().as_raw());

        let mut content = String::new();
        table
            .open("7", "stat")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "7 (x) S");

        assert!(table.metadata("8").is_err());
        assert!(table.open("7", "maps").is_err());
    }

    #[test]
    fn test_metadata_follows_symlinked_entries() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("7")).unwrap();
        std::os::unix::fs::symlink("7", dir.path().join("self")).unwrap();

        let table = FsProcessTable::new(dir.path());
        let meta = table.metadata("self").unwrap();
        assert!(meta.is_dir);
        assert!(meta.is_link);
    }
}
