//! File store abstraction.
//!
//! The reconciler, snapshot writer and generator never touch `std::fs`
//! directly; they go through [`FileStore`] so every mode can be exercised
//! against [`MemoryStore`] in tests. [`FsStore`] is the real disk.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// Byte-addressable store of files and directories.
///
/// Mutating methods take `&self`; implementations that keep state use
/// interior mutability.
pub trait FileStore {
    /// Read the whole file at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate the file at `path` with `data`. The parent must exist.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Remove the regular file at `path`.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create `path` and all missing ancestors. Existing directories are not an error.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove the directory at `path` with everything below it.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Names of the immediate children of `dir`, in no particular order.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read a file as text, replacing invalid UTF-8 sequences.
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let data = self.read(path)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Returns `true` if `path` exists and is not a directory.
    fn is_file(&self, path: &Path) -> bool {
        self.exists(path) && !self.is_dir(path)
    }
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for FsStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .map_err(io::Error::from)
            })
            .collect()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory [`FileStore`].
///
/// Keeps files and directories in ordered maps and counts every mutating
/// call, which makes it suitable for previews and for asserting that a
/// dry run touched nothing.
///
/// The empty path and `/` are always present as directories.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
    mutations: Cell<usize>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file (and its missing parent directories) without counting a mutation.
    pub fn with_file(self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.insert_dirs(parent);
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), content.as_ref().to_vec());
        self
    }

    /// Add a directory (and its missing ancestors) without counting a mutation.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.insert_dirs(path.as_ref());
        self
    }

    /// Text content of the file at `path`, if any.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .borrow()
            .get(path.as_ref())
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    /// Number of mutating calls (write, remove, create) made so far.
    pub fn mutations(&self) -> usize {
        self.mutations.get()
    }

    fn is_root(path: &Path) -> bool {
        path.as_os_str().is_empty() || path == Path::new("/")
    }

    fn insert_dirs(&self, path: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.ancestors() {
            if Self::is_root(ancestor) {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    fn record(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file or directory: {}", path.display()),
        )
    }
}

impl FileStore for MemoryStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.record();
        if self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("is a directory: {}", path.display()),
            ));
        }
        let parent = path.parent().unwrap_or(Path::new(""));
        if !self.is_dir(parent) {
            return Err(Self::not_found(parent));
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.record();
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record();
        if self.files.borrow().contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            ));
        }
        self.insert_dirs(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record();
        if !self.dirs.borrow().contains(path) {
            return Err(Self::not_found(path));
        }
        self.dirs.borrow_mut().retain(|d| !d.starts_with(path));
        self.files.borrow_mut().retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        if !self.is_dir(dir) {
            return Err(Self::not_found(dir));
        }
        let is_child = |p: &Path| p.parent() == Some(dir);
        let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());

        let mut names: Vec<String> = self
            .dirs
            .borrow()
            .iter()
            .filter(|p| is_child(p))
            .filter_map(|p| name(p))
            .collect();
        names.extend(
            self.files
                .borrow()
                .keys()
                .filter(|p| is_child(p))
                .filter_map(|p| name(p)),
        );
        Ok(names)
    }

    fn is_dir(&self, path: &Path) -> bool {
        Self::is_root(path) || self.dirs.borrow().contains(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_dir(path) || self.files.borrow().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_write_requires_parent() {
        let store = MemoryStore::new();
        assert!(store.write(Path::new("a/b.txt"), b"x").is_err());

        store.create_dir_all(Path::new("a")).unwrap();
        store.write(Path::new("a/b.txt"), b"x").unwrap();
        assert_eq!(store.file("a/b.txt").as_deref(), Some("x"));
        assert_eq!(store.mutations(), 3);
    }

    #[test]
    fn test_memory_store_list_children() {
        let store = MemoryStore::new()
            .with_file("top.txt", "1")
            .with_file("src/main.rs", "2")
            .with_dir("src/empty");

        let mut root = store.list(Path::new("")).unwrap();
        root.sort();
        assert_eq!(root, vec!["src", "top.txt"]);

        let mut src = store.list(Path::new("src")).unwrap();
        src.sort();
        assert_eq!(src, vec!["empty", "main.rs"]);
        assert_eq!(store.mutations(), 0);
    }

    #[test]
    fn test_memory_store_list_under_absolute_base() {
        let store = MemoryStore::new().with_file("/work/a.txt", "1");
        assert_eq!(store.list(Path::new("/work")).unwrap(), vec!["a.txt"]);
        assert_eq!(store.list(Path::new("/")).unwrap(), vec!["work"]);
    }

    #[test]
    fn test_memory_store_remove_dir_all() {
        let store = MemoryStore::new()
            .with_file("a/b/c.txt", "1")
            .with_file("ab.txt", "2");

        store.remove_dir_all(Path::new("a")).unwrap();
        assert!(!store.exists(Path::new("a")));
        assert!(!store.exists(Path::new("a/b/c.txt")));
        assert!(store.exists(Path::new("ab.txt")));
    }

    #[test]
    fn test_fs_store_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "1").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut names = FsStore::new().list(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["one.txt", "sub"]);
    }
}
