//! Applying an archive to a file store.
//!
//! The reconciler processes the structure block's directories first, then
//! every section in archive order. Each planned mutation is recorded as a
//! [`Change`]; with `dry_run` set, the plan is computed in full but nothing
//! is written. Errors abort the run and already applied changes stay applied.

use crate::archive::{is_safe_path, Archive, Modifier, Section, StructureEntry};
use crate::error::{Error, Result};
use crate::store::FileStore;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Mode switches threaded through a reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Plan everything, mutate nothing
    pub dry_run: bool,
    /// Delete the archive's files and directories instead of creating them
    pub remove: bool,
}

impl ApplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }
}

/// One planned (or performed) effect on the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    CreateDir(PathBuf),
    RemoveDir(PathBuf),
    WriteFile {
        path: PathBuf,
        modifier: Modifier,
        content: String,
    },
    RemoveFile(PathBuf),
    /// Nothing to do for this path
    Skipped { path: PathBuf, reason: &'static str },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateDir(path) => write!(f, "create directory {}", path.display()),
            Change::RemoveDir(path) => write!(f, "remove directory {}", path.display()),
            Change::WriteFile { path, modifier, content } => {
                let verb = match modifier {
                    Modifier::None => "write",
                    Modifier::Prepend => "prepend to",
                    Modifier::Append => "append to",
                };
                write!(f, "{} {} ({} bytes)", verb, path.display(), content.len())
            }
            Change::RemoveFile(path) => write!(f, "remove file {}", path.display()),
            Change::Skipped { path, reason } => write!(f, "skip {}: {}", path.display(), reason),
        }
    }
}

/// Everything a reconciliation did, or would do under `dry_run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub dry_run: bool,
    pub changes: Vec<Change>,
}

impl ApplyReport {
    /// Final content planned for `path`, from the last write to it
    pub fn planned_content(&self, path: &Path) -> Option<&str> {
        self.changes.iter().rev().find_map(|change| match change {
            Change::WriteFile { path: p, content, .. } if p == path => Some(content.as_str()),
            _ => None,
        })
    }

    /// Number of changes that mutate the store
    pub fn mutation_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| !matches!(c, Change::Skipped { .. }))
            .count()
    }
}

/// Applies archives to a [`FileStore`]
pub struct Reconciler<'a, S: FileStore + ?Sized> {
    store: &'a S,
    options: ApplyOptions,
}

impl<'a, S: FileStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, options: ApplyOptions) -> Self {
        Self { store, options }
    }

    /// Apply `archive` relative to `base`
    pub fn apply(&self, archive: &Archive, base: &Path) -> Result<ApplyReport> {
        self.apply_each(archive, base, |_, _| Ok(()))
    }

    /// Apply `archive`, calling `after` with each section and its resolved
    /// path right after that section has been applied.
    pub fn apply_each<F>(&self, archive: &Archive, base: &Path, mut after: F) -> Result<ApplyReport>
    where
        F: FnMut(&Section, &Path) -> Result<()>,
    {
        let mut pass = Pass {
            store: self.store,
            options: self.options,
            base,
            changes: Vec::new(),
            files: BTreeMap::new(),
            created_dirs: BTreeSet::new(),
            removed_dirs: Vec::new(),
        };

        for entry in archive.directories() {
            pass.directory(entry)?;
        }

        for section in &archive.sections {
            let path = pass.section(section)?;
            after(section, &path)?;
        }

        Ok(ApplyReport {
            dry_run: self.options.dry_run,
            changes: pass.changes,
        })
    }
}

/// State of a single reconciliation.
///
/// `files` shadows the store with what this pass has written or removed, so
/// a dry run composes later sections against earlier planned content.
struct Pass<'a, S: FileStore + ?Sized> {
    store: &'a S,
    options: ApplyOptions,
    base: &'a Path,
    changes: Vec<Change>,
    files: BTreeMap<PathBuf, Option<String>>,
    created_dirs: BTreeSet<PathBuf>,
    removed_dirs: Vec<PathBuf>,
}

impl<S: FileStore + ?Sized> Pass<'_, S> {
    fn directory(&mut self, entry: &StructureEntry) -> Result<()> {
        let path = self.base.join(&entry.path);
        if !is_safe_path(&entry.path) {
            self.skip(path, "path leaves the base directory");
            return Ok(());
        }

        if self.options.remove {
            if self.dir_exists(&path) {
                if !self.options.dry_run {
                    self.store
                        .remove_dir_all(&path)
                        .map_err(|e| Error::store("remove directory", &path, e))?;
                }
                tracing::debug!("{}Removed directory: {}", self.prefix(), path.display());
                self.removed_dirs.push(path.clone());
                self.changes.push(Change::RemoveDir(path));
            } else {
                self.skip(path, "directory does not exist");
            }
        } else {
            self.ensure_dir(&path)?;
        }
        Ok(())
    }

    fn section(&mut self, section: &Section) -> Result<PathBuf> {
        let path = self.base.join(&section.path);

        if self.options.remove {
            if self.current(&path)?.is_some() {
                if !self.options.dry_run {
                    self.store
                        .remove_file(&path)
                        .map_err(|e| Error::store("remove", &path, e))?;
                }
                tracing::debug!("{}Removed file: {}", self.prefix(), path.display());
                self.files.insert(path.clone(), None);
                self.changes.push(Change::RemoveFile(path.clone()));
            } else if self.dir_exists(&path) {
                self.skip(path.clone(), "is a directory");
            } else {
                self.skip(path.clone(), "file does not exist");
            }
            return Ok(path);
        }

        if self.dir_exists(&path) {
            return Err(Error::store("write", &path, other_error("is a directory", &path)));
        }
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }

        let content = match section.modifier {
            Modifier::None => section.body.clone(),
            modifier => modifier.compose(&section.body, self.current(&path)?.as_deref()),
        };

        if !self.options.dry_run {
            self.store
                .write(&path, content.as_bytes())
                .map_err(|e| Error::store("write", &path, e))?;
        }
        tracing::debug!("{}Wrote file ({:?}): {}", self.prefix(), section.modifier, path.display());

        self.files.insert(path.clone(), Some(content.clone()));
        self.changes.push(Change::WriteFile {
            path: path.clone(),
            modifier: section.modifier,
            content,
        });
        Ok(path)
    }

    /// Content of the file at `path` as seen by this pass
    fn current(&self, path: &Path) -> Result<Option<String>> {
        if let Some(state) = self.files.get(path) {
            return Ok(state.clone());
        }
        if self.removed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return Ok(None);
        }
        if !self.store.is_file(path) {
            return Ok(None);
        }
        self.store
            .read_to_string(path)
            .map(Some)
            .map_err(|e| Error::store("read", path, e))
    }

    fn file_exists(&self, path: &Path) -> bool {
        if let Some(state) = self.files.get(path) {
            return state.is_some();
        }
        if self.removed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        self.store.is_file(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        if self.removed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        self.created_dirs.contains(path) || self.store.is_dir(path)
    }

    fn ensure_dir(&mut self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() || self.dir_exists(path) {
            return Ok(());
        }
        // Every ancestor must be a directory or absent.
        if let Some(file) = path
            .ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .find(|a| self.file_exists(a))
        {
            return Err(Error::store("create directory", path, other_error("not a directory", file)));
        }
        if !self.options.dry_run {
            self.store
                .create_dir_all(path)
                .map_err(|e| Error::store("create directory", path, e))?;
        }
        tracing::debug!("{}Created directory: {}", self.prefix(), path.display());
        for ancestor in path.ancestors() {
            self.created_dirs.insert(ancestor.to_path_buf());
        }
        self.changes.push(Change::CreateDir(path.to_path_buf()));
        Ok(())
    }

    fn skip(&mut self, path: PathBuf, reason: &'static str) {
        tracing::debug!("Skipped {}: {}", path.display(), reason);
        self.changes.push(Change::Skipped { path, reason });
    }

    fn prefix(&self) -> &'static str {
        if self.options.dry_run {
            "[dry-run] "
        } else {
            ""
        }
    }
}

fn other_error(what: &str, path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", what, path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::store::MemoryStore;

    fn apply(store: &MemoryStore, text: &str, options: ApplyOptions) -> ApplyReport {
        let archive = Decoder::new().decode(text).unwrap();
        Reconciler::new(store, options)
            .apply(&archive, Path::new(""))
            .unwrap()
    }

    #[test]
    fn test_create_file_in_empty_store() {
        let store = MemoryStore::new();
        apply(&store, "//|| a.txt\nHello", ApplyOptions::new());
        assert_eq!(store.file("a.txt").as_deref(), Some("Hello"));
    }

    #[test]
    fn test_prepend_keeps_trailing_space() {
        let store = MemoryStore::new().with_file("a.txt", "World");
        apply(&store, "//||^ a.txt\nHello ", ApplyOptions::new());
        assert_eq!(store.file("a.txt").as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_append_to_existing() {
        let store = MemoryStore::new().with_file("existing_file.txt", "Existing content.");
        apply(&store, "//||$ existing_file.txt\nAppended content.\n", ApplyOptions::new());
        assert_eq!(
            store.file("existing_file.txt").as_deref(),
            Some("Existing content.Appended content.\n")
        );
    }

    #[test]
    fn test_sequential_appends() {
        let store = MemoryStore::new().with_file("log.txt", "C");
        apply(&store, "//|| $log.txt\nB1\n//|| $log.txt\nB2", ApplyOptions::new());
        assert_eq!(store.file("log.txt").as_deref(), Some("CB1B2"));
    }

    #[test]
    fn test_prepend_and_append_to_missing_file() {
        let store = MemoryStore::new();
        apply(&store, "//|| ^new.txt\nhead\n//|| $other.txt\ntail", ApplyOptions::new());
        assert_eq!(store.file("new.txt").as_deref(), Some("head"));
        assert_eq!(store.file("other.txt").as_deref(), Some("tail"));
    }

    #[test]
    fn test_overwrite_is_idempotent() {
        let store = MemoryStore::new().with_file("a.txt", "old");
        let text = "//|| a.txt\nnew\n//|| dir/b.txt\nB";
        apply(&store, text, ApplyOptions::new());
        let once = (store.file("a.txt"), store.file("dir/b.txt"));
        apply(&store, text, ApplyOptions::new());
        assert_eq!((store.file("a.txt"), store.file("dir/b.txt")), once);
        assert_eq!(once.0.as_deref(), Some("new"));
    }

    #[test]
    fn test_creates_parent_directories() {
        let store = MemoryStore::new();
        let report = apply(&store, "//|| a/b/c.txt\nx", ApplyOptions::new());
        assert!(store.is_dir(Path::new("a/b")));
        assert_eq!(report.changes[0], Change::CreateDir(PathBuf::from("a/b")));
    }

    #[test]
    fn test_structure_directories_created_nested() {
        let store = MemoryStore::new();
        apply(
            &store,
            "//== Project Structure\ntop/\n  sub/\n  other/\n    deep/\n",
            ApplyOptions::new(),
        );
        assert!(store.is_dir(Path::new("top/sub")));
        assert!(store.is_dir(Path::new("top/other/deep")));
        assert!(!store.is_dir(Path::new("sub")));
    }

    #[test]
    fn test_remove_mode() {
        let store = MemoryStore::new()
            .with_file("gone.txt", "x")
            .with_file("dir/also.txt", "y")
            .with_file("kept.txt", "z");

        let report = apply(
            &store,
            "//|| gone.txt\nignored\n//|| dir/also.txt\n\n//|| missing.txt\n",
            ApplyOptions::new().with_remove(true),
        );

        assert!(!store.exists(Path::new("gone.txt")));
        assert!(!store.exists(Path::new("dir/also.txt")));
        assert_eq!(store.file("kept.txt").as_deref(), Some("z"));
        assert!(matches!(report.changes[2], Change::Skipped { .. }));
    }

    #[test]
    fn test_remove_structure_directories() {
        let store = MemoryStore::new()
            .with_file("build/out/bin", "b")
            .with_file("src/lib.rs", "l");

        apply(
            &store,
            "//== Project Structure\nbuild/\n  out/\nghost/\n",
            ApplyOptions::new().with_remove(true),
        );

        assert!(!store.exists(Path::new("build")));
        assert!(store.exists(Path::new("src/lib.rs")));
    }

    #[test]
    fn test_dry_run_mutates_nothing() {
        let store = MemoryStore::new().with_file("a.txt", "World");
        let text = "//== Project Structure\nnew/\n//|| ^a.txt\nHello \n//|| new/b.txt\nB";

        let report = apply(&store, text, ApplyOptions::new().with_dry_run(true));

        assert_eq!(store.mutations(), 0);
        assert_eq!(store.file("a.txt").as_deref(), Some("World"));
        assert!(report.dry_run);
        assert_eq!(report.planned_content(Path::new("a.txt")), Some("Hello World"));
        assert_eq!(report.mutation_count(), 3);

        let wet = apply(&store, text, ApplyOptions::new());
        assert_eq!(wet.changes, report.changes);
        assert!(store.mutations() > 0);
        assert_eq!(store.file("a.txt").as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_dry_run_composes_against_planned_content() {
        let store = MemoryStore::new().with_file("log.txt", "C");
        let report = apply(
            &store,
            "//|| $log.txt\nB1\n//|| $log.txt\nB2",
            ApplyOptions::new().with_dry_run(true),
        );
        assert_eq!(report.planned_content(Path::new("log.txt")), Some("CB1B2"));
        assert_eq!(store.mutations(), 0);
    }

    #[test]
    fn test_dry_run_remove_mutates_nothing() {
        let store = MemoryStore::new().with_file("a.txt", "x").with_dir("d");
        let report = apply(
            &store,
            "//== Project Structure\nd/\n//|| a.txt\n",
            ApplyOptions::new().with_remove(true).with_dry_run(true),
        );
        assert_eq!(store.mutations(), 0);
        assert!(store.exists(Path::new("a.txt")));
        assert_eq!(
            report.changes,
            vec![
                Change::RemoveDir(PathBuf::from("d")),
                Change::RemoveFile(PathBuf::from("a.txt")),
            ]
        );
    }

    #[test]
    fn test_dry_run_fails_where_wet_run_fails() {
        let seed = || {
            MemoryStore::new()
                .with_dir("blocked")
                .with_file("a.txt", "file")
        };
        let cases = [
            ("//|| blocked\nx", true),
            ("//|| a.txt/b.txt\ny", true),
            ("//== Project Structure\na.txt/\n  a.txt/sub/\n", true),
            ("//|| new.txt\nfirst\n//|| new.txt/inner.txt\nz", true),
            ("//|| blocked/inside.txt\nok\n//|| $a.txt\n!", false),
        ];

        for (text, fails) in cases {
            let archive = Decoder::new().decode(text).unwrap();
            let outcome = |dry_run: bool| {
                let store = seed();
                let result = Reconciler::new(&store, ApplyOptions::new().with_dry_run(dry_run))
                    .apply(&archive, Path::new(""))
                    .map(|report| report.changes)
                    .map_err(|e| e.to_string());
                (result, store.mutations())
            };

            let (dry, dry_mutations) = outcome(true);
            let (wet, _) = outcome(false);
            assert_eq!(dry, wet, "{:?}", text);
            assert_eq!(dry.is_err(), fails, "{:?}", text);
            assert_eq!(dry_mutations, 0);
        }
    }

    #[test]
    fn test_store_error_aborts_without_rollback() {
        let store = MemoryStore::new().with_dir("blocked");
        let err = Reconciler::new(&store, ApplyOptions::new())
            .apply(
                &Decoder::new()
                    .decode("//|| first.txt\n1\n//|| blocked\n2\n//|| third.txt\n3")
                    .unwrap(),
                Path::new(""),
            )
            .unwrap_err();

        assert!(matches!(err, Error::Store { op: "write", .. }));
        assert_eq!(store.file("first.txt").as_deref(), Some("1"));
        assert!(store.file("third.txt").is_none());
    }

    #[test]
    fn test_apply_under_base_directory() {
        let store = MemoryStore::new().with_dir("/work");
        let archive = Decoder::new().decode("//|| src/a.rs\nfn a() {}").unwrap();
        Reconciler::new(&store, ApplyOptions::new())
            .apply(&archive, Path::new("/work"))
            .unwrap();
        assert_eq!(store.file("/work/src/a.rs").as_deref(), Some("fn a() {}"));
    }

    #[test]
    fn test_change_display() {
        let change = Change::WriteFile {
            path: PathBuf::from("a.txt"),
            modifier: Modifier::Append,
            content: "abc".to_string(),
        };
        assert_eq!(change.to_string(), "append to a.txt (3 bytes)");
    }
}
