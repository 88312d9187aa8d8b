//! Archive generation from an existing tree.

use crate::archive::{is_safe_path, normalize_path, Archive, Section, DEFAULT_ARCHIVE_FILE};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::filter::IgnoreFilter;
use crate::store::FileStore;
use crate::structure::TreeWalk;
use std::path::Path;

/// Builds archives from the contents of a [`FileStore`]
pub struct Generator<'a, S: FileStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FileStore + ?Sized> Generator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Build the archive for `base`, or for `base/subfolder` when given.
    ///
    /// Ignore rules are always read from `base`. Section paths stay relative
    /// to `base`, so a subfolder archive materializes back into place.
    pub fn build(&self, base: &Path, subfolder: Option<&str>) -> Result<Archive> {
        let prefix = self.scan_prefix(base, subfolder)?;
        let filter = IgnoreFilter::load(self.store, base)?;

        let entries = TreeWalk::new(self.store, &filter, base, 0, &prefix)?
            .collect::<Result<Vec<_>>>()?;

        let mut archive = Archive::new();
        for entry in entries.iter().filter(|e| !e.is_dir) {
            let path = base.join(&entry.path);
            let content = self
                .store
                .read_to_string(&path)
                .map_err(|e| Error::store("read", &path, e))?;
            archive.add_section(Section::new(entry.path.clone(), content));
        }
        tracing::debug!(
            "Collected {} files and {} entries under {}",
            archive.sections.len(),
            entries.len(),
            base.join(&prefix).display()
        );
        archive.set_structure(entries);

        Ok(archive)
    }

    /// Generate archive text for `base` (or one of its subfolders)
    pub fn generate(&self, base: &Path, subfolder: Option<&str>) -> Result<String> {
        Ok(Encoder::new().encode(&self.build(base, subfolder)?))
    }

    /// Generate and, unless `dry_run`, write `<base>/symplectic.txt`.
    ///
    /// Returns the generated text in both cases.
    pub fn write(&self, base: &Path, subfolder: Option<&str>, dry_run: bool) -> Result<String> {
        let text = self.generate(base, subfolder)?;
        if dry_run {
            return Ok(text);
        }

        let path = base.join(DEFAULT_ARCHIVE_FILE);
        self.store
            .write(&path, text.as_bytes())
            .map_err(|e| Error::store("write", &path, e))?;
        tracing::info!("Generated {}", path.display());
        Ok(text)
    }

    /// Validate the subfolder and turn it into a `name/` prefix
    fn scan_prefix(&self, base: &Path, subfolder: Option<&str>) -> Result<String> {
        let Some(subfolder) = subfolder.map(normalize_path) else {
            return Ok(String::new());
        };
        let subfolder = subfolder.trim_matches('/');
        if subfolder.is_empty() {
            return Ok(String::new());
        }
        if !is_safe_path(subfolder) {
            return Err(Error::UnsafePath {
                path: subfolder.to_string(),
            });
        }

        let root = base.join(subfolder);
        if !self.store.is_dir(&root) {
            return Err(Error::SubfolderNotFound { path: root });
        }
        Ok(format!("{}/", subfolder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::reconcile::{ApplyOptions, Reconciler};
    use crate::store::MemoryStore;

    fn project() -> MemoryStore {
        MemoryStore::new()
            .with_file("/p/file1.txt", "Content of file1")
            .with_file("/p/file2.txt", "Content of file2\n")
            .with_file("/p/src/lib.rs", "pub mod a;\n")
            .with_file("/p/src/a/mod.rs", "")
            .with_dir("/p/empty")
    }

    #[test]
    fn test_generate_layout() {
        let store = project();

        let text = Generator::new(&store).generate(Path::new("/p"), None).unwrap();

        assert_eq!(
            text,
            "\
//== Project Structure
empty/
src/
  src/a/
    src/a/mod.rs
  src/lib.rs
file1.txt
file2.txt

//|| src/a/mod.rs

//|| src/lib.rs
pub mod a;

//|| file1.txt
Content of file1
//|| file2.txt
Content of file2
"
        );
    }

    #[test]
    fn test_generate_contains_sections() {
        let store = project();
        let text = Generator::new(&store).generate(Path::new("/p"), None).unwrap();
        assert!(text.contains("//|| file1.txt\nContent of file1"));
        assert!(text.contains("//|| file2.txt\nContent of file2"));
    }

    #[test]
    fn test_round_trip_into_empty_store() {
        let source = project();
        let text = Generator::new(&source).generate(Path::new("/p"), None).unwrap();

        let target = MemoryStore::new().with_dir("/out");
        let archive = Decoder::new().decode(&text).unwrap();
        Reconciler::new(&target, ApplyOptions::new())
            .apply(&archive, Path::new("/out"))
            .unwrap();

        for (rel, expected) in [
            ("file1.txt", "Content of file1"),
            ("file2.txt", "Content of file2\n"),
            ("src/lib.rs", "pub mod a;\n"),
            ("src/a/mod.rs", ""),
        ] {
            assert_eq!(target.file(Path::new("/out").join(rel)).as_deref(), Some(expected));
        }
        assert!(target.is_dir(Path::new("/out/empty")));
    }

    #[test]
    fn test_subfolder_keeps_base_relative_paths() {
        let store = project();

        let archive = Generator::new(&store)
            .build(Path::new("/p"), Some("src/"))
            .unwrap();

        let paths: Vec<&str> = archive.sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a/mod.rs", "src/lib.rs"]);
        assert_eq!(archive.structure.unwrap()[0].name, "src/a/");
    }

    #[test]
    fn test_missing_subfolder() {
        let store = project();
        let err = Generator::new(&store)
            .generate(Path::new("/p"), Some("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::SubfolderNotFound { .. }));
    }

    #[test]
    fn test_ignore_rules_from_base() {
        let store = project()
            .with_file("/p/.gitignore", "*.txt\n")
            .with_file("/p/.symplecticignore", "src/a/\n")
            .with_file("/p/symplectic.txt", "old archive");

        let archive = Generator::new(&store).build(Path::new("/p"), None).unwrap();

        let paths: Vec<&str> = archive.sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs", ".gitignore", ".symplecticignore"]);
    }

    #[test]
    fn test_write_respects_dry_run() {
        let store = project();
        let generator = Generator::new(&store);

        let preview = generator.write(Path::new("/p"), None, true).unwrap();
        assert_eq!(store.mutations(), 0);

        let written = generator.write(Path::new("/p"), None, false).unwrap();
        assert_eq!(preview, written);
        assert_eq!(store.file("/p/symplectic.txt"), Some(written));

        let again = generator.generate(Path::new("/p"), None).unwrap();
        assert_eq!(again, preview);
    }
}
