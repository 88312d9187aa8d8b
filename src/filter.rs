//! Gitignore-style filtering for the generator.
//!
//! Rules come from `.gitignore` and `.symplecticignore` at the base
//! directory, plus built-in rules for the archive file itself and the
//! snapshot directory.

use crate::archive::{DEFAULT_ARCHIVE_FILE, IGNORE_FILES, SNAPSHOT_DIR};
use crate::error::{Error, Result};
use crate::store::FileStore;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Predicate over paths relative to the base directory
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    matcher: Gitignore,
}

impl IgnoreFilter {
    /// Build the filter from the ignore files found at `base`.
    pub fn load<S: FileStore + ?Sized>(store: &S, base: &Path) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(base);

        for name in IGNORE_FILES {
            let path = base.join(name);
            if !store.is_file(&path) {
                continue;
            }
            let rules = store
                .read_to_string(&path)
                .map_err(|e| Error::store("read", &path, e))?;
            tracing::debug!("Loading ignore rules from {}", path.display());
            add_rules(&mut builder, &rules, Some(path));
        }

        Self::finish(builder, base)
    }

    /// Build a filter from rule text alone, plus the built-in rules.
    pub fn from_rules(rules: &str) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        add_rules(&mut builder, rules, None);
        Self::finish(builder, Path::new(""))
    }

    fn finish(mut builder: GitignoreBuilder, base: &Path) -> Result<Self> {
        add_rules(&mut builder, DEFAULT_ARCHIVE_FILE, None);
        add_rules(&mut builder, &format!("{}/", SNAPSHOT_DIR), None);

        let matcher = builder.build().map_err(|source| Error::Ignore {
            path: base.to_path_buf(),
            source,
        })?;
        Ok(Self { matcher })
    }

    /// Returns `true` if the entry at `relative` (relative to the base directory) is excluded.
    pub fn is_ignored(&self, relative: &str, is_dir: bool) -> bool {
        self.matcher.matched(relative, is_dir).is_ignore()
    }
}

/// Add newline-separated patterns; invalid globs are reported and skipped
fn add_rules(builder: &mut GitignoreBuilder, rules: &str, from: Option<PathBuf>) {
    for line in rules.lines() {
        if let Err(e) = builder.add_line(from.clone(), line) {
            tracing::warn!("Ignoring invalid pattern '{}': {}", line, e);
        }
    }
}
