//! Structure block codec
//!
//! A structure block lists a directory tree one entry per line, indented
//! two spaces per level, directories marked with a trailing `/`:
//!
//! ```text
//! //== Project Structure
//! src/
//!   src/bin/
//!     src/bin/main.rs
//!   src/lib.rs
//! Cargo.toml
//! ```
//!
//! Encoding walks a [`FileStore`] depth-first, directories before files.
//! Decoding rebuilds each entry's path from a stack of open directories; the
//! indentation width of a line only matters relative to the lines that
//! opened those directories, so any consistent indentation decodes the same.

use crate::archive::{is_safe_path, StructureEntry, MARKER, TITLE_MARKER};
use crate::error::{Error, Result};
use crate::filter::IgnoreFilter;
use crate::store::FileStore;
use std::path::{Path, PathBuf};

/// Decode the body of a structure block.
///
/// Blank lines and comment lines (starting with `//||` or `//==`) are
/// skipped. Entries without a reachable ancestor are dropped.
pub fn decode(text: &str) -> Vec<StructureEntry> {
    struct OpenDir {
        indent: usize,
        path: String,
    }

    let mut stack: Vec<OpenDir> = Vec::new();
    let mut root_indent: Option<usize> = None;
    // Indent of the last accepted file; deeper lines have no directory to live in
    let mut last_file: Option<usize> = None;
    let mut entries = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let name = line.trim();
        if name.is_empty() || name.starts_with(MARKER) || name.starts_with(TITLE_MARKER) {
            continue;
        }

        let indent = line.chars().take_while(|c| c.is_whitespace()).count();
        let root = *root_indent.get_or_insert(indent);
        if indent < root {
            root_indent = Some(indent);
        }

        if last_file.map_or(false, |file_indent| indent > file_indent) {
            tracing::debug!("Skipping structure line {}: '{}' is nested under a file", line_num + 1, name);
            continue;
        }

        while stack.last().map_or(false, |open| open.indent >= indent) {
            stack.pop();
        }

        if stack.is_empty() && indent > root {
            tracing::debug!("Skipping structure line {}: no parent directory for '{}'", line_num + 1, name);
            continue;
        }

        let is_dir = name.ends_with('/');
        let bare = name.trim_end_matches('/');
        let parent = stack.last().map(|open| open.path.as_str()).unwrap_or("");
        let path = join_entry(parent, bare);

        if bare.is_empty() || !is_safe_path(&path) {
            tracing::debug!("Skipping structure line {}: invalid path '{}'", line_num + 1, name);
            continue;
        }

        entries.push(StructureEntry {
            depth: stack.len(),
            name: name.to_string(),
            path: path.clone(),
            is_dir,
        });

        last_file = (!is_dir).then_some(indent);
        if is_dir {
            stack.push(OpenDir { indent, path });
        }
    }

    entries
}

/// Resolve an entry name against its parent directory.
/// Names that already carry the parent's path are taken as-is.
fn join_entry(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    match name.strip_prefix(parent) {
        Some(rest) if rest.starts_with('/') => name.to_string(),
        _ => format!("{}/{}", parent, name),
    }
}

/// Encode the tree below `base/prefix` as structure lines, starting at `depth`.
///
/// `prefix` is either empty or a relative directory path ending in `/`; it is
/// written in front of every name.
pub fn encode<S: FileStore + ?Sized>(
    store: &S,
    filter: &IgnoreFilter,
    base: &Path,
    depth: usize,
    prefix: &str,
) -> Result<String> {
    let lines = TreeWalk::new(store, filter, base, depth, prefix)?
        .map(|entry| entry.map(|e| e.line()))
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

struct Frame {
    depth: usize,
    prefix: String,
    children: std::vec::IntoIter<(String, bool)>,
}

/// Lazy pre-order walk over a directory tree.
///
/// Yields one [`StructureEntry`] per non-ignored file or directory; a
/// directory's children are listed only when the directory is reached.
pub struct TreeWalk<'a, S: FileStore + ?Sized> {
    store: &'a S,
    filter: &'a IgnoreFilter,
    base: PathBuf,
    stack: Vec<Frame>,
}

impl<'a, S: FileStore + ?Sized> TreeWalk<'a, S> {
    /// Start a walk at `base/prefix`. Lists the starting directory immediately.
    pub fn new(
        store: &'a S,
        filter: &'a IgnoreFilter,
        base: &Path,
        depth: usize,
        prefix: &str,
    ) -> Result<Self> {
        let mut walk = Self {
            store,
            filter,
            base: base.to_path_buf(),
            stack: Vec::new(),
        };
        walk.open(depth, prefix.to_string())?;
        Ok(walk)
    }

    fn open(&mut self, depth: usize, prefix: String) -> Result<()> {
        let children = self.children(&prefix)?;
        self.stack.push(Frame {
            depth,
            prefix,
            children: children.into_iter(),
        });
        Ok(())
    }

    /// Non-ignored children of `base/prefix`: directories first, then files,
    /// each group in byte order.
    fn children(&self, prefix: &str) -> Result<Vec<(String, bool)>> {
        let dir = match prefix.trim_end_matches('/') {
            "" => self.base.clone(),
            relative => self.base.join(relative),
        };
        let names = self
            .store
            .list(&dir)
            .map_err(|e| Error::store("list directory", &dir, e))?;

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for name in names {
            let is_dir = self.store.is_dir(&dir.join(&name));
            if self.filter.is_ignored(&format!("{}{}", prefix, name), is_dir) {
                tracing::trace!("Ignored: {}{}", prefix, name);
                continue;
            }
            if is_dir {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        dirs.sort();
        files.sort();

        Ok(dirs
            .into_iter()
            .map(|name| (name, true))
            .chain(files.into_iter().map(|name| (name, false)))
            .collect())
    }
}

impl<S: FileStore + ?Sized> Iterator for TreeWalk<'_, S> {
    type Item = Result<StructureEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some((name, is_dir)) = frame.children.next() else {
                self.stack.pop();
                continue;
            };

            let depth = frame.depth;
            let path = format!("{}{}", frame.prefix, name);

            if is_dir {
                let entry = StructureEntry::new(depth, format!("{}/", path), path.clone());
                return Some(self.open(depth + 1, format!("{}/", path)).map(|()| entry));
            }
            return Some(Ok(StructureEntry::new(depth, path.clone(), path)));
        }
    }
}
