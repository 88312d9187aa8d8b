//! Archive data structures

use std::path::{Component, Path};

// Archive format constants
pub const MARKER: &str = "//||";
pub const TITLE_MARKER: &str = "//==";
pub const MARKER_LEN: usize = 4; // len("//||") == len("//==")
pub const SECTION_DELIMITER: &str = "\n//|| ";
pub const STRUCTURE_TITLE: &str = "Project Structure";
pub const PREPEND_CHAR: char = '^';
pub const APPEND_CHAR: char = '$';

// File store layout
pub const DEFAULT_ARCHIVE_FILE: &str = "symplectic.txt";
pub const SNAPSHOT_DIR: &str = ".symplecticarchive";
pub const IGNORE_FILES: [&str; 2] = [".gitignore", ".symplecticignore"];

/// How a section's body is combined with the file already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    /// Replace the file with the body
    #[default]
    None,
    /// Body goes before the existing content
    Prepend,
    /// Body goes after the existing content
    Append,
}

impl Modifier {
    /// Classify a section header by its first non-whitespace character.
    ///
    /// Returns the modifier and the trimmed file name that follows it.
    pub fn split_header(header: &str) -> (Modifier, &str) {
        let header = header.trim_start();
        if let Some(rest) = header.strip_prefix(PREPEND_CHAR) {
            (Modifier::Prepend, rest.trim())
        } else if let Some(rest) = header.strip_prefix(APPEND_CHAR) {
            (Modifier::Append, rest.trim())
        } else {
            (Modifier::None, header.trim())
        }
    }

    /// Character written before the path in a section header
    pub fn symbol(&self) -> &'static str {
        match self {
            Modifier::None => "",
            Modifier::Prepend => "^",
            Modifier::Append => "$",
        }
    }

    /// Compose the new file content from the body and the prior content (if the file existed)
    pub fn compose(&self, body: &str, prior: Option<&str>) -> String {
        let prior = prior.unwrap_or_default();
        match self {
            Modifier::None => body.to_string(),
            Modifier::Prepend => format!("{}{}", body, prior),
            Modifier::Append => format!("{}{}", prior, body),
        }
    }
}

/// One file's modifier, path and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub modifier: Modifier,
    /// Relative path, forward-slash separated
    pub path: String,
    /// Raw text content, may be empty
    pub body: String,
}

impl Section {
    /// Create an overwrite section
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_modifier(Modifier::None, path, body)
    }

    pub fn with_modifier(modifier: Modifier, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            modifier,
            path: path.into(),
            body: body.into(),
        }
    }

    /// Header line without the trailing newline, e.g. `//|| ^notes.txt`
    pub fn header(&self) -> String {
        format!("{} {}{}", MARKER, self.modifier.symbol(), self.path)
    }
}

/// One line of a structure block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureEntry {
    /// Nesting level (number of ancestor directories)
    pub depth: usize,
    /// Name as written, including the trailing `/` for directories
    pub name: String,
    /// Resolved path relative to the base directory, without trailing `/`
    pub path: String,
    pub is_dir: bool,
}

impl StructureEntry {
    pub fn new(depth: usize, name: impl Into<String>, path: impl Into<String>) -> Self {
        let name = name.into();
        let is_dir = name.ends_with('/');
        Self {
            depth,
            name,
            path: path.into(),
            is_dir,
        }
    }

    /// Encoded line: two spaces per depth level followed by the name
    pub fn line(&self) -> String {
        format!("{}{}", "  ".repeat(self.depth), self.name)
    }
}

/// A parsed archive: optional structure block followed by ordered sections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Archive {
    /// Free text before the first section, if any
    pub comment: String,
    /// Entries of the leading structure block
    pub structure: Option<Vec<StructureEntry>>,
    /// Sections in textual order
    pub sections: Vec<Section>,
}

impl Archive {
    /// Create a new empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an archive with a comment
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Default::default()
        }
    }

    /// Add a section at the end; application order follows insertion order
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn set_structure(&mut self, entries: Vec<StructureEntry>) {
        self.structure = Some(entries);
    }

    /// Directory entries of the structure block, in order
    pub fn directories(&self) -> impl Iterator<Item = &StructureEntry> {
        self.structure
            .iter()
            .flatten()
            .filter(|entry| entry.is_dir)
    }
}

/// Normalize separators to `/` and trim surrounding whitespace
pub fn normalize_path(raw: &str) -> String {
    raw.trim().replace('\\', "/")
}

/// A path is safe when it is relative and never climbs above its base
pub fn is_safe_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.has_root()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
