//! Archive decoder

use crate::archive::{
    is_safe_path, normalize_path, Archive, Modifier, Section, MARKER, MARKER_LEN,
    SECTION_DELIMITER, STRUCTURE_TITLE, TITLE_MARKER,
};
use crate::error::{Error, Result};
use crate::structure;

/// Decodes archive text into sections and an optional structure block
pub struct Decoder {
    // Currently stateless, mirrors Encoder
}

impl Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {}
    }

    /// Decode an archive from a string
    ///
    /// The text is split on `"\n//|| "`. Each segment's first line is the
    /// header and the rest is the body, kept byte for byte. The first segment
    /// is special: a `Project Structure` header makes it the structure block,
    /// and text that does not start with a marker is kept as a comment.
    pub fn decode(&self, input: &str) -> Result<Archive> {
        let mut archive = Archive::new();
        if input.is_empty() {
            return Ok(archive);
        }

        for (index, segment) in input.split(SECTION_DELIMITER).enumerate() {
            let (header, body) = segment.split_once('\n').unwrap_or((segment, ""));

            if index == 0 {
                if Self::is_structure_header(header) {
                    archive.set_structure(structure::decode(body));
                    continue;
                }
                if !segment.starts_with(MARKER) {
                    archive.comment = segment.trim_end().to_string();
                    continue;
                }
            }

            archive.add_section(self.parse_section(index, header, body)?);
        }

        Ok(archive)
    }

    /// Parse one section from its header line and body
    fn parse_section(&self, index: usize, header: &str, body: &str) -> Result<Section> {
        let (modifier, name) = Modifier::split_header(Self::strip_marker(header));
        let path = normalize_path(name);

        if path.is_empty() {
            return Err(Error::EmptyPath { index });
        }
        if !is_safe_path(&path) {
            return Err(Error::UnsafePath { path });
        }

        Ok(Section::with_modifier(modifier, path, body))
    }

    /// Loose, case-insensitive match on the first header
    fn is_structure_header(header: &str) -> bool {
        Self::strip_marker(header)
            .trim()
            .to_lowercase()
            .starts_with(&STRUCTURE_TITLE.to_lowercase())
    }

    /// Drop a leading `//||` or `//==` left on the header line
    fn strip_marker(header: &str) -> &str {
        if header.starts_with(MARKER) || header.starts_with(TITLE_MARKER) {
            &header[MARKER_LEN..]
        } else {
            header
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
