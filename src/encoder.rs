//! Archive encoder

use crate::archive::{Archive, Section, MARKER, SECTION_DELIMITER, STRUCTURE_TITLE, TITLE_MARKER};

/// Encodes an archive into text
pub struct Encoder {
    // Currently stateless, but reserved for future options
}

impl Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {}
    }

    /// Encode an archive to a string
    ///
    /// Segments are joined with a single newline, which the decoder consumes
    /// as part of the `"\n//|| "` delimiter, so section bodies decode back
    /// byte for byte. The comment is written only when there is no structure
    /// block, since the structure block must come first.
    pub fn encode(&self, archive: &Archive) -> String {
        let mut segments = Vec::with_capacity(archive.sections.len() + 1);

        if let Some(entries) = &archive.structure {
            let lines: Vec<String> = entries.iter().map(|e| e.line()).collect();
            segments.push(format!("{} {}\n{}\n", TITLE_MARKER, STRUCTURE_TITLE, lines.join("\n")));
        } else if !archive.comment.is_empty() {
            segments.push(archive.comment.clone());
        }

        for section in &archive.sections {
            Self::check_conflict(section);
            segments.push(format!("{}\n{}", section.header(), section.body));
        }

        segments.join("\n")
    }

    /// Encode captured file states as a snapshot archive
    ///
    /// Every section is followed by a blank line and trailing whitespace of
    /// the whole text is trimmed.
    pub fn encode_snapshot(&self, sections: &[Section]) -> String {
        let mut output = String::new();
        for section in sections {
            output.push_str(MARKER);
            output.push(' ');
            output.push_str(&section.path);
            output.push('\n');
            output.push_str(&section.body);
            output.push_str("\n\n");
        }
        output.trim_end().to_string()
    }

    /// Warn when a body would be split into extra sections on decode
    fn check_conflict(section: &Section) {
        if section.body.contains(SECTION_DELIMITER) {
            tracing::warn!(
                "Content of '{}' contains the section delimiter '{}' and will not decode as a single file",
                section.path,
                SECTION_DELIMITER.trim()
            );
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
