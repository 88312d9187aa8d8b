//! # symplectic
//!
//! Flattens a directory tree into a single text archive and materializes
//! archives back onto disk.
//!
//! ## Archive Format
//!
//! Every file is a section introduced by the `//||` marker at the start of
//! a line, followed by one space and the file path. The body runs until the
//! next marker line:
//!
//! ```text
//! //|| src/main.rs
//! fn main() {}
//! //|| README.md
//! # Example
//! ```
//!
//! ## Modifiers
//!
//! A `^` or `$` right before the path changes how the body meets an
//! existing file:
//!
//! ```text
//! //|| ^CHANGELOG.md
//! ## Unreleased
//! //|| $.gitignore
//! target/
//! ```
//!
//! - no modifier: overwrite the file
//! - `^`: prepend the body
//! - `$`: append the body
//!
//! ## Structure Block
//!
//! An archive may open with a structure block listing directories (with a
//! trailing `/`) and files, indented two spaces per level. Listed
//! directories are created even when they hold no files:
//!
//! ```text
//! //== Project Structure
//! assets/
//! src/
//!   src/main.rs
//! ```
//!
//! ## Operations
//!
//! - [`Decoder`] / [`Encoder`]: text ⇄ [`Archive`]
//! - [`Reconciler`]: apply an archive (overwrite, prepend, append, remove,
//!   dry run)
//! - [`SnapshotWriter`]: apply and record the resulting file states under
//!   `.symplecticarchive/`
//! - [`Generator`]: build an archive from a tree, honouring `.gitignore` and
//!   `.symplecticignore`

pub mod archive;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod generator;
pub mod reconcile;
pub mod snapshot;
pub mod store;
pub mod structure;

pub use archive::{Archive, Modifier, Section, StructureEntry};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use filter::IgnoreFilter;
pub use generator::Generator;
pub use reconcile::{ApplyOptions, ApplyReport, Change, Reconciler};
pub use snapshot::SnapshotWriter;
pub use store::{FileStore, FsStore, MemoryStore};
