//! Snapshot history.
//!
//! A snapshot applies an archive and then records what each touched file
//! actually contains on disk, under `.symplecticarchive/<timestamp>.txt`.

use crate::archive::{Archive, Section, SNAPSHOT_DIR};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::reconcile::{ApplyOptions, Reconciler};
use crate::store::FileStore;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Sortable, digits-only UTC timestamp used for snapshot file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub struct SnapshotWriter<'a, S: FileStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FileStore + ?Sized> SnapshotWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Apply `archive` under `base` and save a snapshot stamped with the current time.
    pub fn snapshot(&self, archive: &Archive, base: &Path) -> Result<PathBuf> {
        self.snapshot_at(archive, base, Utc::now())
    }

    /// Same as [`snapshot`](Self::snapshot) with an explicit timestamp.
    ///
    /// Always writes: the archive is applied in create mode regardless of any
    /// dry-run or remove setting the caller uses elsewhere. A snapshot taken
    /// within the same second as an earlier one replaces it.
    pub fn snapshot_at(&self, archive: &Archive, base: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
        let mut captured = Vec::with_capacity(archive.sections.len());

        Reconciler::new(self.store, ApplyOptions::default()).apply_each(
            archive,
            base,
            |section, path| {
                let content = self
                    .store
                    .read_to_string(path)
                    .map_err(|e| Error::store("read", path, e))?;
                captured.push(Section::new(section.path.clone(), content));
                Ok(())
            },
        )?;

        let dir = base.join(SNAPSHOT_DIR);
        self.store
            .create_dir_all(&dir)
            .map_err(|e| Error::store("create directory", &dir, e))?;

        let path = dir.join(format!("{}.txt", at.format(TIMESTAMP_FORMAT)));
        let text = Encoder::new().encode_snapshot(&captured);
        self.store
            .write(&path, text.as_bytes())
            .map_err(|e| Error::store("write", &path, e))?;

        tracing::info!("Snapshot saved: {}", path.display());
        Ok(path)
    }
}
