use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::display;
use crate::errors::Result;
use crate::ranges::{self, RangeSet};
use crate::staging::{self, StagingStore};

/// The reconciler's hand-off to the post-commit annotator. Scoped to exactly
/// one upcoming commit; deleted as soon as the annotation is written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub claude_modified_files: u32,
    pub claude_modified_lines: u64,
    pub files: BTreeMap<String, PendingFile>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingFile {
    pub claude_lines: Vec<u32>,
}

impl PendingRecord {
    /// Build a record from per-path range sets, dropping empty paths.
    pub fn from_ranges(files: BTreeMap<String, RangeSet>) -> Self {
        let files: BTreeMap<String, PendingFile> = files
            .into_iter()
            .filter(|(_, ranges)| !ranges.is_empty())
            .map(|(path, ranges)| {
                (
                    path,
                    PendingFile {
                        claude_lines: ranges::expand(&ranges),
                    },
                )
            })
            .collect();

        let claude_modified_lines = files
            .values()
            .map(|file| file.claude_lines.len() as u64)
            .sum();

        PendingRecord {
            claude_modified_files: files.len() as u32,
            claude_modified_lines,
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Per-path canonical range sets, ready for the annotation record.
    pub fn ranges(&self) -> BTreeMap<String, RangeSet> {
        self.files
            .iter()
            .map(|(path, file)| (path.clone(), ranges::compact(&file.claude_lines)))
            .collect()
    }

    /// Read the pending record, treating a missing or corrupt file as absent.
    pub fn load(store: &StagingStore) -> Result<Option<Self>> {
        let path = store.pending_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                display::warn(&format!("discarding corrupt pending record: {err}"));
                Ok(None)
            }
        }
    }

    pub fn save(&self, store: &StagingStore) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        staging::write_atomic(&store.pending_path(), &json)?;
        Ok(())
    }

    pub fn delete(store: &StagingStore) -> Result<()> {
        match fs::remove_file(store.pending_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
