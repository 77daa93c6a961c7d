use std::collections::BTreeMap;
use std::path::Path;

use git2::Repository;

use crate::config::Config;
use crate::display;
use crate::errors::Result;
use crate::linediff;
use crate::pending::PendingRecord;
use crate::ranges::{self, RangeSet};
use crate::staging::StagingStore;
use crate::vcs;

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub files: u32,
    pub lines: u64,
}

/// Pre-commit reconciliation: for every staged file with a staging entry,
/// keep only the AI-claimed lines the diff against the parent version
/// actually touched, and write the survivors to the pending record.
///
/// Staging entries themselves are left in place here; the post-commit
/// annotator removes the consumed ones once the commit exists, so an aborted
/// commit loses nothing.
pub fn reconcile(repo: &Repository, config: &Config, store: &StagingStore) -> Result<ReconcileOutcome> {
    let _lock = store.lock()?;

    // A leftover record from an aborted commit must never leak onto this one.
    PendingRecord::delete(store)?;

    let entries = store.entries()?;
    if entries.is_empty() {
        return Ok(ReconcileOutcome::default());
    }

    let staged = vcs::staged_files(repo)?;
    let mut files: BTreeMap<String, RangeSet> = BTreeMap::new();

    for file in &staged {
        if Path::new(&file.path).starts_with(&config.tracking_dir) {
            continue;
        }
        let Some(entry) = entries.iter().find(|entry| entry.path == file.path) else {
            continue;
        };
        let Some(staged_content) = file.staged.as_deref() else {
            display::debug(&format!(
                "{}: staged blob is binary or unreadable, not attributing",
                file.path
            ));
            continue;
        };

        let parent = file.parent.as_deref().unwrap_or("");
        let touched = linediff::touched_lines(parent, staged_content);
        let committed = ranges::intersect(&entry.lines, &touched);
        if !committed.is_empty() {
            files.insert(file.path.clone(), committed);
        }
    }

    if files.is_empty() {
        return Ok(ReconcileOutcome::default());
    }

    let record = PendingRecord::from_ranges(files);
    record.save(store)?;

    display::debug(&format!(
        "pending record covers {} file(s), {} line(s)",
        record.claude_modified_files, record.claude_modified_lines
    ));
    Ok(ReconcileOutcome {
        files: record.claude_modified_files,
        lines: record.claude_modified_lines,
    })
}
