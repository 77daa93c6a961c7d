use git2::{Oid, Repository};

use crate::annotate;
use crate::config::Config;
use crate::errors::Result;
use crate::linediff;
use crate::ranges::{self, LineRange, RangeSet};
use crate::staging::StagingStore;
use crate::vcs;

/// AI-authored ranges of `path` as of `commit` (empty when unannotated).
pub fn authorship(
    repo: &Repository,
    config: &Config,
    commit: Oid,
    path: &str,
) -> Result<RangeSet> {
    Ok(annotate::read_annotation(repo, config, commit)?
        .map(|record| record.ranges_for(path))
        .unwrap_or_default())
}

/// AI-authored ranges of `path` as it sits on disk right now: HEAD's
/// annotation remapped through the working-copy diff, plus any pending
/// staging claims for changes already on disk.
pub fn authorship_working_tree(
    repo: &Repository,
    config: &Config,
    store: &StagingStore,
    path: &str,
) -> Result<RangeSet> {
    let root = vcs::repo_root(repo)?;
    let on_disk = std::fs::read_to_string(root.join(path)).unwrap_or_default();

    let mut set: RangeSet = Vec::new();
    if let Ok(head) = vcs::head_commit(repo) {
        let committed = authorship(repo, config, head, path)?;
        if !committed.is_empty() {
            let at_head = vcs::read_blob_at(repo, head, path)?.unwrap_or_default();
            let hunks = linediff::diff_hunks(&at_head, &on_disk);
            set = ranges::remap(&committed, &hunks);
        }
    }

    if let Some(entry) = store.read_entry(path)? {
        set = ranges::union(&set, &entry.lines);
    }

    let count = linediff::line_count(&on_disk);
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(ranges::intersect(
        &set,
        &[LineRange { start: 1, end: count }],
    ))
}

/// O(log n) membership test: was line `line` of `path` AI-authored as of
/// `commit`?
pub fn is_ai(
    repo: &Repository,
    config: &Config,
    commit: Oid,
    path: &str,
    line: u32,
) -> Result<bool> {
    Ok(ranges::contains(
        &authorship(repo, config, commit, path)?,
        line,
    ))
}
