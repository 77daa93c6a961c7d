use git2::{ErrorCode, Oid, Repository};

use crate::annotation::AnnotationRecord;
use crate::config::Config;
use crate::display;
use crate::errors::{Result, TrackError};
use crate::pending::PendingRecord;
use crate::staging::StagingStore;
use crate::vcs::notes;

fn short_oid(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

#[derive(Debug, Default)]
pub struct AnnotateOutcome {
    pub annotated: bool,
    pub files: u32,
    pub lines: u64,
}

/// Post-commit annotation: consume the pending record and attach the
/// canonical annotation to HEAD. The record and the staging entries it drew
/// from are consumed up front, so a failed ref write costs one annotation
/// and never double-attributes a later commit.
pub fn annotate_head(
    repo: &Repository,
    config: &Config,
    store: &StagingStore,
) -> Result<AnnotateOutcome> {
    let _lock = store.lock()?;

    let Some(record) = PendingRecord::load(store)? else {
        return Ok(AnnotateOutcome::default());
    };
    let reconciled_at = std::fs::metadata(store.pending_path())
        .and_then(|meta| meta.modified())
        .ok();
    PendingRecord::delete(store)?;

    for path in record.files.keys() {
        // An entry rewritten after reconciliation carries a tool event that
        // arrived mid-commit; it belongs to the next commit and stays.
        if let Some(entry) = store.read_entry(path)?
            && let Some(reconciled_at) = reconciled_at
            && std::time::SystemTime::from(entry.updated_at) > reconciled_at
        {
            continue;
        }
        store.remove_entry(path)?;
    }

    if record.is_empty() {
        return Ok(AnnotateOutcome::default());
    }

    let head = crate::vcs::head_commit(repo)?;
    let annotation = AnnotationRecord::from_ranges(record.ranges());
    write_annotation(repo, config, head, &annotation)?;

    display::info(&format!(
        "{} file(s), {} line(s) attributed on {}",
        record.claude_modified_files,
        record.claude_modified_lines,
        short_oid(head)
    ));
    Ok(AnnotateOutcome {
        annotated: true,
        files: record.claude_modified_files,
        lines: record.claude_modified_lines,
    })
}

/// Write `annotation` onto `commit` under the metadata ref. Re-annotating
/// with an identical blob is a no-op; a different blob wins and the
/// replacement is logged. Returns whether a write happened.
pub fn write_annotation(
    repo: &Repository,
    config: &Config,
    commit: Oid,
    annotation: &AnnotationRecord,
) -> Result<bool> {
    if annotation.is_empty() {
        return Ok(false);
    }

    let json = annotation.to_json()?;
    match notes::read(repo, &config.notes_ref, commit)? {
        Some(existing) if existing == json => {
            display::debug(&format!("annotation on {} already current", short_oid(commit)));
            return Ok(false);
        }
        Some(_) => display::info(&format!("replacing annotation on {}", short_oid(commit))),
        None => {}
    }

    notes::write(repo, &config.notes_ref, commit, &json).map_err(|err| {
        if err.code() == ErrorCode::Locked {
            TrackError::RefUpdateConflict(err.message().to_string())
        } else {
            TrackError::Git(err)
        }
    })?;
    Ok(true)
}

/// Effective annotation for a commit; corrupt blobs read as absent with a
/// warning and are never auto-repaired.
pub fn read_annotation(
    repo: &Repository,
    config: &Config,
    commit: Oid,
) -> Result<Option<AnnotationRecord>> {
    let Some(raw) = notes::read(repo, &config.notes_ref, commit)? else {
        return Ok(None);
    };

    match AnnotationRecord::parse(&raw) {
        Ok(record) => Ok(Some(record)),
        Err(reason) => {
            display::warn(
                &TrackError::CorruptAnnotation {
                    commit: commit.to_string(),
                    reason,
                }
                .to_string(),
            );
            Ok(None)
        }
    }
}
