use git2::Repository;

use crate::annotation::AnnotationRecord;
use crate::config::Config;
use crate::display;
use crate::errors::{Result, TrackError};
use crate::vcs::{notes, remotes};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub adopted: usize,
    pub merged: usize,
    pub unchanged: usize,
}

/// Publish the metadata ref after the user's own objects went out. Having no
/// local annotations yet is a successful no-op.
pub fn push_metadata(repo: &Repository, config: &Config) -> Result<()> {
    if repo.find_reference(&config.notes_ref).is_err() {
        display::debug("no local annotations to publish");
        return Ok(());
    }

    remotes::push_notes(repo, &config.remote, &config.notes_ref)
        .map_err(|err| TrackError::NetworkFailure(err.to_string()))
}

/// Fetch the remote metadata ref and reconcile it into the local one.
pub fn fetch_metadata(repo: &Repository, config: &Config) -> Result<FetchOutcome> {
    let staging_ref = config.remote_staging_ref();
    let found = remotes::fetch_notes(repo, &config.remote, &config.notes_ref, &staging_ref)
        .map_err(|err| TrackError::NetworkFailure(err.to_string()))?;

    if !found {
        display::debug("remote has no annotations yet");
        return Ok(FetchOutcome::default());
    }

    reconcile_fetched(repo, config, &staging_ref)
}

/// Per-commit divergence policy: identical blobs are left alone, one-sided
/// annotations are adopted, and conflicting annotations union per file. The
/// remote sees the merged result on the next push.
pub fn reconcile_fetched(
    repo: &Repository,
    config: &Config,
    staging_ref: &str,
) -> Result<FetchOutcome> {
    let mut outcome = FetchOutcome::default();

    for (commit, remote_raw) in notes::list(repo, staging_ref)? {
        let remote_record = match AnnotationRecord::parse(&remote_raw) {
            Ok(record) => record,
            Err(reason) => {
                display::warn(&format!(
                    "ignoring corrupt remote annotation on {commit}: {reason}"
                ));
                continue;
            }
        };

        match notes::read(repo, &config.notes_ref, commit)? {
            None => {
                notes::write(repo, &config.notes_ref, commit, &remote_record.to_json()?)?;
                outcome.adopted += 1;
            }
            Some(local_raw) if local_raw == remote_raw => {
                outcome.unchanged += 1;
            }
            Some(local_raw) => match AnnotationRecord::parse(&local_raw) {
                Ok(local_record) => {
                    let merged = local_record.union_with(&remote_record);
                    let merged_json = merged.to_json()?;
                    if merged_json != local_raw {
                        notes::write(repo, &config.notes_ref, commit, &merged_json)?;
                        outcome.merged += 1;
                    } else {
                        outcome.unchanged += 1;
                    }
                }
                Err(reason) => {
                    display::warn(&format!(
                        "local annotation on {commit} is corrupt ({reason}); adopting remote"
                    ));
                    notes::write(repo, &config.notes_ref, commit, &remote_record.to_json()?)?;
                    outcome.adopted += 1;
                }
            },
        }
    }

    Ok(outcome)
}
