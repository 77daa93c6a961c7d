use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{
    Delta, DiffOptions, Error, ErrorCode, Oid, Patch, Repository, Signature, Status,
    StatusOptions, StatusShow, Tree,
};

use crate::linediff::DiffHunk;

pub mod notes;
pub mod remotes;

pub fn discover(start: &Path) -> Result<Repository, Error> {
    Repository::discover(start)
}

pub fn repo_root(repo: &Repository) -> Result<PathBuf, Error> {
    repo.workdir()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| Error::from_str("repository has no working directory"))
}

/// Prefer the repo config signature, falling back to a fixed identity so
/// note writes work in hook environments with no user configured.
pub(crate) fn signature(repo: &Repository) -> Result<Signature<'static>, Error> {
    repo.signature()
        .or_else(|_| Signature::now("claude-was-here", "claude-was-here@local"))
}

fn blob_text(repo: &Repository, oid: Oid) -> Result<Option<String>, Error> {
    let blob = repo.find_blob(oid)?;
    if blob.is_binary() {
        return Ok(None);
    }
    Ok(Some(
        String::from_utf8_lossy(blob.content()).into_owned(),
    ))
}

/// One index entry relevant to reconciliation: the staged blob text and the
/// parent (HEAD) version. `None` content means binary or unreadable, which
/// callers must treat as not attributable.
#[derive(Debug)]
pub struct StagedFile {
    pub path: String,
    pub staged: Option<String>,
    pub parent: Option<String>,
}

/// Snapshot the staged set (index vs HEAD). Rename detection stays off: a
/// rename surfaces as delete + add and carries no authorship across.
pub fn staged_files(repo: &Repository) -> Result<Vec<StagedFile>, Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false)
        .include_ignored(false)
        .include_unmodified(false)
        .renames_head_to_index(false)
        .renames_index_to_workdir(false)
        .update_index(false)
        .show(StatusShow::Index);

    let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
    let index = repo.index()?;
    let statuses = repo.statuses(Some(&mut opts))?;
    let mut out = Vec::new();

    for entry in statuses.iter() {
        let status = entry.status();
        if !status.intersects(
            Status::INDEX_NEW | Status::INDEX_MODIFIED | Status::INDEX_TYPECHANGE,
        ) {
            continue;
        }

        let Some(path) = entry
            .head_to_index()
            .and_then(|d| d.new_file().path())
            .and_then(|p| p.to_str())
            .or_else(|| entry.path())
            .map(str::to_string)
        else {
            continue;
        };

        let staged = index
            .get_path(Path::new(&path), 0)
            .map(|ie| blob_text(repo, ie.id))
            .transpose()?
            .flatten();

        let parent = head_tree
            .as_ref()
            .and_then(|tree| tree.get_path(Path::new(&path)).ok())
            .map(|te| blob_text(repo, te.id()))
            .transpose()?
            .flatten();

        out.push(StagedFile {
            path,
            staged,
            parent,
        });
    }

    Ok(out)
}

/// Text of `path` in the tree of `commit`; `None` when the path is absent or
/// the blob is binary.
pub fn read_blob_at(repo: &Repository, commit: Oid, path: &str) -> Result<Option<String>, Error> {
    let tree = repo.find_commit(commit)?.tree()?;
    read_blob_in_tree(repo, &tree, path)
}

pub fn read_blob_in_tree(
    repo: &Repository,
    tree: &Tree<'_>,
    path: &str,
) -> Result<Option<String>, Error> {
    match tree.get_path(Path::new(path)) {
        Ok(entry) => blob_text(repo, entry.id()),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// First-parent chain `base..head`, oldest first. Errors when `base` is not
/// reachable from `head` along first parents.
pub fn commits_between(repo: &Repository, base: Oid, head: Oid) -> Result<Vec<Oid>, Error> {
    let mut chain = Vec::new();
    let mut cur = head;

    while cur != base {
        chain.push(cur);
        let commit = repo.find_commit(cur)?;
        if commit.parent_count() == 0 {
            return Err(Error::from_str(
                "base is not a first-parent ancestor of head",
            ));
        }
        cur = commit.parent_id(0)?;
    }

    chain.reverse();
    Ok(chain)
}

/// Per-path zero-context hunk lists for the transformation `old` → `new`.
/// A deleted or binary file maps to a single whole-file replacement hunk so
/// remapping drops every carried range.
pub fn tree_diff_hunks(
    repo: &Repository,
    old: Option<&Tree<'_>>,
    new: Option<&Tree<'_>>,
) -> Result<HashMap<String, Vec<DiffHunk>>, Error> {
    let mut opts = DiffOptions::new();
    opts.context_lines(0).ignore_submodules(true);

    let diff = repo.diff_tree_to_tree(old, new, Some(&mut opts))?;
    let mut out = HashMap::new();

    for (idx, delta) in diff.deltas().enumerate() {
        let Some(path) = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .and_then(|p| p.to_str())
            .map(str::to_string)
        else {
            continue;
        };

        let binary = delta.old_file().is_binary() || delta.new_file().is_binary();
        let mut hunks = Vec::new();

        if !binary
            && let Some(mut patch) = Patch::from_diff(&diff, idx)?
        {
            for h in 0..patch.num_hunks() {
                let (hunk, _) = patch.hunk(h)?;
                hunks.push(DiffHunk {
                    old_start: hunk.old_start(),
                    old_len: hunk.old_lines(),
                    new_start: hunk.new_start(),
                    new_len: hunk.new_lines(),
                });
            }
        }

        if hunks.is_empty() && (binary || delta.status() == Delta::Deleted) {
            hunks.push(DiffHunk {
                old_start: 1,
                old_len: u32::MAX,
                new_start: 1,
                new_len: 0,
            });
        }

        out.insert(path, hunks);
    }

    Ok(out)
}

pub fn head_commit(repo: &Repository) -> Result<Oid, Error> {
    Ok(repo.head()?.peel_to_commit()?.id())
}

/// Resolve a user-supplied revision to a commit id.
pub fn resolve_commit(repo: &Repository, spec: &str) -> Result<Oid, Error> {
    Ok(repo.revparse_single(spec)?.peel_to_commit()?.id())
}

#[cfg(test)]
mod tests;
