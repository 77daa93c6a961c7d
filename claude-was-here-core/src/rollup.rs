use std::collections::{BTreeMap, HashMap};

use git2::{Oid, Repository};
use serde::Deserialize;

use crate::annotate;
use crate::annotation::AnnotationRecord;
use crate::config::Config;
use crate::display;
use crate::errors::Result;
use crate::linediff;
use crate::ranges::{self, LineRange, RangeSet};
use crate::vcs;

/// Pre-collected inputs for a hub-side squash rollup: the per-commit
/// annotations of a merged branch, oldest first. Diffs are recomputed from
/// the local object store, so the listed commits must be reachable.
#[derive(Debug, Deserialize)]
pub struct RollupData {
    #[serde(default)]
    pub base: Option<String>,
    pub commits: Vec<RollupDataEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RollupDataEntry {
    pub commit: String,
    #[serde(default)]
    pub annotation: Option<AnnotationRecord>,
}

impl RollupData {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Roll the annotations on `base..head` up into the single annotation a
/// squash of that range must carry. Annotations are read from the metadata
/// ref; the result is expressed over the tree of `head`.
pub fn rollup_between(
    repo: &Repository,
    config: &Config,
    base: Oid,
    head: Oid,
) -> Result<AnnotationRecord> {
    let commits = vcs::commits_between(repo, base, head)?;
    let mut steps = Vec::with_capacity(commits.len());
    for commit in commits {
        steps.push((commit, annotate::read_annotation(repo, config, commit)?));
    }
    roll(repo, base, &steps, head)
}

/// Same computation, with annotations supplied by a data file instead of the
/// local metadata ref, written onto a merge commit whose tree equals the
/// branch tip's.
pub fn rollup_from_data(
    repo: &Repository,
    data: &RollupData,
    base: Oid,
    merge: Oid,
) -> Result<AnnotationRecord> {
    let mut steps = Vec::with_capacity(data.commits.len());
    for entry in &data.commits {
        let commit = Oid::from_str(&entry.commit)?;

        let annotation = match &entry.annotation {
            Some(annotation) => match annotation.validate() {
                Ok(()) => Some(annotation.clone()),
                Err(reason) => {
                    display::warn(&format!(
                        "ignoring invalid annotation for {} in data file: {reason}",
                        entry.commit
                    ));
                    None
                }
            },
            None => None,
        };
        steps.push((commit, annotation));
    }

    roll(repo, base, &steps, merge)
}

/// The carry algorithm, per path independently: remap what earlier commits
/// authored through this commit's diff, then union in this commit's own
/// claims. After the last step the carry is expressed over the final tree;
/// a clamp against that tree keeps adversarial inputs from attributing
/// lines past EOF or on deleted files.
fn roll(
    repo: &Repository,
    base: Oid,
    steps: &[(Oid, Option<AnnotationRecord>)],
    target: Oid,
) -> Result<AnnotationRecord> {
    let mut carry: HashMap<String, RangeSet> = HashMap::new();
    let mut prev_tree = repo.find_commit(base)?.tree()?;

    for (commit, annotation) in steps {
        let tree = repo.find_commit(*commit)?.tree()?;
        let diffs = vcs::tree_diff_hunks(repo, Some(&prev_tree), Some(&tree))?;

        let current = std::mem::take(&mut carry);
        for (path, set) in current {
            let mapped = match diffs.get(&path) {
                Some(hunks) => ranges::remap(&set, hunks),
                None => set,
            };
            if !mapped.is_empty() {
                carry.insert(path, mapped);
            }
        }

        if let Some(annotation) = annotation {
            for (path, file) in annotation.files() {
                let merged = match carry.get(path) {
                    Some(existing) => ranges::union(existing, &file.ranges),
                    None => file.ranges.clone(),
                };
                carry.insert(path.clone(), merged);
            }
        }

        prev_tree = tree;
    }

    let final_tree = repo.find_commit(target)?.tree()?;
    let mut files: BTreeMap<String, RangeSet> = BTreeMap::new();
    for (path, set) in carry {
        let Some(content) = vcs::read_blob_in_tree(repo, &final_tree, &path)? else {
            continue;
        };
        let count = linediff::line_count(&content);
        if count == 0 {
            continue;
        }
        let clamped = ranges::intersect(&set, &[LineRange { start: 1, end: count }]);
        if !clamped.is_empty() {
            files.insert(path, clamped);
        }
    }

    Ok(AnnotationRecord::from_ranges(files))
}
