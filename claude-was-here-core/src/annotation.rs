use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::ranges::{self, RangeSet};

pub const ANNOTATION_VERSION: &str = "1.0";

/// The canonical on-commit record. Serialization is deterministic: the outer
/// keys follow declaration order and paths sort lexicographically through the
/// `BTreeMap`, so identical inputs always yield byte-identical JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub claude_was_here: AnnotationBody,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBody {
    pub version: String,
    pub files: BTreeMap<String, FileRanges>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRanges {
    pub ranges: RangeSet,
}

impl AnnotationRecord {
    pub fn from_ranges(files: BTreeMap<String, RangeSet>) -> Self {
        let files = files
            .into_iter()
            .filter(|(_, ranges)| !ranges.is_empty())
            .map(|(path, ranges)| (path, FileRanges { ranges }))
            .collect();

        AnnotationRecord {
            claude_was_here: AnnotationBody {
                version: ANNOTATION_VERSION.to_string(),
                files,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.claude_was_here.files.is_empty()
    }

    pub fn files(&self) -> &BTreeMap<String, FileRanges> {
        &self.claude_was_here.files
    }

    pub fn ranges_for(&self, path: &str) -> RangeSet {
        self.claude_was_here
            .files
            .get(path)
            .map(|file| file.ranges.clone())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and schema-validate a stored annotation blob.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let record: AnnotationRecord =
            serde_json::from_str(raw).map_err(|err| err.to_string())?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let body = &self.claude_was_here;
        if body.version != ANNOTATION_VERSION {
            return Err(format!("unsupported version `{}`", body.version));
        }
        if body.files.is_empty() {
            return Err("annotation has no files".to_string());
        }

        for (path, file) in &body.files {
            if path.is_empty()
                || path.starts_with('/')
                || path.contains('\\')
                || path.split('/').any(|part| part.is_empty() || part == "..")
            {
                return Err(format!("`{path}` is not a repo-relative path"));
            }
            if file.ranges.is_empty() {
                return Err(format!("`{path}` has no ranges"));
            }
            for pair in file.ranges.windows(2) {
                if pair[1].start <= pair[0].end {
                    return Err(format!("`{path}` ranges are unsorted or overlapping"));
                }
            }
        }
        Ok(())
    }

    /// Per-file union of two annotations, the fetch-reconciliation policy.
    pub fn union_with(&self, other: &Self) -> Self {
        let mut files: BTreeMap<String, RangeSet> = BTreeMap::new();
        for (path, file) in self.files().iter().chain(other.files()) {
            let merged = match files.get(path) {
                Some(existing) => ranges::union(existing, &file.ranges),
                None => file.ranges.clone(),
            };
            files.insert(path.clone(), merged);
        }
        AnnotationRecord::from_ranges(files)
    }
}
