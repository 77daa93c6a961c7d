use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::config::Config;
use crate::display;
use crate::errors::{Result, TrackError};
use crate::linediff::{self, DiffHunk};
use crate::ranges::{self, RangeSet};
use crate::staging::{StagingEntry, StagingStore};

/// Sentinel length for a hunk that replaces a pre-image of unknown size.
const WHOLE_FILE: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// Wire format (PostToolUse hook payload, one JSON object per event)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEvent {
    tool_name: String,
    #[serde(default)]
    cwd: Option<String>,
    tool_input: RawToolInput,
    #[serde(default)]
    tool_response: Option<RawToolResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawToolInput {
    file_path: Option<String>,
    content: Option<String>,
    old_string: Option<String>,
    new_string: Option<String>,
    edits: Option<Vec<EditPair>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EditPair {
    pub old_string: String,
    pub new_string: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawToolResponse {
    #[serde(rename = "structuredPatch")]
    structured_patch: Option<Vec<PatchHunk>>,
}

/// One hunk of the editor's own patch, context lines included.
#[derive(Clone, Debug, Deserialize)]
pub struct PatchHunk {
    #[serde(rename = "oldStart")]
    pub old_start: u32,
    #[serde(rename = "oldLines")]
    pub old_lines: u32,
    #[serde(rename = "newStart")]
    pub new_start: u32,
    #[serde(rename = "newLines")]
    pub new_lines: u32,
    #[serde(default)]
    pub lines: Vec<String>,
}

// ---------------------------------------------------------------------------
// Domain model
// ---------------------------------------------------------------------------

/// A parsed tool event, tagged by the editing tool that produced it.
#[derive(Debug)]
pub enum ToolEvent {
    Write {
        path: String,
        content: String,
    },
    Edit {
        path: String,
        edit: EditPair,
        patch: Option<Vec<PatchHunk>>,
    },
    MultiEdit {
        path: String,
        edits: Vec<EditPair>,
        patch: Option<Vec<PatchHunk>>,
    },
}

impl ToolEvent {
    pub fn path(&self) -> &str {
        match self {
            ToolEvent::Write { path, .. }
            | ToolEvent::Edit { path, .. }
            | ToolEvent::MultiEdit { path, .. } => path,
        }
    }
}

/// Parse and validate one raw event against the repository root. The file
/// path is normalized to a repo-root-relative, forward-slash form.
pub fn parse_event(raw: &str, repo_root: &Path) -> Result<ToolEvent> {
    let event: RawEvent =
        serde_json::from_str(raw).map_err(|err| TrackError::InvalidEvent(err.to_string()))?;

    let file_path = event
        .tool_input
        .file_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| TrackError::InvalidEvent("missing tool_input.file_path".to_string()))?;

    let path = relativize(file_path, event.cwd.as_deref(), repo_root)?;
    let patch = event.tool_response.and_then(|r| r.structured_patch);

    match event.tool_name.as_str() {
        "Write" => {
            let content = event.tool_input.content.ok_or_else(|| {
                TrackError::InvalidEvent("Write event missing tool_input.content".to_string())
            })?;
            Ok(ToolEvent::Write { path, content })
        }
        "Edit" => {
            let (old_string, new_string) =
                match (event.tool_input.old_string, event.tool_input.new_string) {
                    (Some(old), Some(new)) => (old, new),
                    _ => {
                        return Err(TrackError::InvalidEvent(
                            "Edit event missing old_string/new_string".to_string(),
                        ));
                    }
                };
            Ok(ToolEvent::Edit {
                path,
                edit: EditPair {
                    old_string,
                    new_string,
                },
                patch,
            })
        }
        "MultiEdit" => {
            let edits = event.tool_input.edits.unwrap_or_default();
            if edits.is_empty() && patch.is_none() {
                return Err(TrackError::InvalidEvent(
                    "MultiEdit event carries neither edits nor a patch".to_string(),
                ));
            }
            Ok(ToolEvent::MultiEdit { path, edits, patch })
        }
        other => Err(TrackError::InvalidEvent(format!(
            "unsupported tool `{other}`"
        ))),
    }
}

fn relativize(file_path: &str, cwd: Option<&str>, repo_root: &Path) -> Result<String> {
    let candidate = PathBuf::from(file_path);
    let absolute = if candidate.is_absolute() {
        candidate
    } else {
        let base = cwd.map(PathBuf::from).unwrap_or_else(|| repo_root.to_path_buf());
        base.join(candidate)
    };

    // Resolve `.`/`..` lexically; events describe files that may be freshly
    // created, so filesystem canonicalization is not an option.
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }

    let root = repo_root.canonicalize().unwrap_or_else(|_| repo_root.to_path_buf());
    let rel = resolved
        .strip_prefix(&root)
        .or_else(|_| resolved.strip_prefix(repo_root))
        .map_err(|_| {
            TrackError::InvalidEvent(format!(
                "path `{file_path}` is outside the repository root"
            ))
        })?;

    let rel = rel
        .to_str()
        .ok_or_else(|| TrackError::InvalidEvent("file path is not valid UTF-8".to_string()))?
        .replace('\\', "/");
    if rel.is_empty() {
        return Err(TrackError::InvalidEvent(
            "file path resolves to the repository root".to_string(),
        ));
    }
    Ok(rel)
}

// ---------------------------------------------------------------------------
// Per-tool resolvers: each produces the post-image lines the event claims
// plus the diff its change applied, for remapping earlier claims forward.
// ---------------------------------------------------------------------------

struct Resolution {
    lines: RangeSet,
    hunks: Vec<DiffHunk>,
}

fn resolve_write(content: &str) -> Resolution {
    let count = linediff::line_count(content);
    let lines = if count > 0 {
        vec![crate::ranges::LineRange {
            start: 1,
            end: count,
        }]
    } else {
        Vec::new()
    };
    Resolution {
        lines,
        // The pre-image is fully replaced; earlier claims on this path do
        // not survive the remap.
        hunks: vec![DiffHunk {
            old_start: 1,
            old_len: WHOLE_FILE,
            new_start: 1,
            new_len: count,
        }],
    }
}

fn resolve_edit(
    repo_root: &Path,
    path: &str,
    edits: &[EditPair],
    patch: Option<&[PatchHunk]>,
) -> Result<Resolution> {
    if let Some(patch) = patch {
        return Ok(Resolution {
            lines: added_lines_from_patch(patch),
            hunks: refine_patch_hunks(patch),
        });
    }

    // No structured patch: reconstruct the pre-image from the on-disk
    // post-image by reversing each edit, newest first.
    let post = std::fs::read_to_string(repo_root.join(path))
        .map_err(|err| TrackError::DiffFailure(format!("cannot read {path}: {err}")))?;
    let mut pre = post.clone();
    for edit in edits.iter().rev() {
        if edit.new_string.is_empty() {
            continue;
        }
        if let Some(at) = pre.find(&edit.new_string) {
            pre.replace_range(at..at + edit.new_string.len(), &edit.old_string);
        }
    }

    Ok(Resolution {
        lines: linediff::touched_lines(&pre, &post),
        hunks: linediff::diff_hunks(&pre, &post),
    })
}

/// Post-image line numbers of every `+` line in the patch.
fn added_lines_from_patch(hunks: &[PatchHunk]) -> RangeSet {
    let mut lines: Vec<u32> = Vec::new();
    for h in hunks {
        if h.lines.is_empty() {
            lines.extend(h.new_start..h.new_start + h.new_lines);
            continue;
        }
        let mut new_line = if h.new_lines == 0 {
            h.new_start + 1
        } else {
            h.new_start
        };
        for line in &h.lines {
            match line.as_bytes().first() {
                Some(b'+') => {
                    lines.push(new_line);
                    new_line += 1;
                }
                Some(b'-') => {}
                Some(b'\\') => {}
                _ => new_line += 1,
            }
        }
    }
    ranges::compact(&lines)
}

/// Split context-bearing patch hunks into precise zero-context hunks, so
/// context lines inside a hunk are not treated as replaced when remapping.
fn refine_patch_hunks(hunks: &[PatchHunk]) -> Vec<DiffHunk> {
    let mut out = Vec::new();
    for h in hunks {
        if h.lines.is_empty() {
            out.push(DiffHunk {
                old_start: h.old_start,
                old_len: h.old_lines,
                new_start: h.new_start,
                new_len: h.new_lines,
            });
            continue;
        }

        let mut old_line = if h.old_lines == 0 {
            h.old_start + 1
        } else {
            h.old_start
        };
        let mut new_line = if h.new_lines == 0 {
            h.new_start + 1
        } else {
            h.new_start
        };
        let (mut del_start, mut del_len) = (0u32, 0u32);
        let (mut add_start, mut add_len) = (0u32, 0u32);

        let mut flush = |old_line: u32,
                         new_line: u32,
                         del_start: &mut u32,
                         del_len: &mut u32,
                         add_start: &mut u32,
                         add_len: &mut u32| {
            if *del_len > 0 || *add_len > 0 {
                out.push(DiffHunk {
                    old_start: if *del_len > 0 { *del_start } else { old_line - 1 },
                    old_len: *del_len,
                    new_start: if *add_len > 0 { *add_start } else { new_line - 1 },
                    new_len: *add_len,
                });
                *del_len = 0;
                *add_len = 0;
            }
        };

        for line in &h.lines {
            match line.as_bytes().first() {
                Some(b'-') => {
                    if del_len == 0 {
                        del_start = old_line;
                    }
                    del_len += 1;
                    old_line += 1;
                }
                Some(b'+') => {
                    if add_len == 0 {
                        add_start = new_line;
                    }
                    add_len += 1;
                    new_line += 1;
                }
                Some(b'\\') => {}
                _ => {
                    flush(
                        old_line,
                        new_line,
                        &mut del_start,
                        &mut del_len,
                        &mut add_start,
                        &mut add_len,
                    );
                    old_line += 1;
                    new_line += 1;
                }
            }
        }
        flush(
            old_line,
            new_line,
            &mut del_start,
            &mut del_len,
            &mut add_start,
            &mut add_len,
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Ingest (C2)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct IngestOutcome {
    pub path: String,
    pub lines: u64,
}

/// Consume one raw tool event: fold its claimed lines into the staging entry
/// for the file, remapping any earlier claim through the event's own diff
/// first, then archive the event.
pub fn ingest(repo_root: &Path, config: &Config, raw: &str) -> Result<Option<IngestOutcome>> {
    let event = parse_event(raw, repo_root)?;
    let path = event.path().to_string();

    if path.starts_with(&format!("{}/", config.tracking_dir)) || path == config.tracking_dir {
        display::debug(&format!("ignoring event for tracking-dir path {path}"));
        return Ok(None);
    }

    let resolution = match &event {
        ToolEvent::Write { content, .. } => resolve_write(content),
        ToolEvent::Edit { edit, patch, .. } => resolve_edit(
            repo_root,
            &path,
            std::slice::from_ref(edit),
            patch.as_deref(),
        )?,
        ToolEvent::MultiEdit { edits, patch, .. } => {
            resolve_edit(repo_root, &path, edits, patch.as_deref())?
        }
    };

    let store = StagingStore::open(repo_root, config);
    let _lock = store.lock()?;

    let carried = match store.read_entry(&path)? {
        Some(prev) => ranges::remap(&prev.lines, &resolution.hunks),
        None => Vec::new(),
    };
    let merged = ranges::union(&carried, &resolution.lines);

    if merged.is_empty() {
        store.remove_entry(&path)?;
    } else {
        store.write_entry(&StagingEntry::new(path.clone(), merged.clone()))?;
    }
    store.archive_event(raw)?;

    display::debug(&format!(
        "staged {} AI line(s) for {path}",
        ranges::line_count(&merged)
    ));
    Ok(Some(IngestOutcome {
        path,
        lines: ranges::line_count(&merged),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::LineRange;

    fn rs(pairs: &[(u32, u32)]) -> RangeSet {
        pairs
            .iter()
            .map(|&(start, end)| LineRange { start, end })
            .collect()
    }

    fn write_event(root: &Path, rel: &str, content: &str) -> String {
        serde_json::to_string(&serde_json::json!({
            "hook_event_name": "PostToolUse",
            "tool_name": "Write",
            "cwd": root.to_str().unwrap(),
            "tool_input": { "file_path": rel, "content": content },
        }))
        .unwrap()
    }

    #[test]
    fn parse_rejects_missing_fields() {
        let root = Path::new("/repo");
        assert!(matches!(
            parse_event("{}", root),
            Err(TrackError::InvalidEvent(_))
        ));
        assert!(matches!(
            parse_event(
                r#"{"tool_name":"Write","tool_input":{"content":"x"}}"#,
                root
            ),
            Err(TrackError::InvalidEvent(_))
        ));
        assert!(matches!(
            parse_event(
                r#"{"tool_name":"Bash","tool_input":{"file_path":"a"}}"#,
                root
            ),
            Err(TrackError::InvalidEvent(_))
        ));
    }

    #[test]
    fn parse_relativizes_absolute_and_cwd_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let abs = root.join("src/main.rs");
        let raw = serde_json::to_string(&serde_json::json!({
            "tool_name": "Write",
            "tool_input": { "file_path": abs.to_str().unwrap(), "content": "fn main() {}\n" },
        }))
        .unwrap();
        let event = parse_event(&raw, root).unwrap();
        assert_eq!(event.path(), "src/main.rs");

        let raw = write_event(root, "src/lib.rs", "pub fn x() {}\n");
        assert_eq!(parse_event(&raw, root).unwrap().path(), "src/lib.rs");
    }

    #[test]
    fn parse_rejects_paths_escaping_the_repo() {
        let dir = tempfile::TempDir::new().unwrap();
        let raw = write_event(dir.path(), "../outside.txt", "x\n");
        assert!(matches!(
            parse_event(&raw, dir.path()),
            Err(TrackError::InvalidEvent(_))
        ));
    }

    #[test]
    fn added_lines_follow_plus_markers() {
        let hunks = vec![PatchHunk {
            old_start: 1,
            old_lines: 3,
            new_start: 1,
            new_lines: 4,
            lines: vec![
                " ctx".to_string(),
                "-old".to_string(),
                "+new one".to_string(),
                "+new two".to_string(),
                " ctx".to_string(),
            ],
        }];
        assert_eq!(added_lines_from_patch(&hunks), rs(&[(2, 3)]));
    }

    #[test]
    fn refine_splits_context_out_of_hunks() {
        let hunks = vec![PatchHunk {
            old_start: 4,
            old_lines: 5,
            new_start: 4,
            new_lines: 5,
            lines: vec![
                " a".to_string(),
                "-b".to_string(),
                "+B".to_string(),
                " c".to_string(),
                " d".to_string(),
                "+E".to_string(),
            ],
        }];
        let refined = refine_patch_hunks(&hunks);
        assert_eq!(
            refined,
            vec![
                DiffHunk {
                    old_start: 5,
                    old_len: 1,
                    new_start: 5,
                    new_len: 1,
                },
                DiffHunk {
                    old_start: 8,
                    old_len: 0,
                    new_start: 9,
                    new_len: 1,
                },
            ]
        );
    }

    #[test]
    fn ingest_accumulates_and_remaps_prior_claims() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let config = Config::default();

        // AI creates a three-line file.
        let raw = write_event(root, "notes.txt", "one\ntwo\nthree\n");
        std::fs::write(root.join("notes.txt"), "one\ntwo\nthree\n").unwrap();
        ingest(root, &config, &raw).unwrap();

        let store = StagingStore::open(root, &config);
        let entry = store.read_entry("notes.txt").unwrap().unwrap();
        assert_eq!(entry.lines, rs(&[(1, 3)]));

        // AI inserts one line after line 1; the old claim shifts down.
        let raw = serde_json::to_string(&serde_json::json!({
            "tool_name": "Edit",
            "cwd": root.to_str().unwrap(),
            "tool_input": {
                "file_path": "notes.txt",
                "old_string": "one\n",
                "new_string": "one\nhalf\n",
            },
            "tool_response": { "structuredPatch": [ {
                "oldStart": 1, "oldLines": 2, "newStart": 1, "newLines": 3,
                "lines": [" one", "+half", " two"],
            } ] },
        }))
        .unwrap();
        ingest(root, &config, &raw).unwrap();

        let entry = store.read_entry("notes.txt").unwrap().unwrap();
        assert_eq!(entry.lines, rs(&[(1, 4)]));
    }

    #[test]
    fn ingest_write_replaces_earlier_claims() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let config = Config::default();

        ingest(root, &config, &write_event(root, "a.txt", "1\n2\n3\n4\n5\n")).unwrap();
        ingest(root, &config, &write_event(root, "a.txt", "1\n2\n")).unwrap();

        let store = StagingStore::open(root, &config);
        let entry = store.read_entry("a.txt").unwrap().unwrap();
        assert_eq!(entry.lines, rs(&[(1, 2)]));
    }

    #[test]
    fn ingest_skips_tracking_dir_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::default();
        let raw = write_event(dir.path(), ".claude-was-here/config.toml", "x\n");
        assert!(ingest(dir.path(), &config, &raw).unwrap().is_none());
    }
}
