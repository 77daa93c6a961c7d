use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::display;
use crate::errors::Result;
use crate::ranges::RangeSet;

pub const PENDING_FILE: &str = "pending_commit_metadata.json";
const ARCHIVE_DIR: &str = "archive";
const LOCK_FILE: &str = ".lock";
const LOCK_POLL: Duration = Duration::from_millis(50);

/// Accumulated AI-claimed lines for one tracked file, expressed over the
/// file's latest post-image. Lives from the first tool event until the next
/// successful commit consumes it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingEntry {
    pub path: String,
    pub lines: RangeSet,
    pub updated_at: DateTime<Utc>,
}

impl StagingEntry {
    pub fn new(path: String, lines: RangeSet) -> Self {
        StagingEntry {
            path,
            lines,
            updated_at: Utc::now(),
        }
    }
}

/// On-disk staging store under `<repo-root>/<tracking-dir>/`. Every mutation
/// is an atomic write-to-temp + rename; cross-process exclusion uses the
/// advisory `.lock` file.
pub struct StagingStore {
    dir: PathBuf,
    lock_stale: Duration,
}

pub struct StagingLock {
    path: PathBuf,
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Write `contents` to `path` through a temp file in the same directory so
/// readers never observe a partial file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

impl StagingStore {
    pub fn open(repo_root: &Path, config: &Config) -> Self {
        StagingStore {
            dir: config.tracking_dir_in(repo_root),
            lock_stale: Duration::from_secs(config.lock_stale_secs),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    fn entry_path(&self, rel: &str) -> PathBuf {
        self.dir.join(format!("{rel}.json"))
    }

    /// Block until the advisory lock is held. A lock older than the
    /// configured stale age is treated as abandoned and broken.
    pub fn lock(&self) -> Result<StagingLock> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(LOCK_FILE);

        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_) => return Ok(StagingLock { path }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    let stale = fs::metadata(&path)
                        .and_then(|meta| meta.modified())
                        .ok()
                        .and_then(|modified| modified.elapsed().ok())
                        .is_some_and(|age| age > self.lock_stale);

                    if stale {
                        display::debug("breaking stale staging lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn read_entry(&self, rel: &str) -> Result<Option<StagingEntry>> {
        read_entry_file(&self.entry_path(rel))
    }

    pub fn write_entry(&self, entry: &StagingEntry) -> Result<()> {
        let json = serde_json::to_string_pretty(entry)?;
        write_atomic(&self.entry_path(&entry.path), &json)?;
        Ok(())
    }

    pub fn remove_entry(&self, rel: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(rel)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// All current staging entries, in path order. Corrupt entry files are
    /// logged and skipped, never repaired.
    pub fn entries(&self) -> Result<Vec<StagingEntry>> {
        let mut out = Vec::new();
        if self.dir.is_dir() {
            self.collect_entries(&self.dir, &mut out)?;
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn collect_entries(&self, dir: &Path, out: &mut Vec<StagingEntry>) -> Result<()> {
        for item in fs::read_dir(dir)? {
            let item = item?;
            let path = item.path();
            let name = item.file_name();

            if path.is_dir() {
                if dir == self.dir && name == ARCHIVE_DIR {
                    continue;
                }
                self.collect_entries(&path, out)?;
                continue;
            }

            if dir == self.dir
                && (name == PENDING_FILE || name == LOCK_FILE || name == "config.toml")
            {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(entry) = read_entry_file(&path)? {
                out.push(entry);
            }
        }
        Ok(())
    }

    /// Archive a consumed raw tool event for later inspection.
    pub fn archive_event(&self, raw: &str) -> Result<()> {
        let archive = self.dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive)?;
        let name = format!(
            "{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            Uuid::new_v4()
        );
        fs::write(archive.join(name), raw)?;
        Ok(())
    }
}

fn read_entry_file(path: &Path) -> Result<Option<StagingEntry>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(entry) => Ok(Some(entry)),
        Err(err) => {
            display::warn(&format!(
                "skipping corrupt staging entry {}: {err}",
                path.display()
            ));
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::LineRange;

    fn store() -> (tempfile::TempDir, StagingStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StagingStore::open(dir.path(), &Config::default());
        (dir, store)
    }

    #[test]
    fn entries_round_trip_through_disk() {
        let (_dir, store) = store();
        let entry = StagingEntry::new(
            "src/lib.rs".to_string(),
            vec![LineRange { start: 1, end: 4 }],
        );
        store.write_entry(&entry).unwrap();

        let back = store.read_entry("src/lib.rs").unwrap().unwrap();
        assert_eq!(back.path, "src/lib.rs");
        assert_eq!(back.lines, entry.lines);

        store.remove_entry("src/lib.rs").unwrap();
        assert!(store.read_entry("src/lib.rs").unwrap().is_none());
    }

    #[test]
    fn listing_skips_reserved_files_and_archive() {
        let (_dir, store) = store();
        store
            .write_entry(&StagingEntry::new(
                "a.txt".to_string(),
                vec![LineRange { start: 2, end: 2 }],
            ))
            .unwrap();
        store
            .write_entry(&StagingEntry::new(
                "nested/b.txt".to_string(),
                vec![LineRange { start: 1, end: 1 }],
            ))
            .unwrap();
        fs::write(store.pending_path(), "{}").unwrap();
        fs::write(store.dir().join("config.toml"), "remote = \"x\"").unwrap();
        store.archive_event("{}").unwrap();

        let entries = store.entries().unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "nested/b.txt"]);
    }

    #[test]
    fn corrupt_entries_are_skipped_not_fatal() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("broken.txt.json"), "not json").unwrap();
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn stale_locks_are_broken() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let lock_path = store.dir().join(LOCK_FILE);
        fs::write(&lock_path, "").unwrap();

        // Backdate the lock beyond the stale window.
        let old = std::time::SystemTime::now() - Duration::from_secs(3600);
        let file = fs::OpenOptions::new().write(true).open(&lock_path).unwrap();
        file.set_modified(old).unwrap();
        drop(file);

        let guard = store.lock().unwrap();
        drop(guard);
        assert!(!lock_path.exists());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let (_dir, store) = store();
        {
            let _guard = store.lock().unwrap();
            assert!(store.dir().join(LOCK_FILE).exists());
        }
        assert!(!store.dir().join(LOCK_FILE).exists());
    }
}
