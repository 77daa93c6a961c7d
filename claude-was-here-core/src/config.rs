use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::display;

pub const DEFAULT_TRACKING_DIR: &str = ".claude-was-here";
pub const DEFAULT_NOTES_REF: &str = "refs/notes/claude-was-here";
pub const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_LOCK_STALE_SECS: u64 = 10;
const CONFIG_FILE: &str = "config.toml";

pub const ENV_TRACKING_DIR: &str = "CLAUDE_WAS_HERE_DIR";
pub const ENV_NOTES_REF: &str = "CLAUDE_WAS_HERE_NOTES_REF";
pub const ENV_REMOTE: &str = "CLAUDE_WAS_HERE_REMOTE";

/// Effective settings: defaults, overlaid by `<tracking-dir>/config.toml`,
/// overlaid by environment variables. Loading never fails; invalid values
/// log a warning and fall back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Repo-root-relative directory holding staging state.
    pub tracking_dir: String,
    /// Notes ref the annotations are stored under.
    pub notes_ref: String,
    /// Remote used for metadata push/fetch.
    pub remote: String,
    /// Age after which a leftover staging lock is considered abandoned.
    pub lock_stale_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    tracking_dir: Option<String>,
    notes_ref: Option<String>,
    remote: Option<String>,
    lock_stale_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tracking_dir: DEFAULT_TRACKING_DIR.to_string(),
            notes_ref: DEFAULT_NOTES_REF.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            lock_stale_secs: DEFAULT_LOCK_STALE_SECS,
        }
    }
}

impl Config {
    pub fn tracking_dir_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.tracking_dir)
    }

    /// Staging ref the remote notes are fetched into before reconciliation.
    pub fn remote_staging_ref(&self) -> String {
        format!("{}-remote", self.notes_ref)
    }

    fn overlay(&mut self, file: ConfigFile) {
        if let Some(dir) = file.tracking_dir {
            self.tracking_dir = dir;
        }
        if let Some(notes_ref) = file.notes_ref {
            self.notes_ref = notes_ref;
        }
        if let Some(remote) = file.remote {
            self.remote = remote;
        }
        if let Some(secs) = file.lock_stale_secs {
            self.lock_stale_secs = secs;
        }
    }

    fn validate(&mut self) {
        if self.tracking_dir.is_empty() || Path::new(&self.tracking_dir).is_absolute() {
            display::warn(&format!(
                "tracking dir `{}` must be a repo-relative path; using `{DEFAULT_TRACKING_DIR}`",
                self.tracking_dir
            ));
            self.tracking_dir = DEFAULT_TRACKING_DIR.to_string();
        }
        if !self.notes_ref.starts_with("refs/notes/") {
            display::warn(&format!(
                "notes ref `{}` is not under refs/notes/; using `{DEFAULT_NOTES_REF}`",
                self.notes_ref
            ));
            self.notes_ref = DEFAULT_NOTES_REF.to_string();
        }
        if self.remote.is_empty() {
            self.remote = DEFAULT_REMOTE.to_string();
        }
        if self.lock_stale_secs == 0 {
            self.lock_stale_secs = DEFAULT_LOCK_STALE_SECS;
        }
    }
}

/// Load the effective configuration for a repository.
pub fn load(repo_root: &Path) -> Config {
    let mut config = Config::default();

    if let Ok(dir) = std::env::var(ENV_TRACKING_DIR)
        && !dir.is_empty()
    {
        config.tracking_dir = dir;
    }

    let path = config.tracking_dir_in(repo_root).join(CONFIG_FILE);
    if let Ok(raw) = std::fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&raw) {
            Ok(file) => config.overlay(file),
            Err(err) => display::warn(&format!(
                "ignoring malformed config at {}: {err}",
                path.display()
            )),
        }
    }

    if let Ok(notes_ref) = std::env::var(ENV_NOTES_REF)
        && !notes_ref.is_empty()
    {
        config.notes_ref = notes_ref;
    }
    if let Ok(remote) = std::env::var(ENV_REMOTE)
        && !remote.is_empty()
    {
        config.remote = remote;
    }

    config.validate();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.tracking_dir, ".claude-was-here");
        assert_eq!(config.notes_ref, "refs/notes/claude-was-here");
        assert_eq!(config.remote_staging_ref(), "refs/notes/claude-was-here-remote");
    }

    #[test]
    fn file_overlay_replaces_only_present_keys() {
        let mut config = Config::default();
        let file: ConfigFile = toml::from_str("remote = \"upstream\"").unwrap();
        config.overlay(file);
        assert_eq!(config.remote, "upstream");
        assert_eq!(config.notes_ref, DEFAULT_NOTES_REF);
    }

    #[test]
    fn validation_rejects_refs_outside_notes_namespace() {
        let mut config = Config::default();
        config.notes_ref = "refs/heads/main".to_string();
        config.validate();
        assert_eq!(config.notes_ref, DEFAULT_NOTES_REF);
    }

    #[test]
    fn validation_rejects_absolute_tracking_dir() {
        let mut config = Config::default();
        config.tracking_dir = "/tmp/elsewhere".to_string();
        config.validate();
        assert_eq!(config.tracking_dir, DEFAULT_TRACKING_DIR);
    }

    #[test]
    fn load_reads_config_from_tracking_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let tracking = dir.path().join(DEFAULT_TRACKING_DIR);
        std::fs::create_dir_all(&tracking).unwrap();
        std::fs::write(tracking.join(CONFIG_FILE), "lock_stale_secs = 30\n").unwrap();

        let config = load(dir.path());
        assert_eq!(config.lock_stale_secs, 30);
        assert_eq!(config.tracking_dir, DEFAULT_TRACKING_DIR);
    }
}
