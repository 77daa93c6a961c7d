use std::path::{Path, PathBuf};

use git2::Repository;

use claude_was_here_core::config::{self, Config};
use claude_was_here_core::display;
use claude_was_here_core::staging::StagingStore;
use claude_was_here_core::vcs;
use claude_was_here_core::TrackError;

pub(crate) const EXIT_SUCCESS: i32 = 0;
pub(crate) const EXIT_RECOVERABLE: i32 = 1;
pub(crate) const EXIT_USAGE: i32 = 2;

pub(crate) struct HookContext {
    pub(crate) repo: Repository,
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
}

impl HookContext {
    pub(crate) fn store(&self) -> StagingStore {
        StagingStore::open(&self.root, &self.config)
    }
}

pub(crate) fn hook_context() -> Result<HookContext, TrackError> {
    let repo = vcs::discover(Path::new("."))?;
    let root = vcs::repo_root(&repo)?;
    let config = config::load(&root);
    Ok(HookContext { repo, root, config })
}

/// Provenance tracking never blocks the user's git operation: log the
/// failure and report the recoverable exit code.
pub(crate) fn absorb(err: TrackError) -> i32 {
    display::warn(&err.to_string());
    EXIT_RECOVERABLE
}
