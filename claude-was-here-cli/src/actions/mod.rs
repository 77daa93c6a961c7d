mod hooks;
mod lines;
mod rollup;
mod shared;
mod track;

pub(crate) use hooks::{run_fetch_metadata, run_post_commit, run_pre_commit, run_pre_push};
pub(crate) use lines::run_lines;
pub(crate) use rollup::{run_rollup, run_rollup_squash};
pub(crate) use track::run_track_changes;
