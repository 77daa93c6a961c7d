use claude_was_here_core::display;
use claude_was_here_core::query;
use claude_was_here_core::vcs;

use super::shared::{EXIT_SUCCESS, EXIT_USAGE, absorb, hook_context};

/// Print the AI-authored ranges of one file as a JSON array of `[s, e]`
/// pairs, against a commit or the working tree.
pub(crate) fn run_lines(path: &str, commit: Option<&str>) -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    let set = match commit {
        Some(spec) => {
            let commit = match vcs::resolve_commit(&ctx.repo, spec) {
                Ok(commit) => commit,
                Err(err) => {
                    display::error(&format!("cannot resolve `{spec}`: {err}"));
                    return EXIT_USAGE;
                }
            };
            query::authorship(&ctx.repo, &ctx.config, commit, path)
        }
        None => query::authorship_working_tree(&ctx.repo, &ctx.config, &ctx.store(), path),
    };

    match set {
        Ok(set) => match serde_json::to_string(&set) {
            Ok(json) => {
                println!("{json}");
                EXIT_SUCCESS
            }
            Err(err) => absorb(err.into()),
        },
        Err(err) => absorb(err),
    }
}
