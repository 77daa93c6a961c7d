use std::io::Read;

use claude_was_here_core::display;
use claude_was_here_core::event;

use super::shared::{EXIT_SUCCESS, hook_context};

/// Ingest one tool event from stdin. Malformed events and staging failures
/// are logged and dropped; the editor hook always sees success so the
/// user's session is never interrupted.
pub(crate) fn run_track_changes() -> i32 {
    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        display::warn("could not read tool event from stdin");
        return EXIT_SUCCESS;
    }
    if raw.trim().is_empty() {
        display::warn("empty tool event dropped");
        return EXIT_SUCCESS;
    }

    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => {
            display::warn(&format!("not tracking outside a repository: {err}"));
            return EXIT_SUCCESS;
        }
    };

    match event::ingest(&ctx.root, &ctx.config, &raw) {
        Ok(Some(outcome)) => {
            display::debug(&format!(
                "{}: {} AI line(s) staged",
                outcome.path, outcome.lines
            ));
        }
        Ok(None) => {}
        Err(err) => display::warn(&err.to_string()),
    }
    EXIT_SUCCESS
}
