use claude_was_here_core::annotate;
use claude_was_here_core::display;
use claude_was_here_core::reconcile;
use claude_was_here_core::sync;

use super::shared::{EXIT_SUCCESS, absorb, hook_context};

pub(crate) fn run_pre_commit() -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    match reconcile::reconcile(&ctx.repo, &ctx.config, &ctx.store()) {
        Ok(outcome) => {
            if outcome.files > 0 {
                display::debug(&format!(
                    "reconciled {} file(s), {} line(s)",
                    outcome.files, outcome.lines
                ));
            }
            EXIT_SUCCESS
        }
        Err(err) => absorb(err),
    }
}

pub(crate) fn run_post_commit() -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    match annotate::annotate_head(&ctx.repo, &ctx.config, &ctx.store()) {
        Ok(_) => EXIT_SUCCESS,
        Err(err) => absorb(err),
    }
}

pub(crate) fn run_pre_push() -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    match sync::push_metadata(&ctx.repo, &ctx.config) {
        Ok(()) => EXIT_SUCCESS,
        // The user's push must go through whether or not the metadata did.
        Err(err) => absorb(err),
    }
}

pub(crate) fn run_fetch_metadata() -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    match sync::fetch_metadata(&ctx.repo, &ctx.config) {
        Ok(outcome) => {
            display::info(&format!(
                "annotations: {} adopted, {} merged, {} unchanged",
                outcome.adopted, outcome.merged, outcome.unchanged
            ));
            EXIT_SUCCESS
        }
        Err(err) => absorb(err),
    }
}
