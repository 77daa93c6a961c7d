use claude_was_here_core::annotate;
use claude_was_here_core::display;
use claude_was_here_core::rollup::{self, RollupData};
use claude_was_here_core::vcs;

use super::shared::{EXIT_SUCCESS, EXIT_USAGE, HookContext, absorb, hook_context};

fn resolve_or_usage(ctx: &HookContext, spec: &str) -> Result<git2::Oid, i32> {
    vcs::resolve_commit(&ctx.repo, spec).map_err(|err| {
        display::error(&format!("cannot resolve `{spec}`: {err}"));
        EXIT_USAGE
    })
}

fn write_rollup(
    ctx: &HookContext,
    target: git2::Oid,
    record: &claude_was_here_core::annotation::AnnotationRecord,
) -> i32 {
    if record.is_empty() {
        display::info("no AI-authored lines survive in the merge range");
        return EXIT_SUCCESS;
    }

    match annotate::write_annotation(&ctx.repo, &ctx.config, target, record) {
        Ok(_) => {
            display::info(&format!(
                "annotated {} file(s) on the merge commit",
                record.files().len()
            ));
            EXIT_SUCCESS
        }
        Err(err) => absorb(err),
    }
}

pub(crate) fn run_rollup(base: &str, head: &str) -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };
    let (base, head) = match (resolve_or_usage(&ctx, base), resolve_or_usage(&ctx, head)) {
        (Ok(base), Ok(head)) => (base, head),
        (Err(code), _) | (_, Err(code)) => return code,
    };

    match rollup::rollup_between(&ctx.repo, &ctx.config, base, head) {
        Ok(record) => write_rollup(&ctx, head, &record),
        Err(err) => absorb(err),
    }
}

pub(crate) fn run_rollup_squash(data_file: &str, base: &str, merge: &str) -> i32 {
    let ctx = match hook_context() {
        Ok(ctx) => ctx,
        Err(err) => return absorb(err),
    };

    let raw = match std::fs::read_to_string(data_file) {
        Ok(raw) => raw,
        Err(err) => {
            display::error(&format!("cannot read data file `{data_file}`: {err}"));
            return EXIT_USAGE;
        }
    };
    let data = match RollupData::parse(&raw) {
        Ok(data) => data,
        Err(err) => {
            display::error(&format!("malformed data file `{data_file}`: {err}"));
            return EXIT_USAGE;
        }
    };

    let (base, merge) = match (resolve_or_usage(&ctx, base), resolve_or_usage(&ctx, merge)) {
        (Ok(base), Ok(merge)) => (base, merge),
        (Err(code), _) | (_, Err(code)) => return code,
    };

    match rollup::rollup_from_data(&ctx.repo, &data, base, merge) {
        Ok(record) => write_rollup(&ctx, merge, &record),
        Err(err) => absorb(err),
    }
}
