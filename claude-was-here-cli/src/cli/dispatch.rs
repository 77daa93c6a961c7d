use clap::Parser;

use claude_was_here_core::display::{self, Verbosity};

use crate::actions;
use crate::cli::args::{Cli, Commands};

pub(crate) fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit 2; help and version render and exit 0.
        Err(err) => err.exit(),
    };

    let verbosity = if cli.global.quiet {
        Verbosity::Quiet
    } else {
        match cli.global.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    };
    display::init(verbosity, cli.global.no_ansi);

    match cli.command {
        Commands::TrackChanges => actions::run_track_changes(),
        Commands::PreCommit => actions::run_pre_commit(),
        Commands::PostCommit => actions::run_post_commit(),
        Commands::PrePush => actions::run_pre_push(),
        Commands::FetchMetadata => actions::run_fetch_metadata(),
        Commands::Rollup { base, head } => actions::run_rollup(&base, &head),
        Commands::RollupSquash {
            data_file,
            base,
            merge,
        } => actions::run_rollup_squash(&data_file, &base, &merge),
        Commands::Lines { path, commit } => actions::run_lines(&path, commit.as_deref()),
    }
}
