use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

/// Track AI-authored lines through commits, squashes, and pushes.
#[derive(Parser, Debug)]
#[command(
    name = "claude-was-here",
    version,
    about,
    disable_help_subcommand = true,
    arg_required_else_help = true,
    propagate_version = true
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalOpts,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(ClapArgs, Debug, Default)]
pub(crate) struct GlobalOpts {
    /// Increase stderr verbosity (`-v` = info, `-vv` = debug); quiet wins over verbose
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    /// Silence everything except errors
    #[arg(short = 'q', long, global = true)]
    pub(crate) quiet: bool,

    /// Disable ANSI color even on TTYs; useful for CI/log scrapers
    #[arg(long = "no-ansi", global = true)]
    pub(crate) no_ansi: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Ingest one tool event from stdin into the staging store
    TrackChanges,

    /// Reconcile staged files against AI claims (pre-commit hook)
    PreCommit,

    /// Attach the pending annotation to the new commit (post-commit hook)
    PostCommit,

    /// Publish the metadata ref after a push (pre-push hook)
    PrePush,

    /// Fetch the remote metadata ref and reconcile divergence
    FetchMetadata,

    /// Roll annotations on base..head up onto the head commit
    Rollup {
        /// Merge base of the range
        #[arg(long)]
        base: String,
        /// Branch tip carrying the annotations
        #[arg(long)]
        head: String,
    },

    /// Roll pre-collected annotations onto a squash-merge commit
    RollupSquash {
        /// JSON file with the per-commit annotations, oldest first
        #[arg(long = "data-file")]
        data_file: String,
        /// Merge base of the squashed range
        #[arg(long)]
        base: String,
        /// The squash commit to annotate
        #[arg(long)]
        merge: String,
    },

    /// Print the AI-authored ranges of a file as JSON
    Lines {
        /// Repo-relative file path
        path: String,
        /// Commit to inspect; defaults to the working tree
        #[arg(long)]
        commit: Option<String>,
    },
}
