use clap::Parser;

/// Garbage-collect a Docker Registry v2 blob store directly on disk.
///
/// Shut down your registry service to avoid race conditions and possible
/// data loss before running this, then point it at one image per run.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Args {
    /// Image to clean up, as `repo` (delete the whole repository) or
    /// `repo:tag` (delete just that tag).
    #[arg(short, long)]
    pub image: String,

    /// Delete all untagged revisions of `image` instead (the tag portion,
    /// if any, is ignored).
    #[arg(short, long)]
    pub untagged: bool,

    /// Log intended deletions without touching the filesystem.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Sweep empty directories after the primary operation.
    #[arg(short, long)]
    pub prune: bool,

    /// Raise log verbosity to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Deprecated, accepted and ignored: the code path it used to guard is
    /// now unconditional.
    #[arg(short, long)]
    pub force: bool,
}
