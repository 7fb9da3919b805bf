mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use registry_gc::{Collector, DEFAULT_DATA_DIR, GcError, ImageRef, Store};

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if args.force {
        info!(
            "You supplied the force switch, which is deprecated. It has no effect now, and the \
             tool defaults to doing what used to only happen when force was true."
        );
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), GcError> {
    let data_dir = std::env::var("REGISTRY_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let data_dir_path = std::path::PathBuf::from(&data_dir);
    if !data_dir_path.is_dir() {
        return Err(GcError::DataDirNotFound(data_dir));
    }

    let image = ImageRef::parse(&args.image)?;
    let store = Store::new(data_dir_path, args.dry_run);
    let collector = Collector::new(store);

    if args.untagged {
        collector.delete_untagged(&image.repository)?;
    } else if let Some(tag) = &image.tag {
        collector.delete_tag(&image.repository, tag)?;
    } else {
        collector.delete_repository(&image.repository)?;
    }

    if args.prune {
        registry_gc::prune::prune(collector.store());
    }

    Ok(())
}
