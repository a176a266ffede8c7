use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

/// Configure the global tracing subscriber from `-v`/`-q`, mirroring the
/// level-from-verbosity mapping `soar-cli`'s binary uses, minus its custom
/// colored formatter (this binary is a demonstration front-end, not a
/// polished end-user tool).
pub fn setup_logging(args: &Args) {
    let level = if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rpmup={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
