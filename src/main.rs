use std::process::ExitCode;

use membranch::cli::{self, Cli};
use membranch::ui::output::{self, Verbosity};
use tracing_subscriber::EnvFilter;

/// Exit code for any error reported by a command.
const EXIT_ERROR: u8 = 2;

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(Verbosity::from_flags(cli.quiet, cli.debug));

    match cli::run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_ERROR)),
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
