use nsdl_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Initialize logging as early as possible.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!(error = %format!("{:#}", e), "file logging unavailable; using stderr");
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("nsdl error: {:#}", err);
        std::process::exit(1);
    }
}
