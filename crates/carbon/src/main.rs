use clap::Parser;
use std::process::ExitCode;

use carbon::{effective_level, setup_logging, CarbonError, Cli, Console};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match effective_level(cli.log_level.as_deref(), cli.verbose) {
        Ok(level) => setup_logging(level),
        Err(e) => {
            Console::error(&e.to_string());
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = cli.run().await {
        log::debug!("Run failed: {e:?}");
        Console::error(&format!("Error: {e}"));
        if let Some(err) = e.downcast_ref::<CarbonError>() {
            Console::warning(err.hint());
        }
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
