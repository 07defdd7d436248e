use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use mediasync::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over the command-line verbosity
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let state = cli::run(cli).await;
    ExitCode::from(state.exit_code())
}
