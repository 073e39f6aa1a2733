use clap::Parser;
use std::process::ExitCode;
use tabhaiku::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run(Cli::parse()).await
}
