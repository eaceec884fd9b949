use std::io::IsTerminal;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use dllversions::cli::{self, Args};

fn main() -> Result<()> {
    let args = Args::from_tokens(std::env::args_os().skip(1));

    // Diagnostics go to stderr; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    cli::run(args)?;

    Ok(())
}
