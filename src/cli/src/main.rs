//! oci2aci CLI entry point.

use clap::Parser;

use oci2aci_cli::{execute, Cli};

fn main() {
    let cli = Cli::parse();
    let mut config = cli.config();

    // RUST_LOG wins over the configured level
    if let Ok(filter) = std::env::var("RUST_LOG") {
        config = config.with_log_filter(filter);
    }

    if let Err(e) = execute(&cli, config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
