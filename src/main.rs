//! Unified shadowlink CLI.
//!
//! - `shadowlink local` - Run the local SOCKS5 client

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// shadowlink unified CLI.
#[derive(Parser)]
#[command(
    name = "shadowlink",
    version,
    about = "Encrypted SOCKS5 tunneling client",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the local SOCKS5 client.
    #[command(name = "local", alias = "client")]
    Local(Box<shadowlink_client::ClientArgs>),
}

// No #[tokio::main]: the local client builds its own worker pool.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Local(args) => shadowlink_client::cli::run(*args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
