//! cli subcommands for hubscale.
//!
//! - `hubscale serve` - run the registry daemon

pub mod serve;

pub use serve::ServeCommand;

use clap::{Parser, Subcommand};

/// hubscale - node registry for a mesh control plane
#[derive(Parser, Debug)]
#[command(name = "hubscale")]
#[command(about = "Node registry for a mesh control plane", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the registry daemon
    Serve(ServeCommand),
}
