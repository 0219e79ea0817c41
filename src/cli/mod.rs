// src/cli/mod.rs — CLI definition (clap derive)

pub mod init;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "surveyor", about = "Credit-metered research assistant", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// First-time setup: create directories and a commented config file
    Init,
}
