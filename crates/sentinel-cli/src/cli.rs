use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Sentinel: facility entry/exit sessions with tamper-evident audit",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at DEBUG, including every pipeline stage transition
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the default configuration as TOML
    Config(ConfigArgs),
    /// Show the photo hash and content ids of an image file
    Hash(HashArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Additional facility PINs
    #[arg(long = "facility")]
    pub facilities: Vec<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
}
