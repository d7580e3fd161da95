use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wdk-bridge")]
#[command(version)]
#[command(about = "Run or call a framed JSON-RPC wallet worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a worker without a wallet library (crypto methods only)
    Serve(ServeArgs),

    /// Send one call to a worker and print the result
    Call(CallArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen on this Unix domain socket
    #[arg(long, env = "WDK_BRIDGE_SOCKET", conflicts_with = "stdio")]
    pub socket: Option<PathBuf>,

    /// Serve frames on stdin/stdout instead of a socket
    #[arg(long)]
    pub stdio: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct CallArgs {
    /// Method name, e.g. `ping` or `splitSecret`
    pub method: String,

    /// Parameters as a JSON object
    #[arg(long, short)]
    pub params: Option<String>,

    /// Worker socket to connect to
    #[arg(long, env = "WDK_BRIDGE_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Transport tuning shared by both subcommands
#[derive(Args)]
pub struct CommonArgs {
    /// Largest frame payload in bytes (at most 10000000)
    #[arg(long)]
    pub max_frame_len: Option<usize>,

    /// Bytes requested per transport read
    #[arg(long)]
    pub read_chunk_size: Option<usize>,

    /// Calls allowed in flight before new ones are refused
    #[arg(long)]
    pub max_pending_calls: Option<usize>,
}
