use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "wharf",
    version,
    about = "A keyboard-driven terminal dashboard for a local Docker engine."
)]
pub struct CliArgs {
    /// Refresh interval in milliseconds (minimum 500)
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Number of log lines fetched when opening container logs
    #[arg(long)]
    pub tail: Option<usize>,

    /// Docker CLI binary to invoke
    #[arg(long)]
    pub docker_bin: Option<String>,

    /// Engine endpoint passed to the CLI as -H (for example unix:///var/run/docker.sock)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Config file path (overrides WHARF_CONFIG and the default search)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
