use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "ecsnav",
    version,
    about = "A terminal browser for Amazon ECS clusters, services, tasks and containers."
)]
pub struct CliArgs {
    /// Refuse service updates, task stops, registrations and exec sessions
    #[arg(long)]
    pub read_only: bool,

    /// Auto-refresh interval in seconds (0 or less disables it)
    #[arg(long, allow_negative_numbers = true)]
    pub refresh: Option<i64>,

    /// Shell started by ECS Exec
    #[arg(long)]
    pub shell: Option<String>,

    /// AWS profile passed to the aws CLI
    #[arg(short, long)]
    pub profile: Option<String>,

    /// AWS region passed to the aws CLI
    #[arg(short, long)]
    pub region: Option<String>,

    /// Open this cluster right after start
    #[arg(short, long)]
    pub cluster: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Configuration file to load instead of the discovered one
    #[arg(long)]
    pub config: Option<PathBuf>,
}
