use cachewire_core::LogFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cachewire",
    version,
    about = "Cache handle broker: per-origin named caches over a request/response protocol"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve newline-delimited JSON envelopes on stdin, answer on stdout
    Serve(ServeArgs),
    /// Load, validate and print the resolved configuration
    CheckConfig(ConfigArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// YAML config file (falls back to CACHEWIRE_* environment variables)
    #[arg(long, env = "CACHEWIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Client scope URL; the broker serves its origin
    #[arg(long)]
    pub scope: Option<String>,

    /// Cache names to create before serving (comma-separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub preload: Vec<String>,

    #[arg(long)]
    pub inbound_capacity: Option<usize>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
