use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliOpts {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "itsd.toml")]
    pub config: String,

    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}
