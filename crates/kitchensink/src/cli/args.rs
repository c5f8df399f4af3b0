pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kitchensink")]
#[command(about = "Populate, verify and purge an integrity-checked dataset in S3-compatible storage")]
pub struct Args {
    /// Default log level; RUST_LOG directives take precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    /// Directory for daily rotated log files (stderr only if not set)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to a TOML config file with [dataset] and [storage] settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
