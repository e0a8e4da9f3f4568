use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a migration for the selected entity groups
    Migrate {
        #[arg(long, help = "JSON file with the run id, profile and entity groups")]
        selection: PathBuf,

        #[arg(long, env = "SHOPSHIFT_CONFIG", help = "Settings file path")]
        config: Option<PathBuf>,

        #[arg(long, help = "Load additional SHOPSHIFT_* variables from a .env file")]
        env_file: Option<PathBuf>,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Print the effective settings after file and environment overrides
    Settings {
        #[arg(long, env = "SHOPSHIFT_CONFIG", help = "Settings file path")]
        config: Option<PathBuf>,

        #[arg(long, help = "Load additional SHOPSHIFT_* variables from a .env file")]
        env_file: Option<PathBuf>,
    },
}
