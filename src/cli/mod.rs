//! Command-line interface.

mod commands;
mod icons;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, resolve_path, LoadOptions};

#[derive(Parser)]
#[command(name = "emigrant")]
#[command(about = "Emigrant City mortgage record pipeline: download, enrich, transform")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the step directories (overrides config file)
    #[arg(long = "data-dir", short = 't', global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Geocoder endpoint used by the enrich step
    #[arg(long, global = true)]
    geocoder_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run download, enrich and transform in order
    Run {
        /// Read a local .tar or .tar.gz archive instead of fetching one
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Fetch the record archive and unpack it into the download store
    Download {
        /// Read a local .tar or .tar.gz archive instead of fetching one
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Normalize fields and geocode addresses of downloaded records
    Enrich,

    /// Emit documents, relations and logs from enriched records
    Transform,

    /// Print the resolved settings
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (mut settings, _config) = load_settings_with_options(options).await?;

    // CLI flags take precedence over config and environment
    if let Some(ref data_dir) = cli.data_dir {
        let cwd = std::env::current_dir()?;
        settings.set_data_dir(resolve_path(&data_dir.to_string_lossy(), &cwd));
    }
    if let Some(url) = cli.geocoder_url {
        settings.geocoder_url = Some(url);
    }

    match cli.command {
        Commands::Run { archive } => commands::cmd_run(&settings, archive.as_deref()).await,
        Commands::Download { archive } => {
            commands::cmd_download(&settings, archive.as_deref()).await
        }
        Commands::Enrich => commands::cmd_enrich(&settings).await,
        Commands::Transform => commands::cmd_transform(&settings).await,
        Commands::Config => commands::cmd_config(&settings),
    }
}
