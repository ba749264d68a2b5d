//! Coverreel CLI: turn audio into MP4 videos over a stored cover image.
//!
//! Usage:
//!   coverreel image set <PATH>        Store the cover image
//!   coverreel image show              Show the stored cover image
//!   coverreel image delete            Delete the stored cover image
//!   coverreel produce --audio <PATH>  Render a video with the stored cover
//!   coverreel bundle <DIR>            Render cover.* + audio.* from a directory
//!   coverreel status                  Show session state
//!   coverreel check                   Check engine availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use coverreel_common::config::{config_file_path, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "coverreel",
    about = "Combine a stored cover image with audio into an MP4 video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/coverreel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Config file in effect for this invocation.
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored cover image
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// Render a video from the stored cover and an audio file
    Produce {
        /// Audio file to use
        #[arg(short, long)]
        audio: PathBuf,

        /// Directory to write the video into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Discover cover.* and audio.* in a directory and render them
    Bundle {
        /// Directory holding cover.<image ext> and audio.<audio ext>
        dir: PathBuf,

        /// Output file path (defaults to a generated name inside DIR)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show stored image, store location, and engine availability
    Status,

    /// Check that the transcoding engine can be started
    Check,
}

#[derive(Subcommand)]
enum ImageAction {
    /// Store an image as the cover, replacing any previous one
    Set {
        /// Image file
        path: PathBuf,
    },

    /// Show the stored cover image
    Show {
        /// Write the stored bytes to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Delete the stored cover image
    Delete,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_required(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    coverreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Image { action } => match action {
            ImageAction::Set { path } => commands::image::set(&config, path).await,
            ImageAction::Show { export } => commands::image::show(&config, export).await,
            ImageAction::Delete => commands::image::delete(&config).await,
        },
        Commands::Produce { audio, output_dir } => {
            commands::produce::run(&config, audio, output_dir).await
        }
        Commands::Bundle { dir, output } => commands::bundle::run(&config, dir, output).await,
        Commands::Status => commands::status::run(&config, &config_path).await,
        Commands::Check => commands::check::run(&config).await,
    }
}
