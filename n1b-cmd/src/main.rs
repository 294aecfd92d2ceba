mod command_bulletin;
mod command_dump;
mod command_info;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use n1b::Channel;

/// Tool for inspecting NOAA AVHRR Level 1B (N1B) files and SATPOS orbit
/// bulletins.
///
/// The AJ, AJ-Canaries and KLM format generations are detected
/// automatically from the file's leading bytes.
#[derive(Parser)]
#[command(version, about, long_about, disable_help_subcommand = true)]
struct Cli {
    /// Logging level filters, e.g., debug, info, warn, etc ...
    #[arg(short, long, default_value = "info")]
    logging: String,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate JSON containing the acquisition metadata.
    Info {
        /// N1B file to inspect
        #[arg(value_name = "path")]
        input: PathBuf,
    },
    /// Extract one channel's samples to a flat big-endian 16-bit file.
    Dump {
        /// N1B file to extract from
        #[arg(value_name = "path")]
        input: PathBuf,

        /// Channel to extract; one of 1, 2, 3, 3A, 3B, 4, 5 depending on
        /// the format generation.
        #[arg(short, long, default_value = "1")]
        channel: Channel,

        /// Output file. Defaults to the input name with a .chN.raw suffix.
        #[arg(short, long, value_name = "path")]
        output: Option<PathBuf>,
    },
    /// Show an orbit bulletin's header fields and record count.
    Bulletin {
        /// SATPOS bulletin file
        #[arg(value_name = "path")]
        input: PathBuf,

        /// Also interpolate the satellite position at this UTC timestamp,
        /// e.g. 2001-06-01T11:00:00Z.
        #[arg(short, long, value_name = "timestamp")]
        at: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(EnvFilter::new(cli.logging))
        .init();

    match cli.commands {
        Commands::Info { input } => {
            crate::command_info::info(input)?;
        }
        Commands::Dump {
            input,
            channel,
            output,
        } => {
            crate::command_dump::dump(input, channel, output)?;
        }
        Commands::Bulletin { input, at } => {
            crate::command_bulletin::bulletin(input, at)?;
        }
    }

    Ok(())
}
