//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Preview a video in the terminal and export a time range of its audio as MP3
#[derive(Parser)]
#[command(name = "clipmp3")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "Preview a video in the terminal and export a time range of its audio as MP3.\n\nDEFAULT COMMAND:\n    If no command is specified, the interactive converter opens.\n    A video file and an output folder can be given directly.\n\nEXAMPLES:\n    # Open the converter\n    $ clipmp3\n\n    # Open the converter with a video and output folder preselected\n    $ clipmp3 movie.mp4 -o ~/Music\n\n    # Export 1:05 to 1:35 without the UI\n    $ clipmp3 export movie.mp4 --start 1:05 --end 1:35 -o ~/Music -n theme\n\n    # Show duration and size of a video\n    $ clipmp3 probe movie.mp4\n\n    # Edit configuration file\n    $ clipmp3 config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/clipmp3/clipmp3.toml\n    Remembered folders: ~/.local/share/clipmp3/settings.toml\n    Logs:               ~/.local/state/clipmp3/clipmp3.log.*\n\nRequires ffmpeg, ffprobe and (for preview) ffplay on the PATH."
)]
struct Cli {
    /// Video file to open (convert default command)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output folder (convert default command)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive converter (default)
    ///
    /// f selects a video, o an output folder, space plays the preview,
    /// s/e edit the range, [ and ] mark it at the playhead, x exports.
    #[command(visible_alias = "c")]
    Convert {
        /// Video file to open
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output folder
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Export a time range of a video's audio without the UI
    ///
    /// Times accept mm:ss.zzz, hh:mm:ss.zzz or plain seconds.
    ///
    /// Examples:
    ///   clipmp3 export movie.mp4 --start 0:30 --end 1:00
    ///   clipmp3 export movie.mp4 --end 95.5 -o ~/Music -n intro
    #[command(visible_alias = "e")]
    Export {
        /// Video file to read
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Range start (default 0)
        #[arg(short, long, value_name = "TIME")]
        start: Option<String>,

        /// Range end (default: duration minus the configured tail trim)
        #[arg(short, long, value_name = "TIME")]
        end: Option<String>,

        /// Output folder (default: last used folder, else current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Output file name, .mp3 is appended when missing
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Print duration and size of a video file
    Probe {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   clipmp3 completions bash > clipmp3.bash
    ///   clipmp3 completions zsh > _clipmp3
    ///   clipmp3 completions fish > clipmp3.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "clipmp3", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;
    tracing::info!("clipmp3 {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => commands::handle_convert(cli.file, cli.output).await?,
        Some(Commands::Convert { file, output }) => commands::handle_convert(file, output).await?,
        Some(Commands::Export {
            file,
            start,
            end,
            output,
            name,
        }) => {
            if let Err(e) = commands::handle_export(file, start, end, output, name).await {
                tracing::error!("Export command failed: {}", e);
                return Err(e);
            }
        }
        Some(Commands::Probe { file }) => commands::handle_probe(&file)?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
