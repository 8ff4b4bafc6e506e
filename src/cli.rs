// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::JobOptions;

/// Command-line arguments for `dlqueue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dlqueue",
    version,
    about = "Download a queue of media URLs one at a time with yt-dlp.",
    long_about = None
)]
pub struct CliArgs {
    /// URLs to download, in order.
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Dlqueue.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read more URLs from a file: one per line, `#` starts a comment.
    #[arg(short = 'i', long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output preset for every URL (e.g. `mp4`, `mp3`).
    #[arg(long, value_name = "NAME", default_value = "")]
    pub preset: String,

    /// Download whole playlists instead of single videos.
    #[arg(long)]
    pub playlist: bool,

    /// Also fetch subtitles.
    #[arg(long)]
    pub subtitles: bool,

    /// Override `[download].output_dir`.
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Do not look up titles in the background.
    #[arg(long)]
    pub no_titles: bool,

    /// Print the command for every job, but don't download anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DLQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Options applied to every job from this invocation.
    pub fn job_options(&self) -> JobOptions {
        JobOptions::new(self.preset.trim(), self.playlist, self.subtitles)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
