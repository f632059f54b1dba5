use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Default, Parser, Serialize)]
#[command(about = "Scrapes the in-world playtime leaderboard and serves it")]
pub struct Cli {
    /// YAML settings file, merged below environment variables
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,
    /// Recorded world feed to replay instead of a live connection
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_capture: Option<PathBuf>,
    /// Overrides TRACE_LEVEL
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_level: Option<String>,
}
