//! CLI for the Outpost host tools.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use outpost_core::config;
use std::path::PathBuf;

use commands::{run_fetch, run_listen, run_refresh};

/// Top-level CLI for the Outpost host tools.
#[derive(Debug, Parser)]
#[command(name = "outpost")]
#[command(about = "Outpost: outbound I/O tools for the plugin host", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch one URL through the job queue and print or save the body.
    Fetch {
        /// HTTP/HTTPS URL to fetch.
        url: String,

        /// Write the body to this file instead of stdout.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Submit as a POST with this body instead of a GET.
        #[arg(long, value_name = "DATA")]
        post: Option<String>,
    },

    /// Refresh ban lists from the configured sources, in order.
    Refresh {
        /// Source URLs; overrides `ban_lists` from the config file.
        urls: Vec<String>,
    },

    /// Accept raw peer connections and serve each a file through the
    /// outbound queue, disconnecting once it drains.
    Listen {
        /// File whose contents are sent to each peer.
        #[arg(value_name = "FILE")]
        banner: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value = "4747")]
        port: u16,

        /// Minimum milliseconds between chunk sends per peer.
        #[arg(long, default_value = "0", value_name = "MS")]
        throttle_ms: u64,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch { url, output, post } => {
                run_fetch(&cfg, &url, post.as_deref(), output.as_deref())?
            }
            CliCommand::Refresh { urls } => run_refresh(&cfg, urls)?,
            CliCommand::Listen { banner, port, throttle_ms } => {
                run_listen(&cfg, &banner, port, throttle_ms)?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
