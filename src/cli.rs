//! Command-line interface implementation for sitegen.
//! Provides argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::RunConfiguration;
use crate::constants::{STAGING_DIR, TRANSFER_COMMAND};

/// Command-line arguments structure for sitegen.
#[derive(Parser, Debug)]
#[command(author, version, about = "sitegen: wrap, stage and deploy a localized static site", long_about = None)]
pub struct Args {
    /// Where the staging tree is transferred to (local path or remote target)
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable the analytics snippet in the layout
    #[arg(short, long)]
    pub analytics: bool,

    /// Rewrite the deploy configuration for the remote host
    #[arg(short, long, requires = "http_base")]
    pub remote: bool,

    /// Base path written into the deploy configuration's RewriteBase
    #[arg(long, value_name = "URL")]
    pub http_base: Option<String>,

    /// Transfer command; the staging directory and destination are appended
    #[arg(short, long, value_name = "CMD", default_value = TRANSFER_COMMAND)]
    pub transfer: String,

    /// Staging directory, rebuilt on every run
    #[arg(long, value_name = "DIR", default_value = STAGING_DIR)]
    pub staging: PathBuf,

    /// Directory holding the source pages
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub source: PathBuf,

    /// Layout template, overriding the site configuration
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,
}

impl Args {
    /// Settings for the runner.
    pub fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration {
            analytics: self.analytics,
            verbose: self.verbose,
            remote_base: self.http_base.clone(),
            destination: self.destination.clone(),
            remote: self.remote,
            transfer_command: self.transfer.clone(),
            staging_dir: self.staging.clone(),
            source_dir: self.source.clone(),
        }
    }
}

/// Parses command line arguments and returns the Args structure.
pub fn get_args() -> Args {
    Args::parse()
}
