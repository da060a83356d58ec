//! Command-line argument definitions for the Diagrammer CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. The `handle` subcommand plays the inbound transport for a
//! single request; `check` validates a source file and reports diagnostics.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Diagrammer tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace). Falls back to
    /// `LOG_LEVEL`, then `info`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handle one request body and print the response
    Handle {
        /// Route the request arrives on (diagram, erd, json)
        #[arg(short, long, default_value = "diagram")]
        route: String,

        /// File holding the request body; reads stdin when omitted or `-`
        body: Option<String>,

        /// Treat the input as a transport event `{"body": "..."}`
        #[arg(long)]
        event: bool,

        /// Root directory of the local object store
        #[arg(long)]
        store_root: Option<String>,
    },

    /// Evaluate a source file without rendering or publishing
    Check {
        /// Diagram family (aws, gcp, azure, onprem, erd, json)
        #[arg(short = 't', long = "type")]
        family: String,

        /// Path to the source file
        input: String,
    },
}
