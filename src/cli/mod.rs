//! CLI module for the embedding sync tool.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Embedding sync CLI for member match records.
#[derive(Debug, Parser)]
#[command(name = "matchsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Backfill embeddings for records that have identity text but no vector
    Sync(commands::SyncArgs),

    /// Check record store and embedding API status
    Status,

    /// Find the nearest match candidates for a record
    Match(commands::MatchArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
