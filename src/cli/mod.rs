//! CLI interface for pairvault.
//!
//! Provides command-line argument parsing using clap.

use clap::{Parser, Subcommand, ValueEnum};

use crate::store::ComparisonStatus;

/// Review status values accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Status {
    /// Code and render content were judged equivalent.
    Equal,
    /// Code and render content diverge.
    Different,
    /// Not reviewed yet (the state every import starts in).
    NotCompared,
}

impl From<Status> for ComparisonStatus {
    fn from(value: Status) -> Self {
        match value {
            Status::Equal => Self::Equal,
            Status::Different => Self::Different,
            Status::NotCompared => Self::NotCompared,
        }
    }
}

/// Command-line interface for pairvault.
#[derive(Parser)]
#[command(name = "pairvault")]
#[command(author, version, about = "Review store for paired code/render artifacts", long_about = None)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Import a ZIP archive of paired artifacts, replacing all stored data.
    Import {
        /// Path to the .zip archive.
        archive: std::path::PathBuf,
    },

    /// List every imported artifact set with its status and comment.
    List,

    /// Print the stored code for one artifact set.
    Show {
        /// Base identifier of the artifact set.
        base: String,

        /// Print the render content instead of the code.
        #[arg(short, long)]
        render: bool,
    },

    /// Set the review status of one artifact set.
    Mark {
        /// Base identifier of the artifact set.
        base: String,

        /// The new review status.
        status: Status,
    },

    /// Set the reviewer comment of one artifact set.
    Comment {
        /// Base identifier of the artifact set.
        base: String,

        /// Comment text; an empty string clears the comment.
        text: String,
    },

    /// Delete all stored data and recreate the empty store.
    Reset,
}
