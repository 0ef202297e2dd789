use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and rewrite legacy binary PowerPoint documents.
///
/// A document is a directory with one file per stream:
/// "PowerPoint Document", "Current User" and (optionally) "Pictures".
#[derive(Parser, Debug)]
#[command(name = "pptstore", version, about = "Legacy PowerPoint record engine CLI")]
pub struct Cli {
    /// Document password (falls back to PPT_PASSWORD, then the format default)
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create a minimal empty document
    Init {
        #[arg(long)]
        path: PathBuf,
    },
    /// Print the top-level record tree
    Dump {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// Stop descending below this depth (0 = top level only)
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Revision chain and resolved persist ids
    Persist {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Picture blobs and their blip store descriptors
    Pictures {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        json: bool,
        /// Write every decoded image into this directory
        #[arg(long)]
        extract: Option<PathBuf>,
    },
    /// Load and write back (offsets and references rewritten)
    Resave {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Collapse the revision history into a single save state
        #[arg(long)]
        normalize: bool,
    },
    /// Write an encrypted copy (or re-key an encrypted one)
    Encrypt {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        new_password: String,
    },
    /// Write a decrypted copy
    Decrypt {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}
