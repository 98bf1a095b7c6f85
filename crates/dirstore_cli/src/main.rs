//! dirstore CLI
//!
//! Offline inspection of a dirstore backend directory. The backend must not
//! be in use by another process while a command runs.
//!
//! # Commands
//!
//! - `list-trees` - List every tree in the volume with its record count
//! - `dump-tree` - Dump the keys and values of one tree
//! - `list-base-dns` - Show suffixes with their tree prefixes and entry counts
//! - `get-entry` - Print one stored entry

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dirstore backend inspection tools.
#[derive(Parser)]
#[command(name = "dirstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the backend directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tree with its record count
    ListTrees {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump the records of one tree in key order
    DumpTree {
        /// Tree name, e.g. dcexampledccom_dn2id
        #[arg(short, long)]
        tree: String,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List base DNs with their tree prefixes and entry counts
    ListBaseDns {
        /// Base DN served by the backend (repeatable)
        #[arg(short, long = "base-dn", required = true)]
        base_dn: Vec<String>,
    },

    /// Print the entry stored for a DN
    GetEntry {
        /// Base DN served by the backend (repeatable)
        #[arg(short, long = "base-dn", required = true)]
        base_dn: Vec<String>,

        /// DN of the entry
        dn: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.path.ok_or("backend path required (--path)")?;
    match cli.command {
        Commands::ListTrees { format } => {
            commands::list_trees::run(&path, &format)?;
        }
        Commands::DumpTree { tree, limit } => {
            commands::dump_tree::run(&path, &tree, limit)?;
        }
        Commands::ListBaseDns { base_dn } => {
            commands::list_base_dns::run(&path, &base_dn)?;
        }
        Commands::GetEntry { base_dn, dn } => {
            commands::get_entry::run(&path, &base_dn, &dn)?;
        }
    }

    Ok(())
}
