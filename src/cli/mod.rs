//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "diagsearch",
    version,
    about = "Diagnostic detector search engine",
    long_about = "Serves natural-language queries against per-tenant corpora of diagnostic \
                  detectors. Trained model packages are pulled from a durable store, verified, \
                  and hot-swapped per tenant while queries keep being served."
)]
pub struct Cli {
    /// Config file path (defaults to built-in defaults plus environment overrides)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank detectors for a tenant against a query
    Query {
        /// Tenant (product) id
        tenant: String,

        /// Natural-language query text
        text: String,
    },

    /// Suggest sample utterances for a detector description
    Utterances {
        /// Tenant (product) id
        tenant: String,

        /// Detector description text
        description: String,

        /// Utterances the detector already has (repeatable)
        #[arg(short, long = "existing")]
        existing: Vec<String>,
    },

    /// Refresh a tenant to the latest trained model version
    Refresh {
        /// Tenant (product) id
        tenant: String,
    },

    /// Drop a tenant's model from memory
    Evict {
        /// Tenant (product) id
        tenant: String,
    },

    /// Run the model sync watcher in the foreground
    Watch,

    /// Show lifecycle status of loaded tenants
    Status,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
