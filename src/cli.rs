// src/cli.rs
//! CLI definitions for walletpass
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use walletpass::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "walletpass")]
#[command(author = "Walletpass Contributors")]
#[command(version)]
#[command(about = "Assemble, sign and verify wallet pass packages", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a single package without touching pass state
    Generate {
        /// Card holder name
        #[arg(short, long, default_value = "Customer")]
        name: String,

        /// Serial number (generated when omitted)
        #[arg(short, long)]
        serial: Option<String>,

        /// Balance shown on the card
        #[arg(short, long, default_value_t = 0.0)]
        balance: f64,

        /// Authentication token embedded in the pass (generated when omitted)
        #[arg(long)]
        token: Option<String>,

        /// Output file (default: <serial>.pkpass)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Issue a new pass and record it in the state store
    Issue {
        /// Card holder name
        #[arg(default_value = "Customer")]
        name: String,

        /// Output file (default: <serial>.pkpass)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Register a device for updates to a pass
    Register {
        /// Pass serial number
        serial: String,

        /// Device library identifier
        device: String,

        /// Push token for the device
        push_token: String,

        /// Authentication token, bare or as `ApplePass <token>`
        #[arg(short, long)]
        auth: String,
    },

    /// Fetch the latest version of a pass
    Fetch {
        /// Pass serial number
        serial: String,

        /// Authentication token, bare or as `ApplePass <token>`
        #[arg(short, long)]
        auth: String,

        /// Only fetch if changed since this HTTP date
        #[arg(long)]
        if_modified_since: Option<String>,

        /// Output file (default: <serial>.pkpass)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Set the balance shown on a pass
    Balance {
        /// Pass serial number
        serial: String,

        /// New balance
        balance: f64,
    },

    /// List the entries of a package
    Inspect {
        /// Package file
        package: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify manifest digests and the signature of a package
    Verify {
        /// Package file
        package: PathBuf,

        /// PEM public key, certificate or private key for raw signatures
        #[arg(long)]
        public_key: Option<PathBuf>,

        /// Require the detached signer to be this PEM certificate
        #[arg(long)]
        certificate: Option<PathBuf>,

        /// Expected signature form (detached or raw); detected when omitted
        #[arg(long)]
        mode: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
