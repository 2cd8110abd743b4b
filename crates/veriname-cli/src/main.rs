//! veriname - verified directory client.
//!
//! Thin command-line front-end over `veriname-client`: look names up with
//! consensus verification, register and modify them, and run two-party
//! ownership transfers via proposal files.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// veriname - verified directory client
#[derive(Parser, Debug)]
#[command(name = "veriname")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the client configuration file (JSON)
    #[arg(short, long, default_value = "veriname.json")]
    config: PathBuf,

    /// Log filter (e.g. `info`, `veriname_client=debug`)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look a name up and print its verified profile
    Lookup {
        /// Name to resolve
        name: String,
    },

    /// Generate a signing keypair file (0600) and print its public key
    Keygen {
        /// Where to write the 64-byte keypair
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Register a new name (requires an invite)
    Register {
        /// Name to claim
        name: String,

        /// Path to the holder's 64-byte signing keypair
        #[arg(short, long)]
        key: PathBuf,

        /// Invite token, base64
        #[arg(short, long)]
        invite: Option<String>,

        /// Profile lifetime in days
        #[arg(long, default_value = "360")]
        expire_days: u64,
    },

    /// Re-sign a held name with a bumped version and fresh expiration
    Modify {
        /// Name to refresh
        name: String,

        /// Path to the holder's 64-byte signing keypair
        #[arg(short, long)]
        key: PathBuf,

        /// Profile lifetime in days
        #[arg(long, default_value = "360")]
        expire_days: u64,
    },

    /// Two-party ownership transfer
    #[command(subcommand)]
    Transfer(TransferCommands),
}

#[derive(Subcommand, Debug)]
enum TransferCommands {
    /// Propose handing a name to a new holder; writes a proposal file
    Propose {
        /// Name to hand over
        name: String,

        /// Path to the current holder's signing keypair
        #[arg(short, long)]
        key: PathBuf,

        /// Recipient's public key: base64 of the encoded key message
        #[arg(short, long)]
        recipient: String,

        /// Where to write the signed proposal
        #[arg(short, long)]
        out: PathBuf,

        /// Profile lifetime in days
        #[arg(long, default_value = "360")]
        expire_days: u64,
    },

    /// Accept a proposal file with the recipient's key
    Accept {
        /// Path to the recipient's signing keypair
        #[arg(short, long)]
        key: PathBuf,

        /// Proposal file written by `transfer propose`
        #[arg(short, long)]
        proposal: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Lookup { name } => runtime.block_on(commands::lookup(&cli.config, &name)),
        Commands::Keygen { out } => commands::keygen(&out),
        Commands::Register {
            name,
            key,
            invite,
            expire_days,
        } => runtime.block_on(commands::register(
            &cli.config,
            &name,
            &key,
            invite.as_deref(),
            expire_days,
        )),
        Commands::Modify {
            name,
            key,
            expire_days,
        } => runtime.block_on(commands::modify(&cli.config, &name, &key, expire_days)),
        Commands::Transfer(TransferCommands::Propose {
            name,
            key,
            recipient,
            out,
            expire_days,
        }) => runtime.block_on(commands::transfer_propose(
            &cli.config,
            &name,
            &key,
            &recipient,
            &out,
            expire_days,
        )),
        Commands::Transfer(TransferCommands::Accept { key, proposal }) => {
            runtime.block_on(commands::transfer_accept(&cli.config, &key, &proposal))
        }
    }
}
