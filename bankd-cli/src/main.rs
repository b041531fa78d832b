//! bankd-cli - Command-line interface for bankd
//!
//! One-shot teller commands against a running server, plus admin commands
//! that edit a store file directly.

mod commands;

use bankd_client::{Client, ConnectionConfig};
use bankd_protocol::WireMode;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bankd-cli")]
#[command(about = "Command-line interface for the bankd teller server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1337", env = "BANKD_SERVER")]
    server: SocketAddr,

    /// Wire mode (padded or length_prefixed), must match the server
    #[arg(short, long, default_value = "padded", env = "BANKD_WIRE_MODE")]
    wire_mode: WireMode,

    /// Seconds to wait for each server message
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Store file for admin commands
    #[arg(short, long, default_value = "./data/accounts.json", env = "BANKD_STORE")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Card credentials used to log in before a teller command.
#[derive(Args, Clone)]
pub struct Credentials {
    /// Card number
    #[arg(short, long, env = "BANKD_CARD")]
    pub card: String,

    /// PIN
    #[arg(short, long, env = "BANKD_PIN", hide_env_values = true)]
    pub pin: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the welcome message
    Welcome {
        /// Language code
        #[arg(short, long, default_value = "en")]
        lang: String,
    },

    /// Show the account balance
    Balance {
        #[command(flatten)]
        credentials: Credentials,
    },

    /// Withdraw money with a one-time code
    Withdraw {
        #[command(flatten)]
        credentials: Credentials,

        /// One-time authorization code
        #[arg(long)]
        code: String,

        /// Amount to withdraw
        amount: i64,
    },

    /// Deposit money
    Deposit {
        #[command(flatten)]
        credentials: Credentials,

        /// Amount to deposit
        amount: i64,
    },

    /// Create an account in the store file
    AddAccount {
        /// Card number
        card: String,

        /// PIN
        pin: String,

        /// Opening balance
        #[arg(short, long, default_value = "0")]
        balance: i64,

        /// Store the PIN as a SHA-256 hash
        #[arg(long)]
        hash: bool,
    },

    /// Issue a one-time withdrawal code for an account
    AddCode {
        /// Card number of the account
        card: String,

        /// Code value
        code: String,
    },

    /// List accounts in the store file
    ListAccounts,

    /// Generate a hashed PIN secret for the store file
    HashPin {
        /// The PIN to hash
        pin: String,
    },
}

impl Commands {
    fn is_remote(&self) -> bool {
        matches!(
            self,
            Commands::Welcome { .. }
                | Commands::Balance { .. }
                | Commands::Withdraw { .. }
                | Commands::Deposit { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = if cli.command.is_remote() {
        let config = ConnectionConfig::new(cli.server)
            .with_wire_mode(cli.wire_mode)
            .with_request_timeout(Duration::from_secs(cli.timeout));
        let mut client = Client::new(config);

        client.connect().await.map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;

        let result = commands::execute_remote(&mut client, cli.command).await;
        client.close().await?;
        result
    } else {
        commands::execute_admin(&cli.data, cli.command)
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
