//! Command execution.

use crate::{Commands, Credentials};
use bankd_client::Client;
use bankd_storage::account::{hashed_pin_secret, mask_card_number};
use bankd_storage::{AccountStore, LocalStore};
use colored::Colorize;
use std::path::Path;

/// Executes a teller command against the server and returns the formatted output.
pub async fn execute_remote(
    client: &mut Client,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Welcome { lang } => Ok(client.welcome_message(&lang).await?),

        Commands::Balance { credentials } => {
            login(client, &credentials).await?;
            let balance = client.balance().await?;
            Ok(format!("{} {}", "Balance:".bold(), balance.to_string().cyan()))
        }

        Commands::Withdraw {
            credentials,
            code,
            amount,
        } => {
            login(client, &credentials).await?;
            client.withdraw(&code, amount).await?;
            let balance = client.balance().await?;
            Ok(format!(
                "{} {} (balance: {})",
                "Withdrew".green(),
                amount,
                balance.to_string().cyan()
            ))
        }

        Commands::Deposit {
            credentials,
            amount,
        } => {
            login(client, &credentials).await?;
            client.deposit(amount).await?;
            let balance = client.balance().await?;
            Ok(format!(
                "{} {} (balance: {})",
                "Deposited".green(),
                amount,
                balance.to_string().cyan()
            ))
        }

        _ => Err("not a server command".into()),
    }
}

async fn login(
    client: &mut Client,
    credentials: &Credentials,
) -> Result<(), Box<dyn std::error::Error>> {
    client.login(&credentials.card, &credentials.pin).await?;
    tracing::debug!("Logged in as {}", mask_card_number(&credentials.card));
    Ok(())
}

/// Executes an admin command against a store file and returns the formatted output.
pub fn execute_admin(
    store_path: &Path,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::HashPin { pin } => Ok(hashed_pin_secret(&pin)),

        Commands::AddAccount {
            card,
            pin,
            balance,
            hash,
        } => {
            let store = LocalStore::open(store_path)?;
            let secret = if hash { hashed_pin_secret(&pin) } else { pin };
            let id = store.create_account(&card, &secret, balance)?;
            Ok(format!(
                "{} account {} for card {} (balance: {})",
                "Created".green(),
                id.to_string().cyan(),
                mask_card_number(&card),
                balance
            ))
        }

        Commands::AddCode { card, code } => {
            let store = LocalStore::open(store_path)?;
            let id = store
                .find_account_by_card_number(&card)?
                .ok_or_else(|| format!("no account for card {}", mask_card_number(&card)))?;
            store.issue_one_time_code(id, &code)?;
            Ok(format!(
                "{} code for account {}",
                "Issued".green(),
                id.to_string().cyan()
            ))
        }

        Commands::ListAccounts => {
            let store = LocalStore::open(store_path)?;
            let accounts = store.accounts();
            if accounts.is_empty() {
                return Ok("No accounts".yellow().to_string());
            }

            let mut output = format!(
                "{}\n",
                format!("{:<6} {:<20} {:>14} {:>6}", "ID", "CARD", "BALANCE", "CODES").bold()
            );
            for account in accounts {
                output.push_str(&format!(
                    "{:<6} {:<20} {:>14} {:>6}\n",
                    account.id,
                    mask_card_number(&account.card_number),
                    account.balance,
                    store.code_count(account.id)
                ));
            }
            Ok(output.trim_end().to_string())
        }

        _ => Err("not an admin command".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_pin_matches_server_secret() {
        colored::control::set_override(false);
        let output = execute_admin(
            Path::new("unused.json"),
            Commands::HashPin {
                pin: "4242".to_string(),
            },
        )
        .unwrap();
        assert_eq!(output, hashed_pin_secret("4242"));
    }

    #[test]
    fn test_admin_commands() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");

        let output = execute_admin(
            &path,
            Commands::AddAccount {
                card: "1111222233334444".to_string(),
                pin: "4242".to_string(),
                balance: 1000,
                hash: true,
            },
        )
        .unwrap();
        assert!(output.contains("************4444"));
        assert!(!output.contains("1111222233334444"));

        execute_admin(
            &path,
            Commands::AddCode {
                card: "1111222233334444".to_string(),
                code: "9999".to_string(),
            },
        )
        .unwrap();

        {
            let store = LocalStore::open(&path).unwrap();
            let id = store
                .find_account_by_card_number("1111222233334444")
                .unwrap()
                .unwrap();
            assert_eq!(store.code_count(id), 1);
            assert_eq!(
                store.get_pin(id).unwrap().unwrap(),
                hashed_pin_secret("4242")
            );

            // A running server holds the store; admin writes are refused
            let err = execute_admin(
                &path,
                Commands::AddCode {
                    card: "1111222233334444".to_string(),
                    code: "1234".to_string(),
                },
            )
            .unwrap_err();
            assert!(err.to_string().contains("locked"));
        }

        let listing = execute_admin(&path, Commands::ListAccounts).unwrap();
        assert!(listing.contains("************4444"));
        assert!(listing.contains("1000"));
    }

    #[test]
    fn test_add_code_unknown_card() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");

        let err = execute_admin(
            &path,
            Commands::AddCode {
                card: "0000".to_string(),
                code: "1".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("no account"));
    }
}
