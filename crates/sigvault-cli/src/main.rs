//! SigVault CLI: manage the encrypted signing key and sign transactions
//!
//! # Usage
//!
//! ```bash
//! sigvault import --file ~/.config/solana/id.json
//! SIGVAULT_PASSWORD=... sigvault sign AQAAAA... --tx-type BUY --token-mint <mint> --amount 0.5
//! sigvault status
//! ```
//!
//! Secrets and passwords are never taken from argv. Passwords come from
//! `SIGVAULT_PASSWORD` / `SIGVAULT_NEW_PASSWORD` or, one per line, from stdin.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use sigvault_core::{
    parse_secret, prepare_submission, public_key_of, FileStore, SignedSubmission, TxMetadata,
    TxType, UnsignedTxEnvelope, Vault,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "SIGVAULT_PASSWORD";
const NEW_PASSWORD_ENV: &str = "SIGVAULT_NEW_PASSWORD";

#[derive(Parser)]
#[command(name = "sigvault")]
#[command(about = "Encrypted signing-key vault and transaction signer")]
#[command(version)]
struct Cli {
    /// Config file path (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show where the vault lives and whether a secret is stored
    Status,

    /// Encrypt and store a secret key (JSON array, hex or base58)
    Import {
        /// Read the secret from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Replace an already stored secret
        #[arg(long)]
        force: bool,
    },

    /// Print the base58 public key of the stored secret
    Pubkey,

    /// Sign a base64 transaction and print the submission JSON
    Sign {
        /// Base64 transaction, an `{"unsigned_tx": ...}` envelope, or `-` for stdin
        tx: String,

        #[arg(long, default_value = "SWAP")]
        tx_type: TxType,

        #[arg(long, default_value = "")]
        token_mint: String,

        /// Trade size in SOL
        #[arg(long, default_value_t = 0.0)]
        amount: f64,

        /// Sign the slot of the required signer matching this key instead of slot 0
        #[arg(long)]
        as_signer: bool,
    },

    /// Re-encrypt the stored secret under a new password
    ChangePassword,

    /// Delete the stored secret
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    // Keep decrypted key material out of core files
    sigvault_core::disable_core_dumps();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config
        .validate()
        .context("Configuration validation failed")?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run(cli.command, &config))
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let store = FileStore::in_dir(&config.vault.data_dir);
    let vault = Vault::new(store, config.vault_config()?);
    let mut input = Input::new();

    match command {
        Command::Status => {
            let state = vault.state().await?;
            println!("Vault file: {}", vault.store().path().display());
            println!("State:      {:?}", state);
            println!("KDF:        {:?}", config.kdf.algorithm);
            println!("Auto-lock:  {} secs", config.vault.auto_lock_secs);
        }

        Command::Import { file, force } => {
            anyhow::ensure!(
                force || !vault.has_secret().await?,
                "A secret is already stored; pass --force to replace it"
            );

            let text = match file {
                Some(path) => Zeroizing::new(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => input.read("Secret key")?,
            };
            let secret = parse_secret(&text).context("Failed to parse secret key")?;
            let password = input.secret(PASSWORD_ENV, "Password")?;

            vault
                .store_secret(&secret, &password)
                .await
                .context("Failed to store secret")?;
            println!("Stored secret for {}", public_key_of(&secret)?);
        }

        Command::Pubkey => {
            let password = input.secret(PASSWORD_ENV, "Password")?;
            vault
                .unlock(&password)
                .await
                .context("Failed to unlock vault")?;
            let public_key = vault.public_key().await;
            vault.wipe().await;
            println!("{}", public_key?);
        }

        Command::Sign {
            tx,
            tx_type,
            token_mint,
            amount,
            as_signer,
        } => {
            let envelope = if tx == "-" {
                parse_envelope(&input.read("Transaction")?)?
            } else {
                parse_envelope(&tx)?
            };
            let metadata = TxMetadata {
                tx_type,
                token_mint,
                amount,
            };

            let password = input.secret(PASSWORD_ENV, "Password")?;
            vault
                .unlock(&password)
                .await
                .context("Failed to unlock vault")?;

            let submission = if as_signer {
                match envelope.to_bytes() {
                    Ok(unsigned) => vault
                        .sign_as_signer(&unsigned)
                        .await
                        .map(|signed| SignedSubmission::new(&signed, metadata))
                        .map_err(anyhow::Error::from),
                    Err(e) => Err(e.into()),
                }
            } else {
                prepare_submission(&vault, &envelope, metadata)
                    .await
                    .map_err(anyhow::Error::from)
            };
            vault.wipe().await;

            let submission = submission.context("Failed to sign transaction")?;
            if let Ok(id) = submission.transaction_id() {
                log::info!("Signed transaction {}", id);
            }
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }

        Command::ChangePassword => {
            let old_password = input.secret(PASSWORD_ENV, "Current password")?;
            let new_password = input.secret(NEW_PASSWORD_ENV, "New password")?;
            vault
                .change_password(&old_password, &new_password)
                .await
                .context("Failed to change password")?;
            println!("Password changed");
        }

        Command::Delete { yes } => {
            anyhow::ensure!(yes, "Refusing to delete the stored secret without --yes");
            vault.delete().await?;
            println!("Stored secret deleted");
        }
    }

    Ok(())
}

/// Accept either a bare base64 transaction or a relay envelope
fn parse_envelope(text: &str) -> Result<UnsignedTxEnvelope> {
    let text = text.trim();
    if text.starts_with('{') {
        serde_json::from_str(text).context("Failed to parse transaction envelope")
    } else {
        Ok(UnsignedTxEnvelope {
            unsigned_tx: text.to_string(),
        })
    }
}

/// Line-oriented stdin reader for secrets that must not appear in argv
struct Input {
    lines: std::io::Lines<std::io::StdinLock<'static>>,
}

impl Input {
    fn new() -> Self {
        Self {
            lines: std::io::stdin().lines(),
        }
    }

    fn read(&mut self, prompt: &str) -> Result<Zeroizing<String>> {
        if std::io::stdin().is_terminal() {
            eprint!("{}: ", prompt);
            std::io::stderr().flush()?;
        }
        let mut line = self
            .lines
            .next()
            .with_context(|| format!("Expected {} on stdin", prompt.to_lowercase()))??;
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(Zeroizing::new(line))
    }

    /// Environment variable if set, otherwise the next stdin line
    fn secret(&mut self, env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
        match std::env::var(env_var) {
            Ok(value) => Ok(Zeroizing::new(value)),
            Err(_) => self.read(prompt),
        }
    }
}
