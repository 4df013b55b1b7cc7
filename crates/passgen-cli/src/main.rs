//! PassGen CLI: reproducible passwords from one master password
//!
//! Every password is recomputed from the master password and an entry label;
//! nothing secret is stored. Key lists live as `NAME.keys.json` files in the
//! data directory (`~/.passgen` by default).
//!
//! # Usage
//!
//! ```bash
//! passgen init                         # create and enroll the default list
//! passgen generate example.com         # print the password for a label
//! passgen -l work generate vpn --mode alphanum --max-length 16
//! passgen rotate example.com           # move a label to its next password
//! PASSGEN_MASTER=... passgen verify    # scripted check, exit code 1 on mismatch
//! ```

mod commands;
mod config;

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use passgen_core::{Entry, KeyListDocument, OutputMode};
use passgen_store::{KeyListStore, ListOrigin};
use zeroize::Zeroizing;

use commands::Outcome;
use config::CliConfig;

/// List used when nothing else names one
const DEFAULT_LIST: &str = "Default";

/// Env var holding the master password for non-interactive use
const MASTER_ENV: &str = "PASSGEN_MASTER";

#[derive(Parser)]
#[command(name = "passgen", version, about = "Reproducible passwords from one master password")]
struct Cli {
    /// Config file (default: <data dir>/passgen.toml)
    #[arg(short, long, global = true, env = "PASSGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the key lists
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Key list to operate on
    #[arg(short, long, global = true)]
    list: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the known key lists
    Lists,
    /// Print the entries of the selected list
    Entries,
    /// Create a key list and enroll its master password
    Init {
        /// Key-stretching iterations for the master fingerprint
        #[arg(long)]
        iterations: Option<u32>,
        /// Replace an existing list
        #[arg(long)]
        force: bool,
    },
    /// Check the master password
    Verify,
    /// Print the password for a label, adding the label if it is new
    Generate {
        label: String,
        /// Output mode for a new entry: base64, base64withsymbol, alphanum
        #[arg(long)]
        mode: Option<OutputMode>,
        /// Keep only this many characters (new entries only)
        #[arg(long)]
        max_length: Option<usize>,
        /// Derive even if the master password does not match
        #[arg(long)]
        force: bool,
    },
    /// Move a label to its next password
    Rotate { label: String },
    /// Remove a label from the list
    Remove { label: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| std::env::var_os("PASSGEN_DATA_DIR").map(PathBuf::from));
    let mut config = CliConfig::load(cli.config.as_deref(), data_dir.as_deref())
        .context("Failed to load config")?;
    config.apply_env_overrides();
    if let Some(dir) = data_dir {
        config.store.data_dir = dir;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let store = KeyListStore::open(config.store.data_dir.clone())
        .with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.store.data_dir.display()
            )
        })?
        .with_default_iterations(config.generation.iteration_count)
        .context("Invalid generation.iteration_count")?;

    let list = cli
        .list
        .or_else(|| config.store.default_list.clone())
        .or_else(|| store.last_used())
        .unwrap_or_else(|| DEFAULT_LIST.to_string());
    log::debug!("Using key list '{}' in {}", list, store.dir().display());

    run(cli.command, &config, &store, &list)
}

fn run(command: Command, config: &CliConfig, store: &KeyListStore, list: &str) -> Result<()> {
    match command {
        Command::Lists => {
            let names = store.list_names()?;
            if names.is_empty() {
                eprintln!("No key lists in {}", store.dir().display());
            }
            for name in names {
                let marker = if name == list { '*' } else { ' ' };
                println!("{} {}", marker, name);
            }
        }

        Command::Entries => {
            let document = load(store, list)?;
            for entry in document.entries() {
                let max_length = entry
                    .max_length
                    .map_or_else(|| "-".to_string(), |n| n.to_string());
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.label,
                    entry.output_mode,
                    max_length,
                    entry.change_counter.unwrap_or(0)
                );
            }
        }

        Command::Init { iterations, force } => {
            if store.exists(list)? && !force {
                anyhow::bail!(
                    "Key list '{}' already exists (use --force to replace it)",
                    list
                );
            }
            let secret = read_new_master()?;
            let iterations = iterations.unwrap_or(config.generation.iteration_count);
            anyhow::ensure!(iterations > 0, "--iterations must be > 0");
            let document = commands::init(iterations, &secret)?;
            store
                .save(list, &document)
                .with_context(|| format!("Failed to save key list '{}'", list))?;
            eprintln!("Created key list '{}'", list);
        }

        Command::Verify => {
            let mut document = load(store, list)?;
            let secret = read_master()?;
            let outcome = commands::verify(&mut document, &secret)?;
            finish(store, list, &document, &outcome)?;
            eprintln!("Master password OK");
        }

        Command::Generate {
            label,
            mode,
            max_length,
            force,
        } => {
            let mut document = load(store, list)?;
            let secret = read_master()?;

            let mut template = Entry::new(label)
                .with_output_mode(mode.unwrap_or(config.generation.output_mode));
            if let Some(max_length) = max_length.or(config.generation.max_length) {
                template = template.with_max_length(max_length);
            }

            let outcome = commands::generate(&mut document, &secret, template, || {
                if force {
                    return Ok(true);
                }
                ask("Master password check mismatch. Generate anyway? [y/N] ")
            })?;
            finish(store, list, &document, &outcome)?;
        }

        Command::Rotate { label } => {
            let mut document = load(store, list)?;
            let secret = read_master()?;
            let outcome = commands::rotate(&mut document, &secret, &label)?;
            finish(store, list, &document, &outcome)?;
        }

        Command::Remove { label } => {
            let mut document = load(store, list)?;
            let secret = read_master()?;
            let outcome = commands::remove(&mut document, &secret, &label)?;
            finish(store, list, &document, &outcome)?;
            eprintln!("Removed '{}' from '{}'", label, list);
        }
    }

    Ok(())
}

fn load(store: &KeyListStore, list: &str) -> Result<KeyListDocument> {
    let loaded = store
        .load(list)
        .with_context(|| format!("Failed to load key list '{}'", list))?;
    match loaded.origin {
        ListOrigin::Created => eprintln!("Key list '{}' does not exist yet", list),
        ListOrigin::Legacy => eprintln!(
            "Key list '{}' is in the old text format and will be converted",
            list
        ),
        ListOrigin::Current => {}
    }
    Ok(loaded.document)
}

/// Report, save if needed, then print the password or fail on a mismatch.
fn finish(
    store: &KeyListStore,
    list: &str,
    document: &KeyListDocument,
    outcome: &Outcome,
) -> Result<()> {
    let changes = &outcome.verification.changes;
    if changes.enrolled {
        eprintln!("Master password enrolled for '{}'", list);
    }
    if let Some(from) = changes.migrated_from {
        eprintln!("Master fingerprint upgraded from scheme {}", from);
        if !outcome.verification.matched {
            eprintln!("Warning: the stored fingerprint now belongs to the password just entered");
        }
    }

    if outcome.dirty() {
        store
            .save(list, document)
            .with_context(|| format!("Failed to save key list '{}'", list))?;
    }

    match &outcome.password {
        Some(password) => {
            if !outcome.verification.matched {
                eprintln!("Warning: generated with a master password that does not match");
            }
            println!("{}", password.as_str());
            Ok(())
        }
        None if !outcome.verification.matched => {
            anyhow::bail!("Master password check mismatch")
        }
        None => Ok(()),
    }
}

fn read_master() -> Result<Zeroizing<String>> {
    if let Ok(secret) = std::env::var(MASTER_ENV) {
        log::debug!("Master password taken from {}", MASTER_ENV);
        return Ok(Zeroizing::new(secret));
    }
    let secret =
        rpassword::prompt_password("Master password: ").context("Failed to read master password")?;
    Ok(Zeroizing::new(secret))
}

/// Read a new master password, asking twice on a terminal.
fn read_new_master() -> Result<Zeroizing<String>> {
    if let Ok(secret) = std::env::var(MASTER_ENV) {
        anyhow::ensure!(!secret.is_empty(), "{} is empty", MASTER_ENV);
        return Ok(Zeroizing::new(secret));
    }
    let first = Zeroizing::new(
        rpassword::prompt_password("New master password: ")
            .context("Failed to read master password")?,
    );
    anyhow::ensure!(!first.is_empty(), "Master password must not be empty");
    let second = Zeroizing::new(
        rpassword::prompt_password("Repeat master password: ")
            .context("Failed to read master password")?,
    );
    anyhow::ensure!(*first == *second, "Master passwords do not match");
    Ok(first)
}

/// Yes/no question on stderr. Anything but yes, or no terminal, is no.
fn ask(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }
    eprint!("{}", question);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
