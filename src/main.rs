// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `vault` - operate a private file vault from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relational_vault::blockchain::{signing, AlloyAccessControl, ChainError};
use relational_vault::config::{ConfigError, VaultConfig, LOG_FORMAT_ENV};
use relational_vault::error::VaultError;
use relational_vault::identity::LocalKeyProvider;
use relational_vault::models::{FileRecord, GENERIC_MIME_TYPE};
use relational_vault::object_store::{HttpConnector, ObjectStoreError};
use relational_vault::session::{session_id, SessionCoordinator, SessionDeps};
use relational_vault::storage::{RedbSessionStore, SessionStoreError, StoragePaths};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Private file vault on a content-addressed store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the session state without touching the network
    Status,

    /// Create the vault, or resume it
    Init,

    /// List stored files
    Ls,

    /// Upload a file
    Put {
        /// Local file to upload
        path: PathBuf,

        /// Name in the vault (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        /// MIME type recorded for a new name
        #[arg(short, long, default_value = GENERIC_MIME_TYPE)]
        mime: String,
    },

    /// Download a file
    Get {
        /// Name in the vault
        name: String,

        /// Local destination
        out: PathBuf,
    },

    /// Delete a file
    Rm {
        /// Name in the vault
        name: String,
    },

    /// Rename a file
    Mv {
        /// Current name
        from: String,

        /// New name
        to: String,
    },

    /// Revoke the access-control record and delete every file
    Destroy,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("session store: {0}")]
    SessionStore(#[from] SessionStoreError),

    #[error("object store: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("chain: {0}")]
    Chain(#[from] ChainError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no file named {0:?} in the vault")]
    NoSuchFile(String),

    #[error("cannot derive a vault name from {0}; pass --name")]
    Unnamed(PathBuf),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(command: Commands) -> Result<(), CliError> {
    let config = VaultConfig::from_env()?;
    let mut session = open_session(&config)?;

    match command {
        Commands::Status => {
            println!("session   {}", session.session_id());
            println!("state     {}", session.state());
            if let Some(locator) = session.locator() {
                println!("chain     {}", locator.chain_id);
                if let Some(record) = locator.record_address {
                    println!("record    {record}");
                }
                if let Some(endpoint) = &locator.provider_endpoint {
                    println!("provider  {endpoint}");
                }
            }
        }
        Commands::Init => {
            let state = session.initialize().await?;
            println!("{state}");
        }
        Commands::Ls => {
            session.initialize().await?;
            for record in session.files()?.iter() {
                print_record(record);
            }
        }
        Commands::Put { path, name, mime } => {
            let name = match name {
                Some(name) => name,
                None => file_name(&path)?,
            };
            let bytes = tokio::fs::read(&path).await.map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            session.initialize().await?;
            let record = session.write_file(&name, &mime, &bytes).await?;
            print_record(&record);
        }
        Commands::Get { name, out } => {
            session.initialize().await?;
            let record = find(&session, &name)?;
            let bytes = session.read_file(&record).await?;
            tokio::fs::write(&out, bytes).await.map_err(|source| CliError::Io {
                path: out.clone(),
                source,
            })?;
        }
        Commands::Rm { name } => {
            session.initialize().await?;
            let record = find(&session, &name)?;
            session.delete_file(&record).await?;
        }
        Commands::Mv { from, to } => {
            session.initialize().await?;
            let record = find(&session, &from)?;
            let renamed = session.rename_file(&record, &to).await?;
            print_record(&renamed);
        }
        Commands::Destroy => {
            session.terminate_vault().await?;
            println!("{}", session.state());
        }
    }

    Ok(())
}

fn open_session(config: &VaultConfig) -> Result<SessionCoordinator, CliError> {
    let paths = StoragePaths::new(&config.data_dir);
    let sessions = Arc::new(RedbSessionStore::open(&paths.sessions_db())?);

    let signer = config.wallet_signer()?;
    let account = signer.address();
    let chain = AlloyAccessControl::new(
        config.network.clone(),
        config.rpc_url.as_deref(),
        signing::wallet_from_signer(signer),
        config.contract_bytecode()?,
    )?;

    let deps = SessionDeps {
        identities: Arc::new(LocalKeyProvider),
        chain: Arc::new(chain),
        connector: Arc::new(HttpConnector::new()?),
        sessions,
        providers: config.provider_table(),
    };

    tracing::debug!(
        network = %config.network.name,
        account = %account,
        data_dir = %config.data_dir.display(),
        "Opening session"
    );
    Ok(SessionCoordinator::open(
        session_id(&config.app_id, account),
        deps,
    )?)
}

fn find(session: &SessionCoordinator, name: &str) -> Result<FileRecord, CliError> {
    session
        .vault()?
        .find(name)
        .ok_or_else(|| CliError::NoSuchFile(name.to_string()))
}

fn file_name(path: &Path) -> Result<String, CliError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::Unnamed(path.to_path_buf()))
}

fn print_record(record: &FileRecord) {
    println!(
        "{:>10}  {}  {:<24}  {}",
        record.byte_length,
        record.modified_at.format("%Y-%m-%d %H:%M"),
        record.mime_type,
        record.display_name
    );
}
