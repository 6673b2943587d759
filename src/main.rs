//! RAX network file service - Entry Point
//!
//! One binary, three roles: the naming server, the storage server and a
//! one-shot client.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

use rax_nfs::auth::{IdentityStore, Sha256Verifier};
use rax_nfs::config::{ServiceConfig, StorageMode};
use rax_nfs::error::NfsError;
use rax_nfs::naming::RegistryFile;
use rax_nfs::protocol::parse_command;
use rax_nfs::storage::{DiskStorage, MemoryStorage, RemoteStorage, StorageEngine};
use rax_nfs::{Credentials, Gateway, NamingServer, Server, StorageServer};

#[derive(Parser)]
#[command(name = "rax-nfs", version, about = "Network file service")]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Run the naming server
    Naming,
    /// Run the storage server
    Storage,
    /// Run one command against the naming server
    Client {
        username: String,
        password: String,
        /// e.g. CREATE notes.txt "hello world"
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let cli = Cli::parse();
    let config = match ServiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.role {
        Role::Naming => run_naming(config).await,
        Role::Storage => run_storage(config).await,
        Role::Client {
            username,
            password,
            command,
        } => run_client(config, Credentials::new(username, password), &command).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn storage_engine(config: &ServiceConfig) -> Result<Arc<dyn StorageEngine>, NfsError> {
    let engine: Arc<dyn StorageEngine> = match config.storage.mode {
        StorageMode::Local => Arc::new(DiskStorage::open(config.storage.storage_root_path()).await?),
        StorageMode::Memory => Arc::new(MemoryStorage::new()),
        StorageMode::Remote => Arc::new(RemoteStorage::new(
            config.storage.socket(),
            config.gateway.connect_timeout(),
        )),
    };
    info!("Using {:?} storage", config.storage.mode);
    Ok(engine)
}

async fn run_naming(config: ServiceConfig) -> Result<(), NfsError> {
    info!("Launching naming server...");
    let storage = storage_engine(&config).await?;
    let identities = IdentityStore::new(Arc::new(Sha256Verifier), config.naming.max_username_length);
    let naming = match config.storage.mode {
        // Nothing to restore when the bytes die with the process
        StorageMode::Memory => NamingServer::new(&config.naming, identities, storage),
        StorageMode::Local | StorageMode::Remote => {
            let registry = RegistryFile::new(config.naming.registry_path());
            NamingServer::open(&config.naming, identities, storage, registry).await?
        }
    };
    let naming = Arc::new(naming);

    Server::bind(config.naming, naming).await?.run().await;
    Ok(())
}

async fn run_storage(config: ServiceConfig) -> Result<(), NfsError> {
    info!("Launching storage server...");
    let engine: Arc<dyn StorageEngine> =
        Arc::new(DiskStorage::open(config.storage.storage_root_path()).await?);
    StorageServer::bind(&config.storage.socket(), engine)
        .await?
        .run()
        .await;
    Ok(())
}

async fn run_client(
    config: ServiceConfig,
    credentials: Credentials,
    args: &[String],
) -> Result<(), NfsError> {
    // The shell already split the words; regroup those that carried spaces
    let line = args
        .iter()
        .map(|arg| {
            if arg.contains(char::is_whitespace) && !arg.contains('"') {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let command = parse_command(&line)?;

    let gateway = Gateway::new(config.naming.socket(), config.gateway);
    let reply = gateway.execute(&credentials, &command).await?;

    println!("{}", reply.message);
    if reply.data.is_some() {
        println!("{}", reply.text());
    }
    Ok(())
}
