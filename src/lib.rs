pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod middleware;
pub mod namespace;
pub mod naming;
pub mod protocol;
pub mod server;
pub mod storage;

pub use gateway::{Credentials, Gateway};
pub use naming::NamingServer;
pub use server::Server;
pub use storage::StorageServer;
