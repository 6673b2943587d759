//! Storage server
//!
//! Serves a local storage engine over the storage channel. Requests arrive
//! only from the naming server, already authorized and locked.

use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::engine::StorageEngine;
use super::wire::{StorageRequest, StorageResponse, execute};
use crate::error::NfsError;

pub struct StorageServer {
    listener: TcpListener,
    engine: Arc<dyn StorageEngine>,
}

impl StorageServer {
    pub async fn bind(addr: &str, engine: Arc<dyn StorageEngine>) -> Result<Self, NfsError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind storage server to {}: {}", addr, e);
            NfsError::from(e)
        })?;
        info!("Storage server bound to {}", listener.local_addr()?);
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NfsError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        if let Err(e) = serve_channel(stream, addr, engine).await {
                            warn!("Storage channel {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting storage connection: {}", e);
                }
            }
        }
    }
}

async fn serve_channel(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<dyn StorageEngine>,
) -> Result<(), NfsError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let response = match serde_json::from_str::<StorageRequest>(line.trim_end()) {
            Ok(request) => {
                info!("Storage request from {}: {}", addr, request.name());
                execute(engine.as_ref(), request).await
            }
            Err(e) => {
                warn!("Malformed storage request from {}: {}", addr, e);
                StorageResponse::from(NfsError::InvalidArgument(format!(
                    "malformed storage request: {e}"
                )))
            }
        };

        let mut reply = serde_json::to_string(&response)?;
        reply.push('\n');
        write_half.write_all(reply.as_bytes()).await?;
        write_half.flush().await?;
    }
}
