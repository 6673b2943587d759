use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::client::handle_client;
use crate::config::NamingConfig;
use crate::error::NfsError;
use crate::middleware::logging::log_connection;
use crate::naming::NamingServer;
use crate::protocol::format_response;

/// Naming server front end: accepts connections and hands each one to its
/// own task.
pub struct Server {
    listener: TcpListener,
    naming: Arc<NamingServer>,
    config: Arc<NamingConfig>,
    active: Arc<AtomicUsize>,
}

/// Frees a connection slot when the session task ends, however it ends.
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    pub async fn bind(config: NamingConfig, naming: Arc<NamingServer>) -> Result<Self, NfsError> {
        let socket = config.socket();
        let listener = TcpListener::bind(&socket).await.map_err(|e| {
            error!("Failed to bind to {}: {}", socket, e);
            NfsError::Internal(format!("naming server startup failed on {socket}: {e}"))
        })?;
        info!("Naming server bound to {}", socket);

        Ok(Self {
            listener,
            naming,
            config: Arc::new(config),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NfsError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) {
        info!(
            "Starting naming server on {} (max {} clients)",
            self.config.socket(),
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let naming = Arc::clone(&self.naming);
                    let config = Arc::clone(&self.config);
                    let active = Arc::clone(&self.active);

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_new_client(stream, addr, naming, config, active).await
                        {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Admits a client if a slot is free, otherwise answers busy and closes.
async fn handle_new_client(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    naming: Arc<NamingServer>,
    config: Arc<NamingConfig>,
    active: Arc<AtomicUsize>,
) -> Result<(), std::io::Error> {
    let claimed = active.fetch_add(1, Ordering::SeqCst) + 1;
    let slot = Slot(active);

    if claimed > config.max_clients {
        warn!(
            "Turning away {}: {} clients connected",
            client_addr, config.max_clients
        );
        let busy = NfsError::Transient("Too many connections".into());
        stream.write_all(&format_response(&Err(busy))).await?;
        stream.shutdown().await?;
        // Consume what the client already sent so the close is not a reset
        let mut sink = [0u8; 1024];
        let _ = tokio::time::timeout(Duration::from_secs(1), async {
            while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
        })
        .await;
        return Ok(());
    }

    log_connection(&client_addr, claimed, config.max_clients);
    handle_client(stream, client_addr, naming, config.max_command_length).await;
    drop(slot);
    Ok(())
}
