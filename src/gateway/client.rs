//! Client gateway
//!
//! Turns one user command into one naming server round trip on a fresh
//! connection: LOGIN with the caller's credentials (skipped for REGISTER),
//! then the command itself. Transient failures are retried with linearly
//! growing delays up to `max_retries` attempts.

use log::{debug, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use super::attempt::Attempt;
use crate::config::GatewayConfig;
use crate::error::NfsError;
use crate::protocol::{Command, Reply, read_response};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

pub struct Gateway {
    addr: String,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(addr: impl Into<String>, config: GatewayConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
        }
    }

    pub async fn execute(
        &self,
        credentials: &Credentials,
        command: &Command,
    ) -> Result<Reply, NfsError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(credentials, command).await {
                Attempt::Success(reply) => return Ok(reply),
                Attempt::Terminal(err) => return Err(err),
                Attempt::Transient(err) if attempt >= max_attempts => {
                    warn!(
                        "Giving up on {} after {} attempts: {}",
                        command.keyword(),
                        attempt,
                        err
                    );
                    return Err(err);
                }
                Attempt::Transient(err) => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        command.keyword(),
                        attempt,
                        max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, credentials: &Credentials, command: &Command) -> Attempt {
        let stream = match timeout(self.config.connect_timeout(), TcpStream::connect(&self.addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let detail = format!("cannot reach naming server at {}: {e}", self.addr);
                return Attempt::classify(Err(NfsError::from_kind(NfsError::from(e).kind(), detail)));
            }
            Err(_) => {
                return Attempt::Transient(NfsError::Transient(format!(
                    "connecting to {} timed out",
                    self.addr
                )));
            }
        };
        debug!("Connected to naming server at {}", self.addr);

        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        if !matches!(command, Command::Register { .. }) {
            let login = Command::Login {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            };
            match round_trip(&mut reader, &mut writer, &login).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Attempt::classify(Err(err)),
                // Nothing has run yet, so a dropped channel is worth retrying
                Err(err) => return Attempt::Transient(NfsError::Transient(err.detail().to_string())),
            }
        }

        // Past this point the command may have run; a dropped channel is final
        let result = round_trip(&mut reader, &mut writer, command)
            .await
            .and_then(|verdict| verdict);
        Attempt::classify(result)
    }
}

async fn round_trip(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    command: &Command,
) -> Result<Result<Reply, NfsError>, NfsError> {
    let line = format!("{}\r\n", command.to_line());
    writer.write_all(line.as_bytes()).await.map_err(|e| {
        NfsError::Internal(format!("sending {}: {e}", command.keyword()))
    })?;
    read_response(reader).await
}
