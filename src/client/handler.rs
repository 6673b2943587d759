use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::Session;
use crate::error::NfsError;
use crate::middleware::logging::{log_command, log_disconnect, log_outcome};
use crate::naming::NamingServer;
use crate::protocol::{Command, format_response, parse_command};

/// Handles one naming server connection.
///
/// - Reads one command per line through a `BufReader`, bounded by
///   `max_command_length`.
/// - Runs each decoded command through the shared `NamingServer` and writes
///   back one framed response.
/// - Ends on QUIT, EOF, a broken socket, or after answering an over-long
///   or non-UTF-8 line with an invalid-argument response. A command in
///   flight still runs to completion and releases its locks.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    naming: Arc<NamingServer>,
    max_command_length: usize,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::new(client_addr);
    let mut line = String::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(max_command_length as u64 + 1)
            .read_line(&mut line)
            .await;

        match read {
            Ok(0) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(_) => {
                // Enforce command length limit
                if line.len() > max_command_length {
                    let err = NfsError::InvalidArgument(format!(
                        "command longer than {max_command_length} bytes"
                    ));
                    let _ = write_half.write_all(&format_response(&Err(err))).await;
                    break;
                }

                let (keyword, result) = match parse_command(&line) {
                    Ok(command) => {
                        log_command(&session, &command);
                        let keyword = command.keyword();
                        let quit = command == Command::Quit;
                        let result = naming.execute(&mut session, command).await;
                        if quit {
                            let _ = write_half.write_all(&format_response(&result)).await;
                            info!("Client {} requested to quit", client_addr);
                            break;
                        }
                        (keyword, result)
                    }
                    Err(err) => ("?", Err(err)),
                };

                log_outcome(&session, keyword, &result);
                if let Err(e) = write_half.write_all(&format_response(&result)).await {
                    error!("Failed to write to {}: {}", client_addr, e);
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Client {} sent a command that is not UTF-8", client_addr);
                let err = NfsError::InvalidArgument("command is not valid UTF-8".into());
                let _ = write_half.write_all(&format_response(&Err(err))).await;
                break;
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }
    }

    log_disconnect(&session);
}
