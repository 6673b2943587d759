//! Response framing
//!
//! Every response is a header line `<code> <data-length> <message>\r\n`
//! followed by exactly `data-length` bytes of payload. Failure codes map to
//! error kinds through `error::handlers`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::handlers::{OK, code_to_error, error_to_code};
use crate::error::NfsError;

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub data: Option<Vec<u8>>,
}

impl Reply {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            message: message.into(),
            data: Some(data.into()),
        }
    }

    /// Payload as text, lossily decoded.
    pub fn text(&self) -> String {
        self.data
            .as_deref()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .unwrap_or_default()
    }
}

fn one_line(message: &str) -> String {
    message.replace(['\r', '\n'], " ")
}

/// Format a response
pub fn format_response(result: &Result<Reply, NfsError>) -> Vec<u8> {
    match result {
        Ok(reply) => {
            let data = reply.data.as_deref().unwrap_or_default();
            let mut out =
                format!("{} {} {}\r\n", OK, data.len(), one_line(&reply.message)).into_bytes();
            out.extend_from_slice(data);
            out
        }
        Err(err) => format!(
            "{} 0 {}\r\n",
            error_to_code(err.kind()),
            one_line(&err.to_string())
        )
        .into_bytes(),
    }
}

/// Reads one framed response. The outer error is a broken channel; the
/// inner one is the server's verdict on the command.
pub async fn read_response<R>(reader: &mut R) -> Result<Result<Reply, NfsError>, NfsError>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    let n = reader
        .read_line(&mut header)
        .await
        .map_err(|e| NfsError::Internal(format!("reading response: {e}")))?;
    if n == 0 {
        return Err(NfsError::Internal("connection closed before response".into()));
    }

    let header = header.trim_end_matches(['\r', '\n']);
    let mut parts = header.splitn(3, ' ');
    let code = parts.next().and_then(|c| c.parse::<u16>().ok());
    let length = parts.next().and_then(|l| l.parse::<usize>().ok());
    let message = parts.next().unwrap_or("").to_string();
    let (Some(code), Some(length)) = (code, length) else {
        return Err(NfsError::Internal(format!("malformed response header {header:?}")));
    };

    let mut data = vec![0u8; length];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| NfsError::Internal(format!("reading response payload: {e}")))?;

    Ok(match code_to_error(code) {
        None => Ok(Reply {
            message,
            data: (length > 0).then_some(data),
        }),
        Some(kind) => {
            // The message already reads "<Kind>: detail"; keep only the detail
            let detail = message
                .split_once(": ")
                .map(|(_, detail)| detail.to_string())
                .unwrap_or(message);
            Err(NfsError::from_kind(kind, detail))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn success_frames_carry_exact_payload() {
        let reply = Reply::with_data("Read 9 bytes", b"a\r\nb\n\"c\"".to_vec());
        let bytes = format_response(&Ok(reply.clone()));
        let mut reader = BufReader::new(&bytes[..]);
        let parsed = read_response(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed, reply);
    }

    #[tokio::test]
    async fn failure_frames_rebuild_the_error() {
        let err = NfsError::NotFound("ghost.txt not found".into());
        let bytes = format_response(&Err(err));
        assert!(String::from_utf8_lossy(&bytes).starts_with("550 0 "));

        let mut reader = BufReader::new(&bytes[..]);
        let parsed = read_response(&mut reader).await.unwrap().unwrap_err();
        assert_eq!(parsed.kind(), ErrorKind::NotFound);
        assert!(parsed.to_string().to_lowercase().contains("not found"));
    }

    #[tokio::test]
    async fn consecutive_frames_stay_aligned() {
        let mut bytes = format_response(&Ok(Reply::with_data("one", b"1\n".to_vec())));
        bytes.extend(format_response(&Ok(Reply::message("two"))));
        let mut reader = BufReader::new(&bytes[..]);
        assert_eq!(read_response(&mut reader).await.unwrap().unwrap().text(), "1\n");
        assert_eq!(read_response(&mut reader).await.unwrap().unwrap().message, "two");
    }
}
