use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How a message arrived; responses are written back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// `Content-Length` headers followed by a blank line and the JSON body.
    Headers,
    /// One JSON document per line.
    Line,
}

fn invalid_data(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.into())
}

/// Read the next JSON-RPC message. `Ok(None)` on clean EOF.
pub(crate) async fn read_framed_json<R>(
    reader: &mut R,
) -> Result<Option<(Value, Framing)>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if !in_headers {
            if trimmed.trim().is_empty() {
                continue;
            }
            if trimmed.trim_start().starts_with(['{', '[']) {
                let value = serde_json::from_str(trimmed)
                    .map_err(|e| invalid_data(format!("Invalid JSON payload: {e}")))?;
                return Ok(Some((value, Framing::Line)));
            }
            in_headers = true;
        } else if trimmed.is_empty() {
            break;
        }

        if trimmed.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = trimmed
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len
                .parse::<usize>()
                .map_err(|_| invalid_data("Invalid Content-Length header"))?;
            content_length = Some(parsed);
        }
    }

    let content_length =
        content_length.ok_or_else(|| invalid_data("Missing Content-Length header"))?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload)
        .map_err(|e| invalid_data(format!("Invalid JSON payload: {e}")))?;
    Ok(Some((json, Framing::Headers)))
}

pub(crate) async fn write_framed_json<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| invalid_data(format!("Failed to serialize JSON: {e}")))?;
    match framing {
        Framing::Headers => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
