//! DAP wire protocol codec
//!
//! The DAP protocol uses HTTP-style headers followed by JSON body:
//! ```text
//! Content-Length: <byte-length>\r\n
//! \r\n
//! <JSON body>
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Read a DAP message from the stream
///
/// Parses the Content-Length header and reads the JSON body. Returns
/// `Ok(None)` on a clean end of stream before any header byte.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<String>, Error> {
    let mut content_length: Option<usize> = None;
    let mut any_header = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            if any_header {
                return Err(Error::DapProtocol(
                    "unexpected end of stream inside headers".to_string(),
                ));
            }
            return Ok(None);
        }

        // Empty line (just \r\n) signals end of headers
        if line == "\r\n" || line == "\n" {
            break;
        }
        any_header = true;

        let line = line.trim();
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse().map_err(|_| {
                Error::DapProtocol(format!("invalid Content-Length: {}", value.trim()))
            })?);
        }
        // Ignore other headers (like Content-Type)
    }

    let len = content_length
        .ok_or_else(|| Error::DapProtocol("missing Content-Length header".to_string()))?;

    if len > max_len {
        return Err(Error::DapProtocol(format!(
            "Content-Length too large: {len} bytes"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::DapProtocol("unexpected end of stream inside body".to_string())
        } else {
            Error::Io(e)
        }
    })?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|e| Error::DapProtocol(format!("invalid UTF-8: {e}")))
}

/// Write a DAP message to the stream
///
/// Adds the Content-Length header and writes the JSON body
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<(), Error> {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    const MAX: usize = 16 * 1024 * 1024;

    #[tokio::test]
    async fn test_read_message() {
        let data = b"Content-Length: 13\r\n\r\n{\"test\":true}";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));

        let result = read_message(&mut reader, MAX).await.unwrap();
        assert_eq!(result.as_deref(), Some("{\"test\":true}"));
    }

    #[tokio::test]
    async fn test_read_message_with_extra_headers() {
        let data = b"Content-Length: 13\r\nContent-Type: application/json\r\n\r\n{\"test\":true}";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));

        let result = read_message(&mut reader, MAX).await.unwrap();
        assert_eq!(result.as_deref(), Some("{\"test\":true}"));
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        let result = read_message(&mut reader, MAX).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let data = b"Content-Length: 99\r\n\r\n";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));
        let result = read_message(&mut reader, 10).await;
        assert!(matches!(result, Err(Error::DapProtocol(_))));
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let data = b"Content-Type: application/json\r\n\r\n";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));
        let result = read_message(&mut reader, MAX).await;
        assert!(matches!(result, Err(Error::DapProtocol(_))));
    }

    #[tokio::test]
    async fn test_write_message() {
        let mut output = Vec::new();
        write_message(&mut output, "{\"test\":true}").await.unwrap();

        let expected = "Content-Length: 13\r\n\r\n{\"test\":true}";
        assert_eq!(String::from_utf8(output).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, "{\"seq\":1}").await.unwrap();
        write_message(&mut buffer, "{\"seq\":2}").await.unwrap();

        let mut reader = BufReader::new(Cursor::new(buffer));
        assert_eq!(
            read_message(&mut reader, MAX).await.unwrap().as_deref(),
            Some("{\"seq\":1}")
        );
        assert_eq!(
            read_message(&mut reader, MAX).await.unwrap().as_deref(),
            Some("{\"seq\":2}")
        );
        assert!(read_message(&mut reader, MAX).await.unwrap().is_none());
    }
}
