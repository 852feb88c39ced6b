use crate::error::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

/// Reads a complete request body according to how it was framed.
///
/// `httparse` only parses the header block; consuming the body — whether
/// fixed-length or chunked — is left to the caller. This module fills that
/// gap, since the teacher crate never has to read arbitrary request bodies
/// (an HTTP server's client never sends one).
pub async fn read_sized<R: AsyncRead + Unpin>(
    reader: &mut R,
    length: u64,
    max_body_bytes: u64,
) -> Result<Vec<u8>, Error> {
    if length > max_body_bytes {
        return Err(Error::BodyTooLarge(length, max_body_bytes));
    }
    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Reads a `Transfer-Encoding: chunked` body to completion, stripping the
/// chunk-size lines and the trailing `0\r\n\r\n` terminator.
///
/// Each chunk is `SIZE ["; ext"] CRLF <SIZE bytes> CRLF`, repeated until a
/// zero-size chunk. Chunk extensions are recognized and discarded; trailers
/// after the terminal chunk are not supported.
pub async fn read_chunked<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_body_bytes: u64,
) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();

    loop {
        let size = read_chunk_size(reader).await?;
        if size == 0 {
            eat_crlf(reader).await?;
            break;
        }

        let total = body.len() as u64 + size;
        if total > max_body_bytes {
            return Err(Error::BodyTooLarge(total, max_body_bytes));
        }

        let start = body.len();
        body.resize(start + size as usize, 0);
        reader.read_exact(&mut body[start..]).await?;
        eat_crlf(reader).await?;
    }

    Ok(body)
}

/// Reads one `HEXDIGIT+[;ext] CRLF` chunk-size line, returning the decoded
/// size. Stops accumulating hex digits at the first `;` (chunk extension)
/// or whitespace, then scans to the line's CRLF.
async fn read_chunk_size<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<u64, Error> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Err(Error::InvalidChunkFraming);
    }

    let size_part = line
        .trim_end_matches(['\r', '\n'])
        .split(';')
        .next()
        .unwrap_or("")
        .trim();

    if size_part.is_empty() {
        return Err(Error::InvalidChunkFraming);
    }

    u64::from_str_radix(size_part, 16).map_err(|_| Error::InvalidChunkFraming)
}

/// Consumes the CRLF that follows each chunk's data (and the terminal
/// chunk's trailer-less blank line).
async fn eat_crlf<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), Error> {
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;
    if &crlf != b"\r\n" {
        return Err(Error::InvalidChunkFraming);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    const MAX_BODY: u64 = 1024 * 1024;

    #[tokio::test]
    async fn reads_sized_body() {
        let mut reader = BufReader::new(&b"hello world"[..]);
        let body = read_sized(&mut reader, 5, MAX_BODY).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn sized_body_over_limit_is_rejected_before_allocating() {
        let mut reader = BufReader::new(&b"hello world"[..]);
        assert!(matches!(
            read_sized(&mut reader, 5, 4).await,
            Err(Error::BodyTooLarge(5, 4))
        ));
    }

    #[tokio::test]
    async fn reads_single_chunk_body() {
        let raw = b"5\r\nhello\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let body = read_chunked(&mut reader, MAX_BODY).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn reads_multi_chunk_body() {
        let raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let body = read_chunked(&mut reader, MAX_BODY).await.unwrap();
        assert_eq!(body, b"Wikipedia");
    }

    #[tokio::test]
    async fn ignores_chunk_extensions() {
        let raw = b"5;foo=bar\r\nhello\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let body = read_chunked(&mut reader, MAX_BODY).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn empty_chunked_body() {
        let raw = b"0\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let body = read_chunked(&mut reader, MAX_BODY).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn malformed_chunk_size_errors() {
        let raw = b"not-hex\r\n";
        let mut reader = BufReader::new(&raw[..]);
        assert!(read_chunked(&mut reader, MAX_BODY).await.is_err());
    }

    #[tokio::test]
    async fn chunked_body_over_limit_is_rejected() {
        let raw = b"5\r\nhello\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        assert!(matches!(
            read_chunked(&mut reader, 4).await,
            Err(Error::BodyTooLarge(5, 4))
        ));
    }

    #[tokio::test]
    async fn sized_and_chunked_bodies_match_for_same_content() {
        let sized_raw = b"Wikipedia";
        let mut sized_reader = BufReader::new(&sized_raw[..]);
        let sized_body = read_sized(&mut sized_reader, 9, MAX_BODY).await.unwrap();

        let chunked_raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let mut chunked_reader = BufReader::new(&chunked_raw[..]);
        let chunked_body = read_chunked(&mut chunked_reader, MAX_BODY).await.unwrap();

        assert_eq!(sized_body, chunked_body);
    }
}
