use crate::data_source::DataSource;
use crate::error::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const READ_SIZE: usize = 65536;
const CHUNK_TERMINATOR: &[u8] = b"0\r\n\r\n";

/// Streams a `DataSource` to `writer`, one buffer at a time, optionally
/// wrapping each buffer in chunked transfer-encoding framing.
///
/// Tokio's sequential `.await` already guarantees only one write is ever
/// in flight, so there's no need for the active-write counter the
/// callback-driven original uses to know when it's safe to dispose of the
/// source — `run` simply loops until the source reports no more data, then
/// closes it.
pub async fn run<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mut source: Box<dyn DataSource>,
    chunked: bool,
) -> Result<(), Error> {
    loop {
        let buf = match source.get_data(READ_SIZE) {
            Ok(buf) => buf,
            Err(err) => {
                source.close();
                return Err(err);
            }
        };

        if buf.is_empty() {
            if chunked {
                if let Err(err) = writer.write_all(CHUNK_TERMINATOR).await {
                    source.close();
                    return Err(err.into());
                }
            }
            source.close();
            return Ok(());
        }

        let result = if chunked {
            write_chunk(writer, &buf).await
        } else {
            writer.write_all(&buf).await.map_err(Error::from)
        };

        source.free_data();

        if let Err(err) = result {
            source.close();
            return Err(err);
        }
    }
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> Result<(), Error> {
    let prefix = format!("{:X}\r\n", buf.len());
    writer.write_all(prefix.as_bytes()).await?;
    writer.write_all(buf).await?;
    writer.write_all(b"\r\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::InMemoryDataSource;

    #[tokio::test]
    async fn writes_plain_body_unframed() {
        let source = Box::new(InMemoryDataSource::new(b"hello world".to_vec()));
        let mut out = Vec::new();
        run(&mut out, source, false).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn writes_chunked_body_with_terminator() {
        let source = Box::new(InMemoryDataSource::new(b"hello".to_vec()));
        let mut out = Vec::new();
        run(&mut out, source, true).await.unwrap();
        assert_eq!(out, b"5\r\nhello\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn empty_source_chunked_is_just_terminator() {
        let source = Box::new(InMemoryDataSource::new(Vec::new()));
        let mut out = Vec::new();
        run(&mut out, source, true).await.unwrap();
        assert_eq!(out, b"0\r\n\r\n");
    }

    #[tokio::test]
    async fn empty_source_unchunked_writes_nothing() {
        let source = Box::new(InMemoryDataSource::new(Vec::new()));
        let mut out = Vec::new();
        run(&mut out, source, false).await.unwrap();
        assert!(out.is_empty());
    }
}
