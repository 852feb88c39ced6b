use crate::error::Error;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// A pull-model source of response body bytes, read in chunks by
/// `extended_writer.rs` rather than handed over all at once.
///
/// `size()` returns `None` when the total length can't be known up front
/// (e.g. a compressed stream), which forces the caller into chunked
/// transfer-encoding.
pub trait DataSource: Send {
    fn size(&self) -> Option<u64>;

    /// Returns up to `max_bytes` of data. An empty return means the source
    /// is exhausted.
    fn get_data(&mut self, max_bytes: usize) -> Result<Bytes, Error>;

    /// Called once a previously returned buffer has been fully written.
    /// A no-op for sources that don't need to recycle buffers.
    fn free_data(&mut self) {}

    fn close(&mut self);
}

/// A response body already fully resident in memory.
pub struct InMemoryDataSource {
    buffer: Bytes,
    pos: usize,
}

impl InMemoryDataSource {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            pos: 0,
        }
    }
}

impl DataSource for InMemoryDataSource {
    fn size(&self) -> Option<u64> {
        Some(self.buffer.len() as u64)
    }

    fn get_data(&mut self, max_bytes: usize) -> Result<Bytes, Error> {
        let remaining = self.buffer.len() - self.pos;
        let take = remaining.min(max_bytes);
        let chunk = self.buffer.slice(self.pos..self.pos + take);
        self.pos += take;
        Ok(chunk)
    }

    fn close(&mut self) {
        self.buffer = Bytes::new();
        self.pos = 0;
    }
}

/// Wraps another `DataSource`, gzip-compressing its bytes on the fly.
///
/// The compressed length isn't known until the whole body has passed
/// through the encoder, so `size()` always returns `None` — this is what
/// forces `response.rs` to fall back to chunked transfer-encoding whenever
/// gzip is applied.
pub struct GZipDataSource {
    inner: Box<dyn DataSource>,
    // `None` once the encoder has been finalized and its trailer flushed
    // into `ready`.
    encoder: Option<GzEncoder<Vec<u8>>>,
    ready: Vec<u8>,
}

impl GZipDataSource {
    pub fn new(inner: Box<dyn DataSource>) -> Self {
        Self {
            inner,
            encoder: Some(GzEncoder::new(Vec::new(), Compression::default())),
            ready: Vec::new(),
        }
    }
}

impl DataSource for GZipDataSource {
    fn size(&self) -> Option<u64> {
        None
    }

    fn get_data(&mut self, max_bytes: usize) -> Result<Bytes, Error> {
        while self.ready.len() < max_bytes {
            let Some(encoder) = self.encoder.as_mut() else {
                break;
            };

            let chunk = self.inner.get_data(max_bytes)?;
            if chunk.is_empty() {
                let finished = self
                    .encoder
                    .take()
                    .unwrap()
                    .finish()
                    .map_err(|_| Error::DataSource)?;
                self.ready.extend_from_slice(&finished);
                break;
            }

            encoder.write_all(&chunk).map_err(|_| Error::DataSource)?;
            let flushed = std::mem::take(encoder.get_mut());
            self.ready.extend_from_slice(&flushed);
        }

        let take = self.ready.len().min(max_bytes);
        Ok(Bytes::from(self.ready.drain(..take).collect::<Vec<u8>>()))
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_reports_exact_size() {
        let source = InMemoryDataSource::new(b"hello".to_vec());
        assert_eq!(source.size(), Some(5));
    }

    #[test]
    fn in_memory_yields_data_then_empty() {
        let mut source = InMemoryDataSource::new(b"hello world".to_vec());
        let first = source.get_data(5).unwrap();
        assert_eq!(first, b"hello");
        let second = source.get_data(100).unwrap();
        assert_eq!(second, b" world");
        let third = source.get_data(10).unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn close_clears_buffer() {
        let mut source = InMemoryDataSource::new(b"hello".to_vec());
        source.close();
        assert_eq!(source.get_data(10).unwrap().len(), 0);
    }

    #[test]
    fn gzip_source_has_unknown_size() {
        let inner = Box::new(InMemoryDataSource::new(b"hello world".to_vec()));
        let gz = GZipDataSource::new(inner);
        assert_eq!(gz.size(), None);
    }

    #[test]
    fn gzip_source_produces_valid_gzip_stream() {
        let inner = Box::new(InMemoryDataSource::new(
            b"the quick brown fox jumps over the lazy dog".to_vec(),
        ));
        let mut gz = GZipDataSource::new(inner);
        let mut compressed = Vec::new();
        loop {
            let chunk = gz.get_data(4096).unwrap();
            if chunk.is_empty() {
                break;
            }
            compressed.extend_from_slice(&chunk);
        }
        // gzip magic bytes
        assert_eq!(&compressed[0..2], &[0x1f, 0x8b]);
    }
}
