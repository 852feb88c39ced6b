use crate::data_source::{DataSource, GZipDataSource};
use crate::error::Error;
use crate::extended_writer;
use crate::headers::HeaderMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An outgoing HTTP response under construction. Headers are added with
/// `add_header`/`set_header`; the body, if any, is a `DataSource` rather
/// than an in-memory buffer so large or generated bodies never need to be
/// fully materialized before the first byte goes out.
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    headers: Vec<(String, String)>,
    body: Option<Box<dyn DataSource>>,
    close_after_written: bool,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: None,
            close_after_written: false,
        }
    }

    pub fn with_body(mut self, body: Box<dyn DataSource>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replaces any existing header of the same name (case-insensitive),
    /// appending the new value last.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Marks the connection for closure once this response has been fully
    /// written, and advertises it with `Connection: close`.
    pub fn close_after_written(&mut self) {
        self.set_header("Connection", "close");
        self.close_after_written = true;
    }

    pub fn should_close_after_written(&self) -> bool {
        self.close_after_written
    }

    /// Serializes the status line and headers, decides response framing
    /// (gzip / chunked / Content-Length), and streams the body.
    ///
    /// Mirrors the original algorithm precisely: Content-Length is pulled
    /// out of the header list and re-derived rather than trusted verbatim,
    /// gzip is applied only when the caller didn't already set
    /// `Content-Encoding` and the request's `Accept-Encoding` mentions it,
    /// and a 101 response never gets a framing header of its own since the
    /// bytes that follow aren't really an HTTP body anymore.
    pub async fn write<W: AsyncWrite + Unpin>(
        mut self,
        writer: &mut W,
        request_headers: &HeaderMap,
    ) -> Result<(), Error> {
        let mut header_buf = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status_code, self.status_text
        );

        let mut content_length: Option<String> = None;
        let mut has_content_encoding = false;
        let mut rendered_headers = Vec::with_capacity(self.headers.len());

        for (name, value) in self.headers.drain(..) {
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = Some(value);
                continue;
            }
            if name.eq_ignore_ascii_case("Content-Encoding") {
                has_content_encoding = true;
            }
            rendered_headers.push((name, value));
        }

        // A substring match, not a token match: this mirrors the original
        // behavior exactly, including its willingness to match something
        // like "x-gzip" inside a larger Accept-Encoding value.
        let accepts_gzip = request_headers
            .get("Accept-Encoding")
            .map(|value| value.to_lowercase().contains("gzip"))
            .unwrap_or(false);

        let gzip =
            !has_content_encoding && self.status_code != 101 && self.body.is_some() && accepts_gzip;

        let mut chunked = false;
        if gzip {
            rendered_headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
            chunked = true;
            let inner = self.body.take().expect("checked above");
            self.body = Some(Box::new(GZipDataSource::new(inner)));
        }

        for (name, value) in &rendered_headers {
            header_buf.push_str(name);
            header_buf.push_str(": ");
            header_buf.push_str(value);
            header_buf.push_str("\r\n");
        }

        if self.status_code == 101 {
            // A switching-protocols response carries no framing header —
            // what follows isn't an HTTP body.
        } else if chunked {
            header_buf.push_str("Transfer-Encoding: chunked\r\n");
        } else if let Some(length) = &content_length {
            header_buf.push_str("Content-Length: ");
            header_buf.push_str(length);
            header_buf.push_str("\r\n");
        } else if let Some(body) = &self.body {
            if let Some(size) = body.size() {
                header_buf.push_str(&format!("Content-Length: {}\r\n", size));
            }
        }

        header_buf.push_str("\r\n");
        let mut out = header_buf.into_bytes();

        // For Hixie-76/HyBi-03 compatibility, a small 101 body is inlined
        // into the header buffer so it goes out in the same write, ahead
        // of any WebSocket traffic the server sends next.
        let mut inline_consumed_body = false;
        if self.status_code == 101 {
            if let Some(body) = self.body.as_mut() {
                if let Some(size) = body.size() {
                    if size > 0 && size < 256 {
                        let chunk = body.get_data(size as usize)?;
                        out.extend_from_slice(&chunk);
                        if chunk.len() as u64 == size {
                            inline_consumed_body = true;
                        }
                    }
                }
            }
        }

        writer.write_all(&out).await?;

        if inline_consumed_body {
            if let Some(mut body) = self.body.take() {
                body.close();
            }
            return Ok(());
        }

        if let Some(body) = self.body.take() {
            extended_writer::run(writer, body, chunked).await?;
        }

        Ok(())
    }
}
