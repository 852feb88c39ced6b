use crate::error::Error;
use crate::headers::HeaderMap;

/// Headers to allocate on the stack before falling back to a larger
/// allocation, mirroring the MIN/MAX retry-on-`TooManyHeaders` pattern
/// for `httparse`-based parsers.
const MIN_HEADERS: usize = 16;
const MAX_HEADERS: usize = 256;

/// How the request body is framed, decided from `Transfer-Encoding` and
/// `Content-Length` with `Transfer-Encoding: chunked` taking precedence
/// whenever both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Chunked,
    Sized(u64),
    Empty,
}

/// A fully parsed request line and header block. The body, if any, is read
/// separately by `body.rs` according to `body_length()`.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub version_minor: u8,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_length(&self) -> Result<BodyLength, Error> {
        if self.headers.contains_token("Transfer-Encoding", "chunked") {
            return Ok(BodyLength::Chunked);
        }

        match self.headers.get("Content-Length") {
            Some(value) => {
                let length: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidContentLength)?;
                Ok(BodyLength::Sized(length))
            }
            None => Ok(BodyLength::Empty),
        }
    }

    pub fn wants_websocket_upgrade(&self) -> bool {
        self.headers.contains_token("Upgrade", "websocket")
    }

    pub fn expects_100_continue(&self) -> bool {
        self.headers
            .get("Expect")
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }
}

/// Attempts to parse a complete request line + header block out of `buf`.
///
/// Returns `Ok(None)` when `buf` doesn't yet hold a complete header block
/// (httparse's `Status::Partial`) so the caller can read more bytes and
/// retry with the same, now-longer, buffer. Returns
/// `Ok(Some((head, consumed)))` on success, where `consumed` is the byte
/// offset of the first byte after the blank line terminating the headers.
pub fn try_parse_request(
    buf: &[u8],
    max_header_bytes: usize,
) -> Result<Option<(RequestHead, usize)>, Error> {
    if buf.len() > max_header_bytes {
        return Err(Error::HeaderTooLarge(max_header_bytes));
    }

    let mut num_headers = MIN_HEADERS;
    loop {
        let mut raw_headers = vec![httparse::EMPTY_HEADER; num_headers];
        let mut parsed = httparse::Request::new(&mut raw_headers);

        match parsed.parse(buf) {
            Ok(httparse::Status::Complete(consumed)) => {
                let mut headers = HeaderMap::new();
                for header in parsed.headers.iter() {
                    let value = String::from_utf8_lossy(header.value);
                    headers.append(header.name, &value);
                }

                let head = RequestHead {
                    method: parsed.method.unwrap_or("").to_string(),
                    path: parsed.path.unwrap_or("").to_string(),
                    version_minor: parsed.version.unwrap_or(1),
                    headers,
                };

                return Ok(Some((head, consumed)));
            }
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(httparse::Error::TooManyHeaders) => {
                if num_headers >= MAX_HEADERS {
                    return Err(Error::HeaderTooLarge(max_header_bytes));
                }
                num_headers *= 2;
            }
            Err(source) => return Err(Error::HttpParseError { source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get_request() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (head, consumed) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.path, "/index.html");
        assert_eq!(head.version_minor, 1);
        assert_eq!(head.header("Host"), Some("example.com"));
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn returns_none_on_partial_headers() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: example";
        assert!(try_parse_request(raw, 8192).unwrap().is_none());
    }

    #[test]
    fn rejects_oversized_header_block() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(matches!(
            try_parse_request(raw, 4),
            Err(Error::HeaderTooLarge(4))
        ));
    }

    #[test]
    fn duplicate_headers_combine_through_parsing() {
        let raw = b"GET / HTTP/1.1\r\nX-Tag: a\r\nX-Tag: b\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert_eq!(head.header("X-Tag"), Some("a,b"));
    }

    #[test]
    fn chunked_transfer_encoding_takes_precedence() {
        let raw =
            b"POST / HTTP/1.1\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert_eq!(head.body_length().unwrap(), BodyLength::Chunked);
    }

    #[test]
    fn content_length_parsed_when_present() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 42\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert_eq!(head.body_length().unwrap(), BodyLength::Sized(42));
    }

    #[test]
    fn no_framing_header_means_empty_body() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert_eq!(head.body_length().unwrap(), BodyLength::Empty);
    }

    #[test]
    fn invalid_content_length_is_an_error() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: not-a-number\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert!(matches!(
            head.body_length(),
            Err(Error::InvalidContentLength)
        ));
    }

    #[test]
    fn detects_websocket_upgrade_request() {
        let raw = b"GET /chat HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert!(head.wants_websocket_upgrade());
    }

    #[test]
    fn detects_websocket_upgrade_without_connection_header() {
        let raw = b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert!(head.wants_websocket_upgrade());
    }

    #[test]
    fn detects_100_continue_expectation() {
        let raw = b"POST / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n";
        let (head, _) = try_parse_request(raw, 8192).unwrap().unwrap();
        assert!(head.expects_100_continue());
    }
}
