/// Server-wide knobs. TLS termination is assumed to happen in front of
/// this crate (a reverse proxy, or a TLS layer the embedder wraps the
/// socket in before handing it over), so there is no `tls_config` here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub web_socket_config: WebSocketConfig,
    pub http_config: HttpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            web_socket_config: WebSocketConfig::default(),
            http_config: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: usize,
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
        }
    }
}

/// Knobs for the HTTP side of a connection: how much header data and body
/// data to tolerate before giving up on a client.
///
/// There is deliberately no idle/request timeout here: the core honors EOF
/// and read errors promptly but does not otherwise time requests out,
/// matching the original engine's behavior — an embedder that wants one
/// can layer `tokio::time::timeout` around the accept loop itself.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_header_bytes: usize,
    /// Upper bound on a request body, whether framed by `Content-Length`
    /// or `Transfer-Encoding: chunked`. Checked before the body buffer is
    /// allocated, so a client can't force a multi-gigabyte allocation
    /// just by sending a large `Content-Length` or chunk-size line.
    pub max_body_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 64 << 20,
        }
    }
}
