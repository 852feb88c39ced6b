use crate::response::HttpResponse;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Everything an embedding application needs to know about an incoming
/// request, independent of the connection it arrived on.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub server_address: String,
}

/// A handle an embedder can clone and hold onto after `on_ws_open` returns,
/// used to push frames to that client at any later point (from a timer, a
/// pub/sub fanout, another connection's handler, etc).
///
/// Backed by the same bounded channel the connection's write side already
/// drains, rather than a direct handle to the socket — this is what lets
/// `WsSender` be `Clone` and sent across tasks freely.
#[derive(Clone)]
pub struct WsSender {
    tx: mpsc::Sender<WsOutgoing>,
}

pub(crate) enum WsOutgoing {
    Message { binary: bool, data: Vec<u8> },
    Close,
}

impl WsSender {
    pub(crate) fn new(tx: mpsc::Sender<WsOutgoing>) -> Self {
        Self { tx }
    }

    pub async fn send_text(&self, text: String) -> Result<(), mpsc::error::SendError<()>> {
        self.tx
            .send(WsOutgoing::Message {
                binary: false,
                data: text.into_bytes(),
            })
            .await
            .map_err(|_| mpsc::error::SendError(()))
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), mpsc::error::SendError<()>> {
        self.tx
            .send(WsOutgoing::Message { binary: true, data })
            .await
            .map_err(|_| mpsc::error::SendError(()))
    }

    pub async fn close(&self) -> Result<(), mpsc::error::SendError<()>> {
        self.tx
            .send(WsOutgoing::Close)
            .await
            .map_err(|_| mpsc::error::SendError(()))
    }

    /// Non-blocking send, for use from a synchronous `on_ws_message`
    /// callback that wants to reply without an `await` point. Returns
    /// `false` if the connection's outgoing queue is full or closed;
    /// callers that need a guaranteed delivery should hold the
    /// `WsSender` somewhere they can `.await` `send_binary`/`send_text`
    /// instead.
    pub fn try_send_binary(&self, data: Vec<u8>) -> bool {
        self.tx
            .try_send(WsOutgoing::Message { binary: true, data })
            .is_ok()
    }

    pub fn try_send_text(&self, text: String) -> bool {
        self.tx
            .try_send(WsOutgoing::Message {
                binary: false,
                data: text.into_bytes(),
            })
            .is_ok()
    }
}

/// The embedding contract: an application implements this trait and hands
/// an `Arc<dyn WebApplication>` to `socket::Listener::bind`.
///
/// Deliberately synchronous rather than `async fn` — a long-running
/// callback blocks the connection task that invoked it either way, so
/// there's no correctness gained from `async-trait`, only a dependency
/// this crate's stack has no other use for.
pub trait WebApplication: Send + Sync {
    /// Called once the request line and headers have been parsed, before
    /// the body (if any) has been read. Returning `Some(response)` sends
    /// that response immediately and skips `get_response` entirely — the
    /// mechanism behind early rejections like `100 Continue` or a
    /// request that's already known to be invalid.
    fn on_headers(&self, _request: &RequestInfo) -> Option<HttpResponse> {
        None
    }

    /// Called with each chunk of body data as it's read off the wire.
    fn on_body_data(&self, _request: &RequestInfo, _data: &[u8]) {}

    /// Called once the full request (headers and body) has been received,
    /// for ordinary (non-upgrade) requests. The returned response is
    /// written back to the client.
    fn get_response(&self, request: &RequestInfo) -> HttpResponse;

    /// Called once a WebSocket upgrade has completed and the 101 response
    /// has gone out. `ws` can be cloned and retained for as long as the
    /// connection is open.
    fn on_ws_open(&self, _request: &RequestInfo, _ws: WsSender) {}

    /// Called for each complete WebSocket message received from the
    /// client, after fragment reassembly.
    fn on_ws_message(&self, _request: &RequestInfo, _binary: bool, _data: Vec<u8>) {}

    /// Called once the WebSocket connection has closed, for any reason
    /// (client-initiated close, protocol error, or socket shutdown).
    fn on_ws_close(&self, _request: &RequestInfo) {}
}
