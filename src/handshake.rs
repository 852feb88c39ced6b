use crate::error::Error;
use crate::request::RequestHead;
use crate::response::HttpResponse;
use base64::prelude::*;
use sha1::{Digest, Sha1};

/// RFC 6455's fixed GUID, concatenated onto the client's
/// `Sec-WebSocket-Key` before hashing to produce `Sec-WebSocket-Accept`.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Builds the `101 Switching Protocols` response for a validated upgrade
/// request. Returns `Error::NoSecWebsocketKey` if the request has no
/// `Sec-WebSocket-Key` header at all; callers are expected to have already
/// checked `RequestHead::wants_websocket_upgrade()`.
pub fn build_handshake_response(request: &RequestHead) -> Result<HttpResponse, Error> {
    let key = request
        .header("Sec-WebSocket-Key")
        .ok_or(Error::NoSecWebsocketKey)?;

    let accept_value = generate_websocket_accept_value(key);

    let mut response = HttpResponse::new(101, "Switching Protocols");
    response.add_header("Connection", "Upgrade");
    response.add_header("Upgrade", "websocket");
    response.add_header("Sec-WebSocket-Accept", accept_value);
    Ok(response)
}

fn generate_websocket_accept_value(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}
