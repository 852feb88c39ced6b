use std::io;
use thiserror::Error;

/// Every failure mode the engine can hit, from wire-level framing problems
/// down to a response body's data source.
///
/// Per the error handling design, an `Error` never crosses into the
/// embedding application as an exception: every site that produces one
/// either logs it and closes the connection, or folds it into a status
/// code. See `connection.rs` and `extended_writer.rs` for where each
/// variant is collapsed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: httparse::Error,
    },

    #[error("HTTP headers exceeded the {0} byte limit before completing")]
    HeaderTooLarge(usize),

    #[error("invalid chunked transfer-encoding framing")]
    InvalidChunkFraming,

    #[error("Content-Length header was not a valid non-negative integer")]
    InvalidContentLength,

    #[error("request body of `{0}` bytes exceeds max_body_bytes `{1}`")]
    BodyTooLarge(u64, u64),

    // Handshake errors
    #[error("no Sec-WebSocket-Key header present in the upgrade request")]
    NoSecWebsocketKey,

    // Framing errors
    #[error("RSV not zero")]
    RSVNotZero,

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame with invalid payload size, can't be greater than 125")]
    ControlFramePayloadSize,

    #[error("frame payload of `{0}` bytes exceeds max_frame_size `{1}`")]
    MaxFrameSize(usize, usize),

    #[error("message of `{0}` bytes exceeds max_message_size `{1}`")]
    MaxMessageSize(usize, usize),

    // Fragmentation errors
    #[error("Invalid frame while there is a fragmented message in progress")]
    InvalidFrameFragmentation,

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("Invalid opcode `{0:#x}`")]
    InvalidOpcode(u8),

    #[error("data source failed while streaming a response body")]
    DataSource,
}

pub type Result<T> = std::result::Result<T, Error>;
