//! An embeddable HTTP/1.1 server core with WebSocket upgrade and
//! streaming response support, built on Tokio.
//!
//! An embedding application implements [`application::WebApplication`] and
//! hands it to [`socket::Listener::bind`]. From there the crate owns the
//! wire protocol — request parsing, response framing (including gzip and
//! chunked transfer-encoding), and the WebSocket handshake and frame
//! codec — while the application only ever sees parsed requests, response
//! values, and WebSocket messages.
//!
//! TLS is assumed to terminate in front of this crate; it isn't handled
//! here.

pub mod application;
mod body;
pub mod config;
mod connection;
pub mod data_source;
pub mod error;
pub mod frame;
mod handshake;
pub mod headers;
pub mod request;
pub mod response;
mod extended_writer;
pub mod socket;
