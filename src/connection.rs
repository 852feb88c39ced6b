use crate::application::{RequestInfo, WebApplication, WsOutgoing, WsSender};
use crate::body;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::handshake;
use crate::request::{self, BodyLength, RequestHead};
use crate::response::HttpResponse;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::sync::{mpsc, watch};

const READ_BUF_SIZE: usize = 8192;
const WS_CHANNEL_CAPACITY: usize = 32;

/// Drives one accepted connection end to end: parses HTTP requests,
/// dispatches to the application, and — if the request upgrades — hands
/// off to WebSocket framing for the rest of the connection's life.
///
/// One Tokio task per connection means connection state is never touched
/// from two tasks at once; the only cross-task traffic is outbound
/// WebSocket frames pushed through a `WsSender`, drained here alongside
/// inbound frames via `select!`.
pub async fn handle<S>(
    stream: S,
    app: Arc<dyn WebApplication>,
    config: Arc<ServerConfig>,
    peer_addr: String,
    shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    match run(stream, app, config, peer_addr.clone(), shutdown).await {
        Ok(()) => log::debug!("connection closed: {peer_addr}"),
        Err(err) => log::warn!("connection closed: {peer_addr}: {err}"),
    }
}

enum ProtocolState {
    Http { accum: Vec<u8> },
    WebSocket {
        request: RequestInfo,
        fragmented: Option<FragmentedMessage>,
        leftover: Vec<u8>,
    },
}

struct FragmentedMessage {
    opcode: OpCode,
    payload: Vec<u8>,
}

enum RequestOutcome {
    /// Carries whatever bytes were already buffered past this request (a
    /// pipelined next request line, most commonly) so they seed the next
    /// parse instead of being dropped.
    Continue(Vec<u8>),
    Upgrade(ProtocolState),
    Close,
}

async fn run<S>(
    stream: S,
    app: Arc<dyn WebApplication>,
    config: Arc<ServerConfig>,
    peer_addr: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut writer = write_half;

    let mut state = ProtocolState::Http { accum: Vec::new() };
    let mut ignore_new_data = false;
    let (ws_tx, mut ws_rx) = mpsc::channel::<WsOutgoing>(WS_CHANNEL_CAPACITY);

    loop {
        match state {
            ProtocolState::Http { ref mut accum } => {
                if let Some((head, consumed)) = request::try_parse_request(
                    accum,
                    config.http_config.max_header_bytes,
                )? {
                    let leftover = accum.split_off(consumed);

                    let outcome = handle_request_head(
                        &head,
                        leftover,
                        &mut reader,
                        &mut writer,
                        &app,
                        &peer_addr,
                        &ws_tx,
                        &mut ignore_new_data,
                        &config,
                    )
                    .await?;

                    match outcome {
                        RequestOutcome::Continue(trailing) => {
                            state = ProtocolState::Http { accum: trailing }
                        }
                        RequestOutcome::Upgrade(ws_state) => state = ws_state,
                        RequestOutcome::Close => return Ok(()),
                    }
                    continue;
                }

                let mut chunk = [0u8; READ_BUF_SIZE];
                tokio::select! {
                    n = reader.read(&mut chunk) => {
                        let n = n?;
                        if n == 0 {
                            return Ok(());
                        }
                        if !ignore_new_data {
                            accum.extend_from_slice(&chunk[..n]);
                        }
                        // Once ignore_new_data is set, bytes are read (so the
                        // socket doesn't stall) and silently dropped.
                    }
                    _ = shutdown.changed() => {
                        return Ok(());
                    }
                }
            }
            ProtocolState::WebSocket {
                ref request,
                ref mut fragmented,
                ref mut leftover,
            } => {
                let mut prefixed = PrefixedReader {
                    prefix: std::mem::take(leftover),
                    pos: 0,
                    inner: &mut reader,
                };

                tokio::select! {
                    frame = Frame::read_from(&mut prefixed, config.web_socket_config.max_frame_size) => {
                        let frame = frame?;
                        let done = handle_ws_frame(
                            frame,
                            fragmented,
                            request,
                            &app,
                            &mut writer,
                            &config,
                        )
                        .await?;
                        if done {
                            app.on_ws_close(request);
                            return Ok(());
                        }
                    }
                    outgoing = ws_rx.recv() => {
                        match outgoing {
                            Some(WsOutgoing::Message { binary, data }) => {
                                let opcode = if binary { OpCode::Binary } else { OpCode::Text };
                                Frame::new(true, opcode, data).write_to(&mut writer).await?;
                            }
                            Some(WsOutgoing::Close) | None => {
                                Frame::new(true, OpCode::Close, Vec::new())
                                    .write_to(&mut writer)
                                    .await?;
                                app.on_ws_close(request);
                                return Ok(());
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        let _ = Frame::new(true, OpCode::Close, Vec::new())
                            .write_to(&mut writer)
                            .await;
                        app.on_ws_close(request);
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_request_head<R, W>(
    head: &RequestHead,
    leftover: Vec<u8>,
    reader: &mut R,
    writer: &mut W,
    app: &Arc<dyn WebApplication>,
    peer_addr: &str,
    ws_tx: &mpsc::Sender<WsOutgoing>,
    ignore_new_data: &mut bool,
    config: &ServerConfig,
) -> Result<RequestOutcome, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let info = build_request_info(head, peer_addr);

    if let Some(mut premature) = app.on_headers(&info) {
        let body_expected = !matches!(head.body_length()?, BodyLength::Empty);
        if body_expected {
            premature.close_after_written();
            *ignore_new_data = true;
        }
        let should_close = premature.should_close_after_written();
        premature.write(writer, &head.headers).await?;
        if should_close {
            return Ok(RequestOutcome::Close);
        }
        // With no body expected, anything already buffered past the
        // headers belongs to the next request, not this response.
        let trailing = if body_expected { Vec::new() } else { leftover };
        return Ok(RequestOutcome::Continue(trailing));
    }

    if head.expects_100_continue() {
        let interim = HttpResponse::new(100, "Continue");
        interim.write(writer, &head.headers).await?;
    }

    if head.wants_websocket_upgrade() {
        if head.header("Sec-WebSocket-Key").is_none() {
            log::warn!("{peer_addr}: websocket upgrade requested without Sec-WebSocket-Key, closing");
            return Ok(RequestOutcome::Close);
        }

        let response = handshake::build_handshake_response(head)?;
        response.write(writer, &head.headers).await?;
        app.on_ws_open(&info, WsSender::new(ws_tx.clone()));
        log::debug!("{peer_addr}: upgraded to websocket");
        return Ok(RequestOutcome::Upgrade(ProtocolState::WebSocket {
            request: info,
            fragmented: None,
            leftover,
        }));
    }

    let (body, trailing) =
        read_request_body(head, leftover, reader, config.http_config.max_body_bytes).await?;
    if !body.is_empty() {
        app.on_body_data(&info, &body);
    }

    let response = app.get_response(&info);
    let should_close = response.should_close_after_written();
    response.write(writer, &head.headers).await?;

    if should_close {
        return Ok(RequestOutcome::Close);
    }

    Ok(RequestOutcome::Continue(trailing))
}

/// Reads this request's body (if any) off `reader`, starting with
/// whatever trailing bytes `try_parse_request` already had buffered past
/// the header block. Returns the body alongside any bytes left over once
/// the body is fully read — the start of a pipelined next request.
async fn read_request_body<R: AsyncRead + Unpin>(
    head: &RequestHead,
    leftover: Vec<u8>,
    reader: &mut R,
    max_body_bytes: u64,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    match head.body_length()? {
        BodyLength::Empty => Ok((Vec::new(), leftover)),
        BodyLength::Sized(length) => {
            let mut prefixed = PrefixedReader {
                prefix: leftover,
                pos: 0,
                inner: reader,
            };
            let body = body::read_sized(&mut prefixed, length, max_body_bytes).await?;
            let trailing = if prefixed.pos < prefixed.prefix.len() {
                prefixed.prefix[prefixed.pos..].to_vec()
            } else {
                Vec::new()
            };
            Ok((body, trailing))
        }
        BodyLength::Chunked => {
            let prefixed = PrefixedReader {
                prefix: leftover,
                pos: 0,
                inner: reader,
            };
            let mut buffered = tokio::io::BufReader::new(prefixed);
            let body = body::read_chunked(&mut buffered, max_body_bytes).await?;
            let trailing = buffered.buffer().to_vec();
            Ok((body, trailing))
        }
    }
}

async fn handle_ws_frame<W: AsyncWrite + Unpin>(
    frame: Frame,
    fragmented: &mut Option<FragmentedMessage>,
    request: &RequestInfo,
    app: &Arc<dyn WebApplication>,
    writer: &mut W,
    config: &ServerConfig,
) -> Result<bool, Error> {
    match frame.opcode {
        OpCode::Text | OpCode::Binary => {
            if fragmented.is_some() {
                return Err(Error::InvalidFrameFragmentation);
            }
            if frame.payload.len() > config.web_socket_config.max_message_size {
                return Err(Error::MaxMessageSize(
                    frame.payload.len(),
                    config.web_socket_config.max_message_size,
                ));
            }
            if frame.final_fragment {
                let binary = matches!(frame.opcode, OpCode::Binary);
                app.on_ws_message(request, binary, frame.payload);
            } else {
                *fragmented = Some(FragmentedMessage {
                    opcode: frame.opcode,
                    payload: frame.payload,
                });
            }
        }
        OpCode::Continuation => match fragmented {
            Some(msg) => {
                msg.payload.extend_from_slice(&frame.payload);
                if msg.payload.len() > config.web_socket_config.max_message_size {
                    return Err(Error::MaxMessageSize(
                        msg.payload.len(),
                        config.web_socket_config.max_message_size,
                    ));
                }
                if frame.final_fragment {
                    let completed = fragmented.take().unwrap();
                    let binary = matches!(completed.opcode, OpCode::Binary);
                    app.on_ws_message(request, binary, completed.payload);
                }
            }
            None => return Err(Error::InvalidContinuationFrame),
        },
        OpCode::Close => {
            Frame::new(true, OpCode::Close, Vec::new())
                .write_to(writer)
                .await?;
            return Ok(true);
        }
        OpCode::Ping => {
            Frame::new(true, OpCode::Pong, frame.payload)
                .write_to(writer)
                .await?;
        }
        OpCode::Pong => {}
    }

    Ok(false)
}

fn build_request_info(head: &RequestHead, peer_addr: &str) -> RequestInfo {
    let mut headers = HashMap::with_capacity(head.headers.len());
    for (name, value) in head.headers.iter() {
        headers.insert(name.to_string(), value.to_string());
    }

    RequestInfo {
        method: head.method.clone(),
        url: head.path.clone(),
        headers,
        server_address: peer_addr.to_string(),
    }
}

/// An `AsyncRead` that serves already-buffered bytes first, then falls
/// through to `inner` — used to replay bytes that arrived bundled with
/// the header block (the tail of a request body, or the first WebSocket
/// frame sent right after the upgrade) without an extra copy into the
/// socket's own buffer.
struct PrefixedReader<'a, R> {
    prefix: Vec<u8>,
    pos: usize,
    inner: &'a mut R,
}

impl<'a, R: AsyncRead + Unpin> AsyncRead for PrefixedReader<'a, R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos < self.prefix.len() {
            let remaining = self.prefix.len() - self.pos;
            let take = remaining.min(buf.remaining());
            let start = self.pos;
            buf.put_slice(&self.prefix[start..start + take]);
            self.pos += take;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut *self.inner).poll_read(cx, buf)
    }
}
