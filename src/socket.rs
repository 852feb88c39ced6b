use crate::application::WebApplication;
use crate::config::ServerConfig;
use crate::connection;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Accepts connections and spawns one Tokio task per connection, handing
/// each one off to `connection::handle`.
///
/// The live-connection registry is the one piece of state shared across
/// tasks in this crate — the accept loop adds to it, `shutdown` drains it
/// — so it's the one place a `tokio::sync::Mutex` is justified; every
/// other piece of per-connection state belongs to exactly one task.
pub struct Listener {
    local_addr: std::net::SocketAddr,
    accept_task: JoinHandle<()>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Listener {
    /// Binds `addr`, then starts accepting connections in the background.
    /// Each accepted connection is registered before its task starts, so
    /// `shutdown` can never race a connection that hasn't been recorded
    /// yet.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        app: Arc<dyn WebApplication>,
        config: ServerConfig,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let config = Arc::new(config);
        let connections: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_connections = connections.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        log::warn!("accept() failed: {err}");
                        continue;
                    }
                };

                log::debug!("accepted connection from {peer_addr}");
                let app = app.clone();
                let config = config.clone();
                let handle = tokio::spawn(connection::handle(
                    stream,
                    app,
                    config,
                    peer_addr.to_string(),
                    shutdown_rx.clone(),
                ));
                accept_connections.lock().await.push(handle);
            }
        });

        Ok(Self {
            local_addr,
            accept_task,
            connections,
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections, then signals every live connection
    /// to close gracefully and waits for each to finish, walking the
    /// registry in reverse registration order — the same order the
    /// original implementation tears connections down in, last accepted
    /// first. Each connection observes the signal at its own next
    /// opportunity (between requests, or between WebSocket frames) and
    /// closes through its normal path, so an upgraded connection always
    /// reaches `on_ws_close` before its task ends.
    pub async fn shutdown(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;

        let _ = self.shutdown_tx.send(true);

        let mut connections = self.connections.lock().await;
        while let Some(handle) = connections.pop() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{RequestInfo, WebApplication};
    use crate::response::HttpResponse;

    struct EchoApp;

    impl WebApplication for EchoApp {
        fn get_response(&self, _request: &RequestInfo) -> HttpResponse {
            HttpResponse::new(200, "OK")
        }
    }

    #[tokio::test]
    async fn binds_to_an_ephemeral_port() {
        let listener = Listener::bind("127.0.0.1:0", Arc::new(EchoApp), ServerConfig::default())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        listener.shutdown().await;
    }
}
