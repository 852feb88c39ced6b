use http_flow::application::{RequestInfo, WebApplication, WsSender};
use http_flow::config::ServerConfig;
use http_flow::data_source::InMemoryDataSource;
use http_flow::response::HttpResponse;
use http_flow::socket::Listener;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serves a static page over plain HTTP and echoes every WebSocket
/// message back to the client that sent it.
///
/// Senders are keyed by peer address, since that's the only per-connection
/// identity `RequestInfo` carries.
struct EchoApp {
    senders: Mutex<HashMap<String, WsSender>>,
}

impl WebApplication for EchoApp {
    fn get_response(&self, request: &RequestInfo) -> HttpResponse {
        if request.url == "/" {
            let body = b"<html><body><p>connect a websocket to /ws</p></body></html>".to_vec();
            let mut response = HttpResponse::new(200, "OK")
                .with_body(Box::new(InMemoryDataSource::new(body)));
            response.add_header("Content-Type", "text/html");
            response
        } else {
            HttpResponse::new(404, "Not Found")
        }
    }

    fn on_ws_open(&self, request: &RequestInfo, ws: WsSender) {
        log::info!("websocket opened: {}", request.server_address);
        self.senders
            .lock()
            .unwrap()
            .insert(request.server_address.clone(), ws);
    }

    fn on_ws_message(&self, request: &RequestInfo, binary: bool, data: Vec<u8>) {
        let senders = self.senders.lock().unwrap();
        if let Some(sender) = senders.get(&request.server_address) {
            let delivered = if binary {
                sender.try_send_binary(data)
            } else {
                sender.try_send_text(String::from_utf8_lossy(&data).into_owned())
            };
            if !delivered {
                log::warn!("outgoing queue full, dropped echo for {}", request.server_address);
            }
        }
    }

    fn on_ws_close(&self, request: &RequestInfo) {
        self.senders.lock().unwrap().remove(&request.server_address);
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let app = Arc::new(EchoApp {
        senders: Mutex::new(HashMap::new()),
    });
    let listener = Listener::bind("127.0.0.1:8080", app, ServerConfig::default()).await?;
    log::info!("listening on {}", listener.local_addr());

    tokio::signal::ctrl_c().await?;
    listener.shutdown().await;
    Ok(())
}
