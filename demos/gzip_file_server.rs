use http_flow::application::{RequestInfo, WebApplication};
use http_flow::config::ServerConfig;
use http_flow::data_source::InMemoryDataSource;
use http_flow::response::HttpResponse;
use http_flow::socket::Listener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serves files out of a directory, relying entirely on
/// `HttpResponse::write`'s own gzip negotiation — this application just
/// hands back a body and a `Content-Type`; whether it goes over the wire
/// compressed depends on the request's `Accept-Encoding`.
struct FileServerApp {
    root: PathBuf,
}

impl WebApplication for FileServerApp {
    fn get_response(&self, request: &RequestInfo) -> HttpResponse {
        let relative = request.url.trim_start_matches('/');
        let relative = if relative.is_empty() {
            "index.html"
        } else {
            relative
        };

        if Path::new(relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return HttpResponse::new(403, "Forbidden");
        }
        let path = self.root.join(relative);

        match std::fs::read(&path) {
            Ok(bytes) => {
                let mut response = HttpResponse::new(200, "OK")
                    .with_body(Box::new(InMemoryDataSource::new(bytes)));
                response.add_header("Content-Type", content_type_for(&path));
                response
            }
            Err(_) => HttpResponse::new(404, "Not Found"),
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let app = Arc::new(FileServerApp { root });
    let listener = Listener::bind("127.0.0.1:8080", app, ServerConfig::default()).await?;
    log::info!("serving files on {}", listener.local_addr());

    tokio::signal::ctrl_c().await?;
    listener.shutdown().await;
    Ok(())
}
