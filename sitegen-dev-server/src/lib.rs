use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::{
        Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

const RELOAD_PATH: &str = "/__livereload";

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Root directory to serve and watch
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
    /// Reload connected browsers when files under `root` change
    pub live_reload: bool,
    /// Patterns to ignore when watching
    pub ignore: Vec<String>,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            root: PathBuf::from("docs"),
            open: false,
            live_reload: false,
            ignore: vec![],
        }
    }
}

/// A static file server with optional live reload
pub struct LiveServer {
    config: LiveServerConfig,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                self.config.root.display()
            ));
        }

        let serve_dir = ServeDir::new(&self.config.root);
        let app = if self.config.live_reload {
            let (reload_tx, _) = broadcast::channel::<String>(100);
            let state = AppState {
                reload_tx: reload_tx.clone(),
            };

            let watch_path = self.config.root.clone();
            let ignore_patterns = self.config.ignore.clone();
            tokio::spawn(async move {
                if let Err(e) = start_file_watcher(watch_path, reload_tx, ignore_patterns).await {
                    tracing::error!("File watcher error: {}", e);
                }
            });

            Router::new()
                .route(RELOAD_PATH, get(websocket_handler))
                .fallback_service(serve_dir)
                .layer(middleware::from_fn(inject_reload_script))
                .with_state(state)
        } else {
            Router::new().fallback_service(serve_dir)
        };

        let addr = resolve_addr(&self.config.host, self.config.port).await?;

        tracing::info!("Server running at http://{}:{}", self.config.host, self.config.port);
        tracing::info!("Serving: {}", self.config.root.display());
        if self.config.live_reload {
            tracing::info!("Live reload enabled at ws://{}{}", addr, RELOAD_PATH);
        }

        if self.config.open {
            let url = format!("http://{}:{}", self.config.host, self.config.port);
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

// Host names like "localhost" need a lookup; plain IPs parse directly.
async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Could not resolve {}:{}", host, port))
}

#[derive(Clone)]
struct AppState {
    reload_tx: broadcast::Sender<String>,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state.reload_tx))
}

async fn websocket_connection(mut socket: WebSocket, reload_tx: broadcast::Sender<String>) {
    let mut rx = reload_tx.subscribe();

    if socket
        .send(Message::Text("connected".into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload_msg) => {
                        if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

async fn inject_reload_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not buffer HTML response: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = inject_livereload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

async fn start_file_watcher(
    watch_path: PathBuf,
    reload_tx: broadcast::Sender<String>,
    ignore_patterns: Vec<String>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    let path_str = event.path.to_string_lossy();
                    let should_ignore = ignore_patterns
                        .iter()
                        .any(|pattern| path_str.contains(pattern.as_str()));

                    if !should_ignore {
                        let _ = tx.blocking_send(event.path);
                    }
                }
            }
        },
    )?;

    debouncer
        .watcher()
        .watch(&watch_path, notify::RecursiveMode::Recursive)?;

    tracing::debug!("File watcher started for: {}", watch_path.display());

    // A rebuild touches many files at once; coalesce them into one reload
    let mut last_reload = std::time::Instant::now();
    while let Some(path) = rx.recv().await {
        tracing::debug!("File changed: {}", path.display());

        let now = std::time::Instant::now();
        if now.duration_since(last_reload) > Duration::from_millis(1000) {
            let _ = reload_tx.send("reload".to_string());
            last_reload = now;
            tracing::info!("Sent reload signal");
        }
    }

    Ok(())
}

/// Inject the live reload client before `</body>`, or append it
pub fn inject_livereload_script(html: &str) -> String {
    let script = format!(
        r#"
<script>
(function() {{
    const socket = new WebSocket('ws://' + location.host + '{RELOAD_PATH}');
    socket.onmessage = function(event) {{
        if (event.data === 'reload') {{
            location.reload();
        }}
    }};
    socket.onclose = function() {{
        console.log('Live reload disconnected');
    }};
}})();
</script>
"#
    );

    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + script.len());
        result.push_str(&html[..pos]);
        result.push_str(&script);
        result.push_str(&html[pos..]);
        result
    } else {
        format!("{html}{script}")
    }
}
