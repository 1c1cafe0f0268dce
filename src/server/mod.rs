//! Development server with live reload
//!
//! Serves the development output tree, injects the reload client into HTML
//! pages, and pushes reload messages over a WebSocket.

mod reload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use colored::Colorize;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::utils::has_extension;

pub use reload::{channel, inject_reload_client, ReloadMessage, ReloadSender, RELOAD_PATH};

/// Where and how to serve
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl From<&ServerConfig> for ServeOptions {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            open: server.open,
        }
    }
}

/// Shared server state
pub(crate) struct ServerState {
    /// Directory being served
    root: PathBuf,

    /// Reload broadcast channel
    reload_tx: ReloadSender,
}

/// Development server
pub struct DevServer {
    root: PathBuf,
    options: ServeOptions,
    reload_tx: ReloadSender,
}

impl DevServer {
    /// Create a development server for `root`
    pub fn new(root: impl Into<PathBuf>, options: ServeOptions, reload_tx: ReloadSender) -> Self {
        Self {
            root: root.into(),
            options,
            reload_tx,
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            root: self.root.clone(),
            reload_tx: self.reload_tx.clone(),
        });

        Router::new()
            .route(RELOAD_PATH, get(reload::reload_websocket))
            .fallback(serve_static)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the process ends
    pub async fn start(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind((self.options.host.as_str(), self.options.port))
            .await
            .with_context(|| {
                format!("Failed to bind {}:{}", self.options.host, self.options.port)
            })?;

        let url = format!("http://{}:{}", self.options.host, self.options.port);
        eprintln!("  {} Local:   {}", "➜".green(), url.cyan());
        info!("Server listening on {}", url);

        if self.options.open {
            if let Err(e) = webbrowser_open(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

/// Serve a file from the output tree; HTML pages get the reload client
async fn serve_static(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let Some(relative) = request_path(request.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut file = state.root.join(&relative);
    if file.is_dir() {
        file = file.join("index.html");
    }

    if has_extension(&file, &["html", "htm"]) && file.is_file() {
        return match tokio::fs::read_to_string(&file).await {
            Ok(content) => Html(inject_reload_client(&content)).into_response(),
            Err(e) => {
                error!("Failed to read {}: {}", file.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    match ServeDir::new(&state.root).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Map a URL path onto a path below the served root
///
/// Returns `None` for paths that would leave the root.
fn request_path(uri_path: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();

    for segment in uri_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || Path::new(s).is_absolute() => return None,
            s => path.push(s),
        }
    }

    Some(path)
}

/// Open URL in browser (simple implementation)
fn webbrowser_open(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}
