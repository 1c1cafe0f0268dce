//! Live reload channel between the rebuild worker and open browser tabs

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ServerState;

/// WebSocket endpoint the injected client connects to
pub const RELOAD_PATH: &str = "/__sluice_reload";

/// Reload message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    FullReload { reason: String },

    /// Stylesheets changed and can be swapped in place
    CssUpdate { path: String },

    /// A rebuild reported errors
    Error { message: String },
}

/// Sending half shared by the watcher and the server
pub type ReloadSender = broadcast::Sender<ReloadMessage>;

/// Create the reload broadcast channel
pub fn channel() -> ReloadSender {
    broadcast::channel(100).0
}

/// Handle WebSocket upgrade for live reload
pub(crate) async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(|socket| handle_reload_socket(socket, reload_rx))
}

async fn handle_reload_socket(socket: WebSocket, mut reload_rx: broadcast::Receiver<ReloadMessage>) {
    let (mut sender, mut receiver) = socket.split();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Reload client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match reload_rx.recv().await {
                Ok(message) => {
                    let Ok(json) = serde_json::to_string(&message) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Reload client lagged by {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    first_to_finish(send_task, recv_task).await;

    debug!("Reload connection closed");
}

/// Wait for either task, then abort the other
async fn first_to_finish(mut a: JoinHandle<()>, mut b: JoinHandle<()>) {
    tokio::select! {
        _ = &mut a => b.abort(),
        _ = &mut b => a.abort(),
    }
}

/// Browser side of the reload channel
const RELOAD_CLIENT: &str = r#"
<script>
// sluice live reload
(function () {
  var ws = new WebSocket("ws://" + location.host + "/__sluice_reload");

  ws.onmessage = function (event) {
    var message = JSON.parse(event.data);

    switch (message.type) {
      case "full-reload":
        console.log("[sluice] Reloading Browser Preview.", message.reason);
        location.reload();
        break;

      case "css-update":
        document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
          var url = new URL(link.href);
          url.searchParams.set("t", Date.now());
          link.href = url.toString();
        });
        break;

      case "error":
        console.error("[sluice] " + message.message);
        break;
    }
  };

  ws.onclose = function () {
    setTimeout(function () { location.reload(); }, 1000);
  };
})();
</script>
"#;

/// Inject the reload client into an HTML page
pub fn inject_reload_client(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => {
            let mut result = html.to_string();
            result.insert_str(pos, RELOAD_CLIENT);
            result
        }
        None => format!("{}{}", html, RELOAD_CLIENT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_string(&ReloadMessage::CssUpdate {
            path: "css/style.css".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"css-update","path":"css/style.css"}"#);

        let json = serde_json::to_string(&ReloadMessage::FullReload {
            reason: "html".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"full-reload","reason":"html"}"#);

        assert_eq!(
            serde_json::to_string(&ReloadMessage::Connected).unwrap(),
            r#"{"type":"connected"}"#
        );
    }

    #[test]
    fn test_inject_before_body_end() {
        let html = "<html><body><h1>Hi</h1></body></html>";
        let injected = inject_reload_client(html);

        let script = injected.find(RELOAD_PATH).unwrap();
        let body_end = injected.find("</body>").unwrap();
        assert!(script < body_end);
        assert!(injected.ends_with("</body></html>"));
    }

    #[tokio::test]
    async fn test_closed_side_stops_the_other() {
        let (held_tx, held_rx) = tokio::sync::oneshot::channel::<()>();
        let pending = tokio::spawn(async move {
            let _held = held_tx;
            std::future::pending::<()>().await;
        });
        let done = tokio::spawn(async {});

        first_to_finish(pending, done).await;

        // the aborted task drops its sender
        assert!(held_rx.await.is_err());
    }

    #[test]
    fn test_inject_without_body() {
        let injected = inject_reload_client("<p>fragment</p>");

        assert!(injected.starts_with("<p>fragment</p>"));
        assert!(injected.contains(RELOAD_PATH));
    }
}
