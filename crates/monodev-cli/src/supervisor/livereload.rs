// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Live reload over a WebSocket.

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::{broadcast, watch};

/// Path of the live reload socket.
pub const SOCKET_PATH: &str = "/__livereload";

const CLIENT_SCRIPT: &str = r#"
<script>
(function() {
    const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
    const ws = new WebSocket(protocol + '//' + window.location.host + '/__livereload');
    ws.onmessage = function(event) {
        if (event.data === 'reload') {
            window.location.reload();
        }
    };
    ws.onclose = function() {
        setTimeout(function() { window.location.reload(); }, 1000);
    };
})();
</script>
"#;

/// Inserts the reload client before `</body>` (or `</html>`, or at the end).
pub fn inject_client(html: &str) -> String {
    let lower = html.to_lowercase();
    match lower.rfind("</body>").or_else(|| lower.rfind("</html>")) {
        Some(pos) => {
            let mut result = html.to_string();
            result.insert_str(pos, CLIENT_SCRIPT);
            result
        }
        None => format!("{}{}", html, CLIENT_SCRIPT),
    }
}

/// Forwards reload signals to one browser until it leaves or the server stops.
pub async fn handle_websocket(
    mut socket: WebSocket,
    mut reload_rx: broadcast::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = reload_rx.recv() => match result {
                Ok(()) => {
                    if socket.send(Message::Text("reload".to_string())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
            },
            _ = shutdown.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
