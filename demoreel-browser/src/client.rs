//! CDP WebSocket client
//!
//! One client per browser process. Commands are correlated with responses
//! through a shared pending-request map; a background task drains the
//! socket.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::BrowserError;
use crate::page::Page;
use crate::protocol::{CdpMessage, CdpRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// A command waiting for its response.
pub(crate) struct PendingRequest {
    pub tx: oneshot::Sender<Result<Value, BrowserError>>,
}

/// Connection to one Chrome instance's debugging socket.
pub struct CdpClient {
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    request_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the browser-level WebSocket URL Chrome printed at startup.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed(format!("{}: {}", ws_url, e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let ws_tx = Arc::new(tokio::sync::Mutex::new(ws_sink));
        let pending: Arc<Mutex<HashMap<u64, PendingRequest>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let recv_task = {
            let pending = pending.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending).await;
            })
        };

        debug!("cdp client connected to {}", ws_url);

        Ok(Self {
            ws_tx,
            request_id: Arc::new(AtomicU64::new(1)),
            pending,
            _recv_task: recv_task,
        })
    }

    async fn receive_loop(
        mut ws_source: WsSource,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    ) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("cdp recv: {}", text);
                    match serde_json::from_str::<CdpMessage>(&text) {
                        Ok(resp) => {
                            if let Some(id) = resp.id {
                                let pending_req = pending.lock().remove(&id);
                                if let Some(req) = pending_req {
                                    let result = if let Some(error) = resp.error {
                                        Err(BrowserError::Protocol {
                                            code: error.code,
                                            message: error.message,
                                        })
                                    } else {
                                        Ok(resp.result.unwrap_or(Value::Null))
                                    };
                                    let _ = req.tx.send(result);
                                }
                            }
                            // Events are not routed; page waits poll state
                            // through Runtime.evaluate instead.
                        }
                        Err(e) => warn!("failed to parse cdp message: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("cdp websocket closed");
                    break;
                }
                Err(e) => {
                    error!("cdp websocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    /// Send a command and wait for its response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("cdp send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BrowserError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(BrowserError::Timeout(format!("{} timed out", method)))
            }
        }
    }

    /// Create a blank page target and attach a flat session to it.
    pub async fn new_page(self: &Arc<Self>) -> Result<Page, BrowserError> {
        let created = self
            .call(
                "Target.createTarget",
                Some(json!({"url": "about:blank"})),
                None,
            )
            .await?;
        let target_id = created["targetId"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing targetId".to_string()))?
            .to_string();

        let attached = self
            .call(
                "Target.attachToTarget",
                Some(json!({"targetId": target_id, "flatten": true})),
                None,
            )
            .await?;
        let session_id = attached["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::InvalidResponse("missing sessionId".to_string()))?
            .to_string();

        let page = Page::new(target_id, session_id, Arc::clone(self));
        page.enable_domains().await?;
        Ok(page)
    }

    /// Close a page target.
    pub async fn close_page(&self, target_id: &str) -> Result<(), BrowserError> {
        self.call(
            "Target.closeTarget",
            Some(json!({"targetId": target_id})),
            None,
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_increment() {
        let id = AtomicU64::new(1);
        assert_eq!(id.fetch_add(1, Ordering::SeqCst), 1);
        assert_eq!(id.fetch_add(1, Ordering::SeqCst), 2);
        assert_eq!(id.load(Ordering::SeqCst), 3);
    }
}
