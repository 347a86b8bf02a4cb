//! WebSocket transport.
//!
//! The socket lives on a background tokio runtime. Outbound frames travel over
//! an unbounded tokio channel; everything the socket does is reported back to
//! the UI thread as `TransportEvent`s on a std channel.

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Runtime;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::{Transport, TransportEvent};
use crate::protocol::{CLOSE_ABNORMAL, CLOSE_NORMAL};

/// Close code used when the peer sent a close frame without a status
const CLOSE_NO_STATUS: u16 = 1005;

/// How long dropping the transport waits for the close handshake
const CLOSE_GRACE: Duration = Duration::from_millis(500);

enum Outbound {
    Text(String),
    Close(u16),
}

pub struct WsTransport {
    url: String,
    runtime: Runtime,
    events: mpsc::Sender<TransportEvent>,
    outbound: Option<tokio_mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, events: mpsc::Sender<TransportEvent>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("lv-transport")
            .enable_all()
            .build()
            .context("Failed to start transport runtime")?;
        Ok(Self {
            url: url.into(),
            runtime,
            events,
            outbound: None,
            task: None,
        })
    }
}

impl Transport for WsTransport {
    fn open(&mut self, attempt: u64) -> Result<()> {
        // Dropping the previous sender ends that connection's task
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        self.outbound = Some(tx);
        let url = self.url.clone();
        let events = self.events.clone();
        self.task = Some(self.runtime.spawn(run_connection(url, attempt, rx, events)));
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<()> {
        let outbound = self.outbound.as_ref().context("No open connection")?;
        outbound
            .send(Outbound::Text(text))
            .map_err(|_| anyhow::anyhow!("Connection task has ended"))
    }

    fn close(&mut self, code: u16) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Outbound::Close(code));
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        // Let the socket task finish its close handshake before the runtime goes
        self.outbound = None;
        if let Some(task) = self.task.take() {
            let _ = self
                .runtime
                .block_on(async { tokio::time::timeout(CLOSE_GRACE, task).await });
        }
    }
}

async fn run_connection(
    url: String,
    attempt: u64,
    mut outbound: tokio_mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::warn!(attempt, url = %url, error = %e, "websocket connect failed");
            let _ = events.send(TransportEvent::Closed {
                attempt,
                code: CLOSE_ABNORMAL,
            });
            return;
        }
    };
    tracing::debug!(attempt, url = %url, "websocket open");
    let _ = events.send(TransportEvent::Opened { attempt });

    let (mut sink, mut stream) = ws.split();
    let code = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::warn!(attempt, error = %e, "websocket send failed");
                        break CLOSE_ABNORMAL;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break code;
                }
                // Transport replaced or dropped
                None => {
                    let _ = sink.close().await;
                    break CLOSE_NORMAL;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message {
                        attempt,
                        text: text.to_string(),
                    });
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message { attempt, text });
                    }
                    Err(_) => tracing::warn!(attempt, "ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or(CLOSE_NO_STATUS, |f| u16::from(f.code));
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "websocket error");
                    break CLOSE_ABNORMAL;
                }
                None => break CLOSE_ABNORMAL,
            },
        }
    };

    tracing::debug!(attempt, code, "websocket closed");
    let _ = events.send(TransportEvent::Closed { attempt, code });
}
