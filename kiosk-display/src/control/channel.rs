//! Control channel client
//!
//! Keeps one WebSocket connection to the remote controller open for the
//! lifetime of the display. Inbound text frames are parsed into commands and
//! forwarded to the playback controller; completion events travel back out.
//!
//! Reconnection is unconditional: after any close or failed attempt the
//! channel waits `reconnect_interval` and tries again, forever. Outbound
//! events are bound to the connection they were sent on and are never
//! queued across a reconnect.

use crate::playback::{ControllerHandle, EventSink};
use crate::state::SharedState;
use futures::{SinkExt, StreamExt};
use kiosk_common::{Command, OutboundEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Longest frame excerpt written to a diagnostic
const FRAME_EXCERPT_LEN: usize = 80;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Outbound = Option<mpsc::UnboundedSender<OutboundEvent>>;
type OutboundSlot = Arc<Mutex<Outbound>>;

/// Cloneable send/close side of the channel
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: OutboundSlot,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ChannelHandle {
    /// Whether a connection is currently open
    pub fn is_open(&self) -> bool {
        self.lock_outbound().is_some()
    }

    /// Close the connection and stop reconnecting
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Outbound> {
        lock_slot(&self.outbound)
    }
}

impl EventSink for ChannelHandle {
    /// Send on the current connection; dropped with a warning when there is none
    fn send(&self, event: OutboundEvent) {
        let outbound = self.lock_outbound();
        match outbound.as_ref() {
            Some(tx) if tx.send(event).is_ok() => debug!("Queued {}", event.to_json()),
            _ => warn!(
                "Dropping {}: control channel not connected",
                event.to_json()
            ),
        }
    }
}

/// Reconnecting WebSocket client
pub struct ControlChannel {
    url: String,
    reconnect_interval: Duration,
    state: Arc<SharedState>,
    outbound: OutboundSlot,
    shutdown: watch::Receiver<bool>,
}

impl ControlChannel {
    pub fn new(
        url: &str,
        reconnect_interval: Duration,
        state: Arc<SharedState>,
    ) -> (Self, ChannelHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let outbound: OutboundSlot = Arc::new(Mutex::new(None));
        let handle = ChannelHandle {
            outbound: Arc::clone(&outbound),
            shutdown: Arc::new(shutdown_tx),
        };
        let channel = Self {
            url: url.to_string(),
            reconnect_interval,
            state,
            outbound,
            shutdown: shutdown_rx,
        };
        (channel, handle)
    }

    /// Connect, serve, and reconnect until closed
    pub async fn run(mut self, commands: ControllerHandle) {
        info!("Control channel starting for {}", self.url);
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let attempt = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = self.shutdown.changed() => break,
            };
            match attempt {
                Ok((ws, _response)) => {
                    info!("Connected to controller at {}", self.url);
                    self.serve(ws, &commands).await;
                }
                Err(e) => warn!("Connection to {} failed: {}", self.url, e),
            }
            self.state.set_controller_connected(false);

            if *self.shutdown.borrow() {
                break;
            }
            info!("Reconnecting in {:?}", self.reconnect_interval);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_interval) => {}
                _ = self.shutdown.changed() => break,
            }
        }
        info!("Control channel stopped");
    }

    async fn serve(&mut self, ws: WsStream, commands: &ControllerHandle) {
        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.lock_outbound() = Some(tx);
        self.state.set_controller_connected(true);

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => dispatch(&text, commands).await,
                    Some(Ok(Message::Binary(bytes))) => {
                        warn!("Ignoring binary frame ({} bytes)", bytes.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Controller closed the connection: {:?}", frame);
                        break;
                    }
                    // Ping/pong are answered by the protocol layer
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Control channel error: {}", e);
                        break;
                    }
                    None => {
                        info!("Control channel stream ended");
                        break;
                    }
                },
                Some(event) = rx.recv() => {
                    if let Err(e) = write.send(Message::Text(event.to_json())).await {
                        warn!("Failed to send {}: {}", event.to_json(), e);
                        break;
                    }
                    debug!("Sent {}", event.to_json());
                }
                _ = self.shutdown.changed() => {
                    // Best effort; the peer may already be gone
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        *self.lock_outbound() = None;
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Outbound> {
        lock_slot(&self.outbound)
    }
}

fn lock_slot(slot: &OutboundSlot) -> MutexGuard<'_, Outbound> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parse one text frame and forward it; bad frames are logged and dropped
async fn dispatch(text: &str, commands: &ControllerHandle) {
    match Command::parse(text) {
        Ok(command) => {
            debug!("Received {:?}", command);
            if let Err(e) = commands.command(command).await {
                error!("Cannot deliver {:?}: {}", command, e);
            }
        }
        Err(e) => warn!("Discarding frame {:?}: {}", excerpt(text), e),
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(FRAME_EXCERPT_LEN) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
