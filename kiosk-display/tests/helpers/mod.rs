//! In-process controller and media host for integration tests
//!
//! One axum server plays both remote roles: `/ws` is the controller's
//! WebSocket endpoint, `/media/:file` serves generated `<id3>.jpg` (PNG
//! bytes) and `<id3>.mp3` (WAV bytes) resources.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use kiosk_common::events::PlaybackPhase;
use kiosk_common::AssetId;
use kiosk_display::config::DisplayConfig;
use kiosk_display::diagnostics::DiagnosticsLog;
use kiosk_display::media::HttpFetcher;
use kiosk_display::playback::ClockOutput;
use kiosk_display::state::SharedState;
use kiosk_display::Session;

/// Length of every served audio clip
pub const CLIP_SECS: u32 = 1;
const SAMPLE_RATE: u32 = 8000;

struct HostState {
    current: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    received: mpsc::UnboundedSender<String>,
    connections: AtomicUsize,
    refusing: AtomicBool,
    media_requests: AtomicUsize,
    kick: broadcast::Sender<()>,
    missing: Mutex<HashSet<String>>,
}

/// Running controller + media host
pub struct TestController {
    addr: SocketAddr,
    host: Arc<HostState>,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    task: JoinHandle<()>,
}

impl TestController {
    pub async fn start() -> Self {
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let (kick, _) = broadcast::channel(4);
        let host = Arc::new(HostState {
            current: Mutex::new(None),
            received: received_tx,
            connections: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            media_requests: AtomicUsize::new(0),
            kick,
            missing: Mutex::new(HashSet::new()),
        });

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/media/:file", get(media_handler))
            .with_state(Arc::clone(&host));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            host,
            received: tokio::sync::Mutex::new(received_rx),
            task,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn media_url(&self) -> String {
        format!("http://{}/media", self.addr)
    }

    /// Config pointing a display at this host, with short test timings
    pub fn display_config(&self, catalog_size: u16) -> DisplayConfig {
        DisplayConfig {
            controller_url: self.ws_url(),
            media_base_url: self.media_url(),
            catalog_size,
            max_concurrent_fetches: 2,
            audio_timeout_ms: 2000,
            reconnect_interval_ms: 200,
            progress_interval_ms: 50,
            http_timeout_ms: 5000,
            auto_unlock: false,
        }
    }

    /// Serve 404 for `file` (e.g. `"002.jpg"`)
    pub fn remove_media(&self, file: &str) {
        self.host.missing.lock().unwrap().insert(file.to_string());
    }

    /// Send a text frame to the connected display
    pub fn send_text(&self, text: &str) -> bool {
        match self.host.current.lock().unwrap().as_ref() {
            Some(tx) => tx.send(Message::Text(text.to_string())).is_ok(),
            None => false,
        }
    }

    /// Drop the current connection without a close frame
    pub fn drop_connection(&self) {
        let _ = self.host.kick.send(());
    }

    /// Answer new WebSocket upgrades with 503 while `refuse` is set
    pub fn refuse_connections(&self, refuse: bool) {
        self.host.refusing.store(refuse, Ordering::SeqCst);
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.host.connections.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.host.current.lock().unwrap().is_some()
    }

    pub fn media_requests(&self) -> usize {
        self.host.media_requests.load(Ordering::SeqCst)
    }

    /// Next text frame received from the display
    pub async fn next_received(&self, timeout: Duration) -> Option<String> {
        let mut rx = self.received.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }
}

impl Drop for TestController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(host): State<Arc<HostState>>) -> Response {
    if host.refusing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, host))
}

async fn serve_socket(socket: WebSocket, host: Arc<HostState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut kick = host.kick.subscribe();
    *host.current.lock().unwrap() = Some(tx.clone());
    host.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = host.received.send(text);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(out) = rx.recv() => {
                if sink.send(out).await.is_err() {
                    break;
                }
            }
            _ = kick.recv() => break,
        }
    }

    let mut current = host.current.lock().unwrap();
    if current.as_ref().is_some_and(|c| c.same_channel(&tx)) {
        *current = None;
    }
}

async fn media_handler(Path(file): Path<String>, State(host): State<Arc<HostState>>) -> Response {
    host.media_requests.fetch_add(1, Ordering::SeqCst);
    if host.missing.lock().unwrap().contains(&file) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if file.ends_with(".jpg") {
        ([(header::CONTENT_TYPE, "image/png")], png_bytes()).into_response()
    } else if file.ends_with(".mp3") {
        ([(header::CONTENT_TYPE, "audio/wav")], wav_bytes(CLIP_SECS)).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Silent mono WAV of `secs` seconds
pub fn wav_bytes(secs: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..SAMPLE_RATE * secs {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::new(8, 6);
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}

/// Start a display session against `controller`
pub fn start_session(
    controller: &TestController,
    catalog_size: u16,
    diagnostics: DiagnosticsLog,
) -> Session {
    let config = controller.display_config(catalog_size);
    let fetcher = Arc::new(HttpFetcher::new(config.http_timeout()).unwrap());
    let output = Arc::new(ClockOutput::new(config.progress_interval()));
    Session::start(config, fetcher, output, diagnostics).unwrap()
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until the display reaches `phase`
pub async fn wait_for_phase(state: &SharedState, phase: PlaybackPhase, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if state.phase().await == phase {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until the display shows `id` as active
pub async fn wait_for_current(state: &SharedState, id: AssetId, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if state.current_id().await == Some(id) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
