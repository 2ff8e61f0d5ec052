//! [`TransportClient`] – one WebSocket connection to the emulator.
//!
//! ```text
//!   Connecting ──open──▶ Open ──close / error / probe failure──▶ Closed
//!        └────────────── connect failure / close() ─────────────────┘
//! ```
//!
//! The socket, the probe timer and the connection state are owned by a
//! single driver task. The handle only enqueues commands, so frames reach the
//! socket in exactly the order [`TransportClient::send`] was called and
//! teardown never interleaves with a write.
//!
//! Every way a connection can end (a local `close()`, a peer close, a socket
//! error, a failed liveness probe) runs through the same teardown: stop the
//! probe, mark the state `Closed`, publish one `close` event, drop the socket.
//! A closed client is inert; construct a new one to reconnect.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sensorlink_transport::{ConnectOptions, EmulatorAddr, LinkEventBus, TransportClient};
//! use sensorlink_types::{CalibrationState, Heading};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = Arc::new(LinkEventBus::default());
//!     let mut events = bus.subscribe();
//!     let client = TransportClient::connect(
//!         &EmulatorAddr::new("127.0.0.1", 12344),
//!         Arc::clone(&bus),
//!         ConnectOptions::default(),
//!     );
//!     if client.wait_open().await {
//!         let frame = sensorlink_wire::compass_frame(Heading(90.0), CalibrationState::Calibrated)
//!             .expect("valid compass frame");
//!         client.send(&frame);
//!     }
//!     client.close();
//!     while let Ok(event) = events.recv().await {
//!         println!("{}", event.kind.name());
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use sensorlink_types::{
    CloseInfo, ConnectionState, Frame, FrameSink, LinkError, LinkEvent, LinkEventKind,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::bus::LinkEventBus;
use crate::probe::LivenessProbe;

/// Period of the liveness probe while a connection is open.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(2000);

/// Shortest probe period; smaller values are raised to this.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

// ────────────────────────────────────────────────────────────────────────────
// Public configuration types
// ────────────────────────────────────────────────────────────────────────────

/// Host and port of the emulator's WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorAddr {
    pub host: String,
    pub port: u16,
}

impl EmulatorAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `ws://<host>:<port>/`
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for EmulatorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Optional behaviour for a connection.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Run this probe every `probe_interval` while the connection is open.
    /// `None` disables probing.
    pub probe: Option<Arc<dyn LivenessProbe>>,
    pub probe_interval: Duration,
}

impl ConnectOptions {
    /// Builder-style: enable the liveness probe.
    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Builder-style: override the probe period, raised to at least
    /// [`MIN_PROBE_INTERVAL`].
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval.max(MIN_PROBE_INTERVAL);
        self
    }

    fn effective_probe_interval(&self) -> Duration {
        self.probe_interval.max(MIN_PROBE_INTERVAL)
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            probe: None,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("probe", &self.probe.as_ref().map(|_| "<probe>"))
            .field("probe_interval", &self.probe_interval)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client handle
// ────────────────────────────────────────────────────────────────────────────

enum Command {
    Send(Vec<u8>),
    Close,
}

/// Handle to a single emulator connection.
///
/// Dropping the handle closes the connection.
pub struct TransportClient {
    url: String,
    state: watch::Receiver<ConnectionState>,
    close_requested: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<Command>,
}

impl TransportClient {
    /// Start connecting to `addr` and return immediately.
    ///
    /// Lifecycle notifications are published on `bus`; subscribe before
    /// calling this to be sure to see the `open` event.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(addr: &EmulatorAddr, bus: Arc<LinkEventBus>, options: ConnectOptions) -> Self {
        let url = addr.url();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let close_requested = Arc::new(AtomicBool::new(false));

        let driver = Driver {
            url: url.clone(),
            source: format!("sensorlink-transport::{url}"),
            bus,
            state: state_tx,
            close_requested: Arc::clone(&close_requested),
            commands: command_rx,
            options,
        };
        tokio::spawn(driver.run());

        Self {
            url,
            state,
            close_requested,
            commands,
        }
    }

    /// The `ws://` URL this client dials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open && !self.close_requested.load(Ordering::SeqCst)
    }

    /// Transmit `frame` as one binary message.
    ///
    /// Silently does nothing unless the connection is open: frames are never
    /// queued for a connection that is still connecting, and sending on a
    /// closed client is not an error.
    pub fn send(&self, frame: &Frame) {
        if !self.is_open() {
            trace!(url = %self.url, state = ?self.state(), "dropping frame on non-open link");
            return;
        }
        let _ = self.commands.send(Command::Send(frame.as_bytes().to_vec()));
    }

    /// Close the connection. Idempotent.
    ///
    /// No send is accepted and no liveness probe fires once this returns.
    /// The `close` event follows asynchronously.
    pub fn close(&self) {
        if self.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.state() == ConnectionState::Closed {
            return;
        }
        debug!(url = %self.url, "close requested");
        let _ = self.commands.send(Command::Close);
    }

    /// Wait until the connection leaves `Connecting`; `true` if it opened.
    pub async fn wait_open(&self) -> bool {
        let mut state = self.state.clone();
        match state.wait_for(|s| *s != ConnectionState::Connecting).await {
            Ok(s) => *s == ConnectionState::Open,
            Err(_) => false,
        }
    }

    /// Wait until the connection is `Closed`.
    ///
    /// The driver always publishes `Closed` before it goes away, so a
    /// dropped channel also means closed.
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }
}

impl FrameSink for TransportClient {
    fn send_frame(&self, frame: &Frame) {
        self.send(frame);
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.close();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver task
// ────────────────────────────────────────────────────────────────────────────

struct Driver {
    url: String,
    source: String,
    bus: Arc<LinkEventBus>,
    state: watch::Sender<ConnectionState>,
    close_requested: Arc<AtomicBool>,
    commands: mpsc::UnboundedReceiver<Command>,
    options: ConnectOptions,
}

impl Driver {
    fn emit(&self, kind: LinkEventKind) {
        if let Err(e) = self.bus.publish(LinkEvent::new(self.source.clone(), kind)) {
            trace!(error = %e, "link event had no listeners");
        }
    }

    async fn run(mut self) {
        debug!(url = %self.url, "connecting");

        let ws = tokio::select! {
            result = connect_async(self.url.as_str()) => match result {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    let err = LinkError::Transport(format!("connect to {}: {e}", self.url));
                    warn!(url = %self.url, error = %err, "connection failed");
                    self.emit(LinkEventKind::Error(err.to_string()));
                    self.teardown(CloseInfo::new(None, err.to_string()));
                    return;
                }
            },
            _ = wait_for_close(&mut self.commands) => {
                self.teardown(CloseInfo::new(None, "closed before open"));
                return;
            }
        };

        if self.close_requested.load(Ordering::SeqCst) {
            let (mut sink, _) = ws.split();
            let _ = sink.close().await;
            self.teardown(CloseInfo::new(None, "closed before open"));
            return;
        }

        self.state.send_replace(ConnectionState::Open);
        info!(url = %self.url, "emulator connection established");
        self.emit(LinkEventKind::Open);

        let (mut sink, mut stream) = ws.split();
        let mut probe_timer = self.options.probe.as_ref().map(|_| {
            let period = self.options.effective_probe_interval();
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel::<LinkError>();
        let mut probe_in_flight: Option<JoinHandle<()>> = None;

        let close_info = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(bytes)) => {
                        trace!(bytes = bytes.len(), "sending frame");
                        if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                            let err = LinkError::Transport(format!("send failed: {e}"));
                            warn!(url = %self.url, error = %err, "socket error");
                            self.emit(LinkEventKind::Error(err.to_string()));
                            break CloseInfo::new(None, err.to_string());
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = sink.close().await;
                        break CloseInfo::new(Some(1000), "closed by client");
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Binary(data))) => {
                        self.emit(LinkEventKind::Message(data.to_vec()));
                    }
                    Some(Ok(Message::Text(text))) => {
                        self.emit(LinkEventKind::Message(text.as_str().as_bytes().to_vec()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => CloseInfo::new(Some(u16::from(f.code)), f.reason.as_str()),
                            None => CloseInfo::new(None, "closed by peer"),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let err = LinkError::Transport(format!("receive failed: {e}"));
                        warn!(url = %self.url, error = %err, "socket error");
                        self.emit(LinkEventKind::Error(err.to_string()));
                        break CloseInfo::new(None, err.to_string());
                    }
                    None => break CloseInfo::new(None, "connection dropped"),
                },
                _ = next_tick(&mut probe_timer) => {
                    if self.close_requested.load(Ordering::SeqCst) {
                        continue;
                    }
                    if probe_in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                        trace!("previous liveness probe still running");
                        continue;
                    }
                    if let Some(probe) = self.options.probe.as_ref() {
                        let probe = Arc::clone(probe);
                        let tx = probe_tx.clone();
                        probe_in_flight = Some(tokio::spawn(async move {
                            if let Err(e) = probe.check().await {
                                let _ = tx.send(e);
                            }
                        }));
                    }
                },
                Some(err) = probe_rx.recv() => {
                    warn!(url = %self.url, error = %err, "liveness probe failed, closing link");
                    self.close_requested.store(true, Ordering::SeqCst);
                    let _ = sink.close().await;
                    break CloseInfo::new(None, err.to_string());
                }
            }
        };

        drop(probe_timer);
        if let Some(handle) = probe_in_flight.take() {
            handle.abort();
        }
        self.teardown(close_info);
    }

    /// The single exit path of every connection. Runs at most once.
    fn teardown(&self, info: CloseInfo) {
        self.close_requested.store(true, Ordering::SeqCst);
        if self.state.send_replace(ConnectionState::Closed) == ConnectionState::Closed {
            return;
        }
        info!(url = %self.url, code = ?info.code, reason = %info.reason, "emulator connection closed");
        self.emit(LinkEventKind::Close(info));
    }
}

impl Drop for Driver {
    // Reached without a prior teardown only when the task was aborted or
    // panicked.
    fn drop(&mut self) {
        if *self.state.borrow() != ConnectionState::Closed {
            warn!(url = %self.url, "link driver stopped unexpectedly");
            self.teardown(CloseInfo::new(None, "link driver stopped"));
        }
    }
}

async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, Command::Close) {
            return;
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}
