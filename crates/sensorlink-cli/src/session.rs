//! The REPL's single emulator link.
//!
//! [`Session`] owns at most one [`TransportClient`] at a time and the bus its
//! notifications travel on. The REPL runs on a plain thread; every async step
//! is driven through the runtime [`Handle`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use colored::Colorize;
use sensorlink_feed::{FeedSettings, SensorFeed};
use sensorlink_transport::{
    ConnectOptions, EmulatorAddr, HttpHeadProbe, LinkEventBus, TransportClient,
};
use sensorlink_types::{ConnectionState, Frame, LinkError, LinkEventKind, Sample};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// How long `/connect` waits for the socket to open.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a disconnect waits for the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Session {
    runtime: Handle,
    bus: Arc<LinkEventBus>,
    link: Mutex<Option<Arc<TransportClient>>>,
}

impl Session {
    /// Create the session and start printing link notifications.
    pub fn new(runtime: Handle) -> Self {
        let bus = Arc::new(LinkEventBus::default());
        runtime.spawn(print_link_events(bus.subscribe()));
        Self {
            runtime,
            bus,
            link: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<TransportClient>>> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace any existing link with a new connection to `addr`.
    ///
    /// Returns `Ok(true)` once the socket is open, `Ok(false)` when it failed
    /// or did not open within the connect timeout.
    pub fn connect(
        &self,
        addr: &EmulatorAddr,
        page_origin: Option<&str>,
        probe_interval: Duration,
    ) -> Result<bool, LinkError> {
        self.disconnect();

        let mut options = ConnectOptions::default().with_probe_interval(probe_interval);
        if let Some(origin) = page_origin {
            let probe = HttpHeadProbe::for_interval(origin, probe_interval)?;
            options = options.with_probe(Arc::new(probe));
        }

        let client = {
            let _guard = self.runtime.enter();
            Arc::new(TransportClient::connect(addr, Arc::clone(&self.bus), options))
        };
        *self.slot() = Some(Arc::clone(&client));
        info!(url = client.url(), probing = page_origin.is_some(), "connecting to emulator");

        let opened = self
            .runtime
            .block_on(async { tokio::time::timeout(CONNECT_TIMEOUT, client.wait_open()).await })
            .unwrap_or(false);
        if !opened {
            client.close();
        }
        Ok(opened)
    }

    /// Close the current link, if any, and wait briefly for it to finish.
    /// Returns `false` when there was nothing to close.
    pub fn disconnect(&self) -> bool {
        let Some(client) = self.slot().take() else {
            return false;
        };
        client.close();
        let _ = self
            .runtime
            .block_on(async { tokio::time::timeout(CLOSE_TIMEOUT, client.wait_closed()).await });
        true
    }

    /// URL and state of the current link.
    pub fn status(&self) -> Option<(String, ConnectionState)> {
        self.slot()
            .as_ref()
            .map(|c| (c.url().to_string(), c.state()))
    }

    fn open_link(&self) -> Result<Arc<TransportClient>, LinkError> {
        match self.slot().as_ref() {
            Some(client) if client.is_open() => Ok(Arc::clone(client)),
            Some(_) => Err(LinkError::Transport("link is not open".into())),
            None => Err(LinkError::Transport("not connected (use /connect)".into())),
        }
    }

    /// Send ready-made frames in order.
    pub fn send_frames(&self, frames: &[Frame]) -> Result<(), LinkError> {
        let client = self.open_link()?;
        for frame in frames {
            debug!(channel = ?frame.channel(), bytes = frame.len(), "sending frame");
            client.send(frame);
        }
        Ok(())
    }

    /// Play `samples` through a [`SensorFeed`] at the motion cadence.
    ///
    /// Sample `i` is stamped `i * motion_throttle` after the start so the
    /// throttle and batcher see the recording's nominal timing even when the
    /// timer runs late. Returns the number of frames sent.
    pub fn replay(&self, samples: &[Sample], settings: FeedSettings) -> Result<u64, LinkError> {
        let client = self.open_link()?;
        let period = settings.motion_throttle.max(Duration::from_millis(1));
        let mut feed = SensorFeed::new(client, settings);

        self.runtime.block_on(async move {
            let start = Instant::now();
            let mut ticker = tokio::time::interval(period);
            let mut stamp = start;
            for sample in samples {
                ticker.tick().await;
                if !feed.sink().is_open() {
                    return Err(LinkError::Transport("link closed during replay".into()));
                }
                feed.on_motion(*sample, stamp)?;
                stamp += period;
            }
            feed.flush(stamp)?;
            Ok(feed.frames_sent())
        })
    }

    /// Close the link from a signal handler thread.
    pub fn shutdown(&self) {
        if self.disconnect() {
            info!("link closed on shutdown");
        }
    }
}

/// Read a text file into a string with a readable error.
pub fn read_text(path: &Path) -> Result<String, LinkError> {
    std::fs::read_to_string(path)
        .map_err(|e| LinkError::Parse(format!("cannot read {}: {e}", path.display())))
}

async fn print_link_events(mut events: broadcast::Receiver<sensorlink_types::LinkEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.kind {
                LinkEventKind::Open => {
                    println!("\n  {} link open", "●".green().bold());
                }
                LinkEventKind::Message(bytes) => {
                    println!("\n  {} {} byte(s) from emulator", "◂".dimmed(), bytes.len());
                }
                LinkEventKind::Error(message) => {
                    println!("\n  {} {}", "✗".red().bold(), message.red());
                }
                LinkEventKind::Close(info) => {
                    let code = info.code.map(|c| format!(" [{c}]")).unwrap_or_default();
                    println!(
                        "\n  {} link closed{}: {}",
                        "○".yellow().bold(),
                        code,
                        info.reason.dimmed()
                    );
                }
            },
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
