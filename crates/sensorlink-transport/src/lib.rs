//! `sensorlink-transport` – The Emulator Link
//!
//! Owns the WebSocket connection to the emulator and reports what happens to
//! it without caring about the bytes it carries.
//!
//! # Modules
//!
//! - [`client`] – [`TransportClient`]: one connection's lifecycle
//!   (`Connecting → Open → Closed`), ordered fire-and-forget sends, and the
//!   periodic liveness probe.
//! - [`bus`] – [`LinkEventBus`]: broadcast channel carrying the `open`,
//!   `message`, `error` and `close` notifications to any number of listeners.
//! - [`probe`] – [`LivenessProbe`] and the HTTP `HEAD` implementation used to
//!   detect that the hosting page has gone away.

pub mod bus;
pub mod client;
pub mod probe;

pub use bus::{LinkEventBus, LinkEventSubscriber};
pub use client::{
    ConnectOptions, EmulatorAddr, TransportClient, DEFAULT_PROBE_INTERVAL, MIN_PROBE_INTERVAL,
};
pub use probe::{HttpHeadProbe, LivenessProbe};
