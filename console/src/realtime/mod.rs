//! Realtime event bridge
//!
//! One public channel per environment pushes status-changed events over a
//! WebSocket. The registry and tracker consume the typed envelopes in
//! `events`; nothing outside this module touches the transport.

pub mod channels;
pub mod client;
pub mod events;

pub use client::{ConnectionMonitor, ConnectionState, RealtimeClient};
pub use events::RealtimeEvent;
