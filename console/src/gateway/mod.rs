//! Backend gateway client
//!
//! The gateway (local daemon or remote host agent) is the source of truth
//! for services and project rows. Everything the console tracks locally is
//! reconciled against fetches from here.

pub mod client;
pub mod responses;

pub use client::{GatewayApi, GatewayClient};
