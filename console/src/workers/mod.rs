//! Background workers

pub mod poller;
pub mod realtime;
