//! Service registry
//!
//! Single source of truth, per environment, for service status and in-flight
//! control actions. Absorbs realtime events and reconciles them against
//! optimistic local state.

pub mod environment;
pub mod services;

pub use environment::{EnvironmentCache, PersistedEnvironment, STALENESS_THRESHOLD_SECS};
pub use services::ServiceRegistry;
