//! Settings and durable state storage

pub mod layout;
pub mod settings;
pub mod state_file;

pub use layout::StorageLayout;
pub use settings::Settings;
pub use state_file::{PersistedState, StateFile};
