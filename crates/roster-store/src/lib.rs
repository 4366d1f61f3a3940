pub mod db;
pub mod error;
pub mod manager;
pub mod rules;
pub mod types;

pub use error::StoreError;
pub use manager::RosterStore;
pub use types::{EventSummary, NewEvent, Registered, Unregistered};
