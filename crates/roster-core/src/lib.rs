pub mod config;
pub mod error;
pub mod registration;
pub mod types;

pub use error::RosterError;
pub use registration::{Cancellation, Registration, ValidationError};
pub use types::{Address, Event, EventId, EventStatus, Player, PlayerRef, TeamSlot, Teams};
