//! Viewer-side state: the live roster and the presence badge.
//!
//! Both are fed exclusively by channel frames. Nothing here talks to storage.

pub mod presence;
pub mod reducer;

pub use presence::PresenceCounter;
pub use reducer::{IgnoreReason, Outcome, RosterView};
