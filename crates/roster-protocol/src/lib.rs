pub mod events;
pub mod frames;
pub mod methods;

pub use events::{ChannelEvent, DecodeError, Inscription, PresencePayload, Removal, RosterEvent, SnapshotPayload};
pub use frames::{ErrorShape, EventFrame, InboundFrame, ReqFrame, ResFrame};
