pub mod composer;
pub mod error;
pub mod relay;

pub use composer::NotificationComposer;
pub use error::{ComposeError, RelayError};
pub use relay::{HttpRelay, MessageId, NullRelay, OutboundMessage, Relay, RelayStatus};
