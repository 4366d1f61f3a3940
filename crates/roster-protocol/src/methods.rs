// Well-known WS method and event names shared by gateway and viewers.

// methods (client -> server)
pub const PING: &str = "ping";
pub const ROSTER_REGISTER: &str = "roster.register";
pub const ROSTER_CANCEL: &str = "roster.cancel";

// events (server -> client)
pub const INSCRIPTION: &str = "inscription";
pub const REMOVAL: &str = "removal";
pub const PRESENCE: &str = "presence";
pub const SNAPSHOT: &str = "snapshot";
pub const TICK: &str = "tick";
