use roster_protocol::events::{ChannelEvent, PresencePayload};
use roster_protocol::frames::EventFrame;

/// Live viewer count of one event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceCounter {
    count: usize,
}

impl PresenceCounter {
    /// Seed with the count delivered alongside the snapshot.
    pub fn new(initial: usize) -> Self {
        Self { count: initial }
    }

    pub fn apply(&mut self, payload: &PresencePayload) {
        self.count = payload.subscription_count;
    }

    /// Apply a frame if it is a presence update. Returns whether it was one.
    pub fn apply_frame(&mut self, frame: &EventFrame) -> bool {
        match ChannelEvent::decode(frame) {
            Ok(ChannelEvent::Presence(p)) => {
                self.apply(&p);
                true
            }
            Ok(ChannelEvent::Snapshot(s)) => {
                self.count = s.subscription_count;
                true
            }
            _ => false,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The viewer is the only subscriber (or the count has not arrived yet).
    pub fn is_alone(&self) -> bool {
        self.count <= 1
    }

    pub fn label(&self) -> String {
        if self.is_alone() {
            "You are alone".to_string()
        } else {
            format!("{} viewers connected", self.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_follows_count() {
        let mut counter = PresenceCounter::new(1);
        assert!(counter.is_alone());
        assert_eq!(counter.label(), "You are alone");

        counter.apply(&PresencePayload { subscription_count: 3 });
        assert_eq!(counter.count(), 3);
        assert_eq!(counter.label(), "3 viewers connected");
    }

    #[test]
    fn only_presence_frames_change_the_count() {
        let mut counter = PresenceCounter::new(2);
        let tick = EventFrame::new("tick", serde_json::json!({ "ts": 1 }));
        assert!(!counter.apply_frame(&tick));
        assert_eq!(counter.count(), 2);

        let frame = PresencePayload { subscription_count: 5 }.to_frame();
        assert!(counter.apply_frame(&frame));
        assert_eq!(counter.count(), 5);
    }
}
