//! Event queue for winding lifecycle notifications

use crate::state::WindingState;

#[derive(Debug, Clone, PartialEq)]
pub enum WindingEvent {
    StateChanged { from: WindingState, to: WindingState },
    ChainCreated { particles: usize },
    SegmentAdded { total: u32 },
    LimitReached { segments: u32 },
    Finalized { particles: usize },
    BridgeFault { message: String, fatal: bool },
}

/// A simple event queue the controller pushes to and the host drains
pub struct EventBus {
    events: Vec<WindingEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: WindingEvent) {
        self.events.push(event);
    }

    /// Drain all events from the bus, returning them
    pub fn drain(&mut self) -> Vec<WindingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut bus = EventBus::new();
        assert!(bus.is_empty());

        bus.push(WindingEvent::SegmentAdded { total: 1 });
        bus.push(WindingEvent::StateChanged {
            from: WindingState::Idle,
            to: WindingState::Filling,
        });
        assert_eq!(bus.len(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(bus.is_empty());
        assert!(bus.drain().is_empty());
    }
}
