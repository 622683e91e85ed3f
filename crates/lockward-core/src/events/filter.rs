// ── Filter predicates for event registrations ──

use crate::model::LockEvent;

/// Predicate half of a bus registration.
pub enum EventFilter {
    All,
    /// Events raised by one device. Events without a serial never match.
    Device(String),
    Custom(Box<dyn Fn(&LockEvent) -> bool + Send + Sync>),
}

impl EventFilter {
    pub fn matches(&self, event: &LockEvent) -> bool {
        match self {
            Self::All => true,
            Self::Device(serial) => event.sensor_serial.as_deref() == Some(serial.as_str()),
            Self::Custom(f) => f(event),
        }
    }
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Device(serial) => f.debug_tuple("Device").field(serial).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LockEventKind;

    #[test]
    fn device_filter_matches_only_its_serial() {
        let filter = EventFilter::Device("lock-1".into());

        assert!(filter.matches(&LockEvent::new(LockEventKind::Locked, Some("lock-1".into()))));
        assert!(!filter.matches(&LockEvent::new(LockEventKind::Locked, Some("lock-2".into()))));
        assert!(!filter.matches(&LockEvent::new(LockEventKind::Locked, None)));
    }

    #[test]
    fn custom_filter_runs_closure() {
        let filter = EventFilter::Custom(Box::new(|e| e.kind == LockEventKind::Fault));

        assert!(filter.matches(&LockEvent::new(LockEventKind::Fault, None)));
        assert!(!filter.matches(&LockEvent::new(LockEventKind::Unlocked, None)));
    }
}
