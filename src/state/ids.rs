use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use uuid::{Builder, Uuid};

use crate::state::clock::Clock;

/// Shared counter so two generators in the same process never hand out the same id.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Produces process-unique, time-ordered identifiers for locally created events.
///
/// Ids use the UUIDv7 layout: the leading 48 bits hold the clock millis and the
/// following bits a process-wide counter, so ids sort by creation order.
#[derive(Clone)]
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
}

impl IdGenerator {
    /// Build a generator reading timestamps from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> Uuid {
        let millis = self.clock.now();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

        let mut tail = [0u8; 10];
        tail[..8].copy_from_slice(&sequence.to_be_bytes());
        tail[8..].copy_from_slice(&rand::random::<[u8; 2]>());

        Builder::from_unix_timestamp_millis(millis, &tail).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::state::clock::ManualClock;

    #[test]
    fn ids_are_unique_within_the_same_millisecond() {
        let generator = IdGenerator::new(ManualClock::new(42));
        let ids = (0..500).map(|_| generator.next_id()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn ids_follow_creation_order() {
        let clock = ManualClock::new(1_000);
        let generator = IdGenerator::new(clock.clone());
        let first = generator.next_id();
        let second = generator.next_id();
        clock.advance(std::time::Duration::from_millis(1));
        let third = generator.next_id();

        assert!(first < second);
        assert!(second < third);
        assert_eq!(first.get_version_num(), 7);
    }
}
