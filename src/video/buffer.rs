//! Single-slot "latest wins" work buffer
//!
//! At most one item is in flight and at most one waits behind it. An item
//! offered while another is pending replaces it, so a slow stage never
//! builds a backlog regardless of how fast items arrive.

/// Drop-latest single-slot buffer
#[derive(Debug)]
pub struct DropLatest<T> {
    busy: bool,
    pending: Option<T>,
    dropped: u64,
}

impl<T> Default for DropLatest<T> {
    fn default() -> Self {
        Self {
            busy: false,
            pending: None,
            dropped: 0,
        }
    }
}

impl<T> DropLatest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a new item.
    ///
    /// Returns the item back when the stage is idle and the caller should
    /// start working on it now. Otherwise the item is parked in the slot,
    /// replacing any item already waiting there.
    #[must_use]
    pub fn offer(&mut self, item: T) -> Option<T> {
        if !self.busy {
            self.busy = true;
            return Some(item);
        }
        if self.pending.replace(item).is_some() {
            self.dropped += 1;
        }
        None
    }

    /// Finish the in-flight item; returns the next one to start, if any
    #[must_use]
    pub fn complete(&mut self) -> Option<T> {
        let next = self.pending.take();
        self.busy = next.is_some();
        next
    }

    /// The in-flight item failed: go idle and discard whatever was waiting
    pub fn abandon(&mut self) {
        self.busy = false;
        if self.pending.take().is_some() {
            self.dropped += 1;
        }
    }

    /// Discard the waiting item. The in-flight item is unaffected, and
    /// its `complete` then reports nothing to start.
    pub fn discard_pending(&mut self) -> bool {
        let discarded = self.pending.take().is_some();
        if discarded {
            self.dropped += 1;
        }
        discarded
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Items discarded in favor of newer ones
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_idle_offer_starts_immediately() {
        let mut slot = DropLatest::new();
        assert_eq!(slot.offer(1), Some(1));
        assert!(slot.is_busy());
        assert_eq!(slot.complete(), None);
        assert!(!slot.is_busy());
    }

    #[test]
    fn test_newest_pending_wins() {
        let mut slot = DropLatest::new();
        assert_eq!(slot.offer("f1"), Some("f1"));

        // f2 and f3 arrive while f1 decodes
        assert_eq!(slot.offer("f2"), None);
        assert_eq!(slot.offer("f3"), None);
        assert_eq!(slot.dropped(), 1);

        assert_eq!(slot.complete(), Some("f3"));
        assert!(slot.is_busy());
        assert_eq!(slot.complete(), None);
    }

    #[test]
    fn test_pending_started_after_completion() {
        let mut slot = DropLatest::new();
        assert_eq!(slot.offer(1), Some(1));
        assert_eq!(slot.offer(2), None);
        assert_eq!(slot.complete(), Some(2));

        // 3 arrives during 2's work and is the next to run
        assert_eq!(slot.offer(3), None);
        assert_eq!(slot.complete(), Some(3));
        assert_eq!(slot.complete(), None);
        assert_eq!(slot.dropped(), 0);
    }

    #[test]
    fn test_abandon_clears_pending() {
        let mut slot = DropLatest::new();
        assert_eq!(slot.offer(1), Some(1));
        assert_eq!(slot.offer(2), None);

        slot.abandon();
        assert!(!slot.is_busy());
        assert!(!slot.has_pending());
        assert_eq!(slot.offer(3), Some(3));
    }

    #[test]
    fn test_discard_pending_keeps_in_flight() {
        let mut slot = DropLatest::new();
        assert_eq!(slot.offer(1), Some(1));
        assert_eq!(slot.offer(2), None);

        assert!(slot.discard_pending());
        assert!(!slot.discard_pending());
        assert!(slot.is_busy());
        assert_eq!(slot.dropped(), 1);

        // Still busy with 1, so nothing new starts until it completes
        assert_eq!(slot.offer(3), None);
        assert!(slot.discard_pending());
        assert_eq!(slot.complete(), None);
        assert!(!slot.is_busy());
    }

    proptest! {
        /// Whatever the interleaving, processed items are increasing, the
        /// newest offered item is never lost and nothing queues past one slot.
        #[test]
        fn prop_latest_always_processed(events in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut slot = DropLatest::new();
            let mut in_flight: Option<u32> = None;
            let mut processed = Vec::new();
            let mut next_id = 0u32;

            for offer in events {
                if offer {
                    next_id += 1;
                    if let Some(start) = slot.offer(next_id) {
                        prop_assert!(in_flight.is_none());
                        in_flight = Some(start);
                    }
                } else if let Some(done) = in_flight.take() {
                    processed.push(done);
                    in_flight = slot.complete();
                }
            }
            while let Some(done) = in_flight.take() {
                processed.push(done);
                in_flight = slot.complete();
            }

            prop_assert!(processed.windows(2).all(|w| w[0] < w[1]));
            if next_id > 0 {
                prop_assert_eq!(processed.last().copied(), Some(next_id));
            }
            prop_assert_eq!(processed.len() as u64 + slot.dropped(), next_id as u64);
        }
    }
}
