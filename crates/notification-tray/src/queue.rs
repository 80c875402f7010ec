//! Busy lock with a FIFO of deferred mutations.
//!
//! Pure state machine; the tray drives it and emits the lock signals. The
//! tray only releases after a pass joined every transition it started, so no
//! item is moving at release time.

use std::collections::VecDeque;

/// Outcome of a release attempt.
#[derive(Debug, PartialEq)]
pub(crate) enum Release<M> {
    /// The lock was not held.
    Idle,
    /// The lock was released. `next` is the oldest deferred mutation, which
    /// now holds the lock.
    Released { next: Option<M> },
}

#[derive(Debug)]
pub(crate) struct MutationQueue<M> {
    busy: bool,
    pending: VecDeque<M>,
}

impl<M> Default for MutationQueue<M> {
    fn default() -> Self {
        Self {
            busy: false,
            pending: VecDeque::new(),
        }
    }
}

impl<M> MutationQueue<M> {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ask for the lock. Returns the mutation back when it may run now;
    /// otherwise it is deferred behind the ones already waiting.
    pub fn request(&mut self, mutation: M) -> Option<M> {
        if self.busy {
            self.pending.push_back(mutation);
            return None;
        }
        self.busy = true;
        Some(mutation)
    }

    /// Release the lock and hand it to the oldest deferred mutation.
    pub fn release(&mut self) -> Release<M> {
        if !self.busy {
            return Release::Idle;
        }
        self.busy = false;
        let next = self.pending.pop_front();
        if next.is_some() {
            self.busy = true;
        }
        Release::Released { next }
    }

    /// Take every deferred mutation, oldest first.
    pub fn drain(&mut self) -> Vec<M> {
        self.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_grants_when_free() {
        let mut queue = MutationQueue::default();
        assert_eq!(queue.request("add a"), Some("add a"));
        assert!(queue.is_busy());
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_requests_while_busy_are_deferred_in_order() {
        let mut queue = MutationQueue::default();
        assert!(queue.request("first").is_some());
        assert_eq!(queue.request("second"), None);
        assert_eq!(queue.request("third"), None);
        assert_eq!(queue.pending_len(), 2);

        assert_eq!(queue.release(), Release::Released { next: Some("second") });
        assert!(queue.is_busy());
        assert_eq!(queue.release(), Release::Released { next: Some("third") });
        assert_eq!(queue.release(), Release::Released { next: None });
        assert!(!queue.is_busy());
    }

    #[test]
    fn test_request_after_release_is_granted() {
        let mut queue = MutationQueue::default();
        queue.request(1);
        assert_eq!(queue.request(2), None);

        assert_eq!(queue.release(), Release::Released { next: Some(2) });
        assert_eq!(queue.release(), Release::Released { next: None });
        assert_eq!(queue.request(3), Some(3));
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_release_when_idle_is_noop() {
        let mut queue: MutationQueue<u8> = MutationQueue::default();
        assert_eq!(queue.release(), Release::Idle);
        assert!(!queue.is_busy());
    }

    #[test]
    fn test_drain_empties_pending() {
        let mut queue = MutationQueue::default();
        queue.request('a');
        queue.request('b');
        queue.request('c');

        assert_eq!(queue.drain(), vec!['b', 'c']);
        assert_eq!(queue.pending_len(), 0);
        assert!(queue.is_busy());
    }
}
