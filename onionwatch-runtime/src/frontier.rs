//! Crawl frontier
//!
//! Owns the pending set and the set of addresses already claimed (stored at
//! startup or dispatched since). `offer` checks both synchronously, which is
//! what keeps an address from being dispatched twice.

use std::collections::{HashSet, VecDeque};

use onionwatch_core::Address;

/// Discovered-but-unfetched addresses
#[derive(Debug, Default)]
pub struct Frontier {
    pending: VecDeque<Address>,
    pending_set: HashSet<Address>,
    claimed: HashSet<Address>,
}

impl Frontier {
    /// Start from the addresses the store already holds
    pub fn new(stored: HashSet<Address>) -> Self {
        Self {
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            claimed: stored,
        }
    }

    /// Queue an address unless it is pending, dispatched or stored
    pub fn offer(&mut self, address: Address) -> bool {
        if self.claimed.contains(&address) || self.pending_set.contains(&address) {
            return false;
        }
        self.pending_set.insert(address.clone());
        self.pending.push_back(address);
        true
    }

    /// Offer many addresses, returning how many were queued
    pub fn offer_all(&mut self, addresses: impl IntoIterator<Item = Address>) -> usize {
        addresses
            .into_iter()
            .filter(|address| self.offer(address.clone()))
            .count()
    }

    /// Take up to `n` pending addresses. Taken addresses are claimed and
    /// will never be queued again.
    pub fn next_batch(&mut self, n: usize) -> Vec<Address> {
        let take = n.min(self.pending.len());
        let batch: Vec<Address> = self.pending.drain(..take).collect();

        for address in &batch {
            self.pending_set.remove(address);
            self.claimed.insert(address.clone());
        }

        batch
    }

    pub fn is_pending(&self, address: &Address) -> bool {
        self.pending_set.contains(address)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::normalize(s)
    }

    #[test]
    fn test_offer_rejects_duplicates() {
        let mut frontier = Frontier::default();
        assert!(frontier.offer(addr("a.onion")));
        assert!(!frontier.offer(addr("a.onion")));
        assert!(!frontier.offer(addr("http://a.onion")));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_offer_rejects_stored() {
        let stored: HashSet<_> = [addr("a.onion")].into_iter().collect();
        let mut frontier = Frontier::new(stored);
        assert!(!frontier.offer(addr("a.onion")));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_next_batch_drains_in_order() {
        let mut frontier = Frontier::default();
        assert_eq!(frontier.offer_all(["a.onion", "b.onion", "c.onion"].map(addr)), 3);

        let first = frontier.next_batch(2);
        assert_eq!(first, vec![addr("a.onion"), addr("b.onion")]);
        assert_eq!(frontier.len(), 1);

        let second = frontier.next_batch(10);
        assert_eq!(second, vec![addr("c.onion")]);
        assert!(frontier.next_batch(10).is_empty());
    }

    #[test]
    fn test_dispatched_never_requeued() {
        let mut frontier = Frontier::default();
        frontier.offer(addr("a.onion"));
        let batch = frontier.next_batch(1);

        assert!(!frontier.is_pending(&batch[0]));
        assert!(!frontier.offer(addr("a.onion")));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_batches_never_overlap() {
        let mut frontier = Frontier::default();
        frontier.offer_all((0..25).map(|i| addr(&format!("site{}.onion", i))));

        let mut seen = HashSet::new();
        loop {
            let batch = frontier.next_batch(10);
            if batch.is_empty() {
                break;
            }
            for address in batch {
                assert!(seen.insert(address));
            }
        }
        assert_eq!(seen.len(), 25);
    }
}
