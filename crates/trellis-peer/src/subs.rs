//! Subscription bookkeeping and the shared mute list.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::transport::MsgId;

/// One live subscription held on behalf of a remote peer.
///
/// `from_msg_id` is the inbound fetch's id (what the remote will name in an
/// unsubscribe); `original_msg_id` is the id of whatever downstream
/// subscription fulfils it (a storage query, a forwarded fetch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Inbound fetch message id.
    pub from_msg_id: MsgId,
    /// Downstream message id to cancel on unsubscribe.
    pub original_msg_id: MsgId,
    /// Key the subscription was established for.
    pub target_public_key: Vec<u8>,
}

/// Table of live subscriptions, keyed by `(from_msg_id, target_public_key)`.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    entries: Arc<Mutex<Vec<Subscription>>>,
}

impl Subscriptions {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription.
    pub fn add(&self, subscription: Subscription) {
        self.entries.lock().push(subscription);
    }

    /// Remove and return the subscription matching an unsubscribe.
    pub fn remove(&self, from_msg_id: MsgId, target_public_key: &[u8]) -> Option<Subscription> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|s| {
            s.from_msg_id == from_msg_id && s.target_public_key == target_public_key
        })?;
        Some(entries.remove(position))
    }

    /// Point an existing subscription at a new downstream id.
    ///
    /// Used by a forwarder: the inbound fetch was recorded against itself
    /// before the downstream request existed.
    pub fn update_original(
        &self,
        from_msg_id: MsgId,
        target_public_key: &[u8],
        original_msg_id: MsgId,
    ) -> bool {
        let mut entries = self.entries.lock();
        for entry in entries.iter_mut() {
            if entry.from_msg_id == from_msg_id && entry.target_public_key == target_public_key {
                entry.original_msg_id = original_msg_id;
                return true;
            }
        }
        false
    }

    /// Remove every subscription (channel teardown).
    pub fn drain(&self) -> Vec<Subscription> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Current number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Message ids whose store-time notifications are suppressed.
///
/// Shared between a forwarder and an auto-fetcher on the same transport so
/// that a store triggered by a fetched result does not echo back as a
/// change notification. An id appears at most once; removal is by value and
/// stable.
#[derive(Debug, Clone, Default)]
pub struct MuteList {
    ids: Arc<Mutex<Vec<MsgId>>>,
}

impl MuteList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id; duplicates are ignored.
    pub fn add(&self, msg_id: MsgId) {
        let mut ids = self.ids.lock();
        if !ids.contains(&msg_id) {
            ids.push(msg_id);
        }
    }

    /// Remove an id if present.
    pub fn remove(&self, msg_id: MsgId) {
        let mut ids = self.ids.lock();
        if let Some(position) = ids.iter().position(|id| *id == msg_id) {
            ids.remove(position);
        }
    }

    /// Snapshot for embedding into a store request.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.ids.lock().iter().map(|id| id.to_vec()).collect()
    }

    /// Whether an id is currently muted.
    #[must_use]
    pub fn contains(&self, msg_id: MsgId) -> bool {
        self.ids.lock().contains(&msg_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriptions_match_on_id_and_key() {
        let subs = Subscriptions::new();
        let from = MsgId::random();
        let original = MsgId::random();
        subs.add(Subscription {
            from_msg_id: from,
            original_msg_id: original,
            target_public_key: vec![1; 32],
        });

        assert!(subs.remove(from, &[2; 32]).is_none());
        let found = subs.remove(from, &[1; 32]).unwrap();
        assert_eq!(found.original_msg_id, original);
        assert!(subs.is_empty());
    }

    #[test]
    fn mute_list_dedups_and_removes_stably() {
        let mutes = MuteList::new();
        let a = MsgId::from_bytes([1; 8]);
        let b = MsgId::from_bytes([2; 8]);
        mutes.add(a);
        mutes.add(b);
        mutes.add(a);
        assert_eq!(mutes.snapshot().len(), 2);

        mutes.remove(a);
        assert!(!mutes.contains(a));
        assert!(mutes.contains(b));
        assert_eq!(mutes.snapshot(), vec![b.to_vec()]);
    }
}
