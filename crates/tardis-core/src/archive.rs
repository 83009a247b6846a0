//! Append-only message archive with derived indices.
//!
//! Records are addressed by position (insertion order). Two indices are
//! maintained alongside: message id to position, and sender to the ordered
//! list of that sender's positions.
//!
//! # Invariants
//!
//! - A record at position `k` never changes once a later record exists
//! - The archive length only grows
//! - Every indexed position is `< len()`
//! - A sender's position list is strictly increasing
//!
//! # Visibility
//!
//! A record whose `release_ts` is after "now" is returned with empty text.
//! The by-address listing exempts the sender when they list their own
//! address; the by-id lookup does not exempt anyone.

use std::collections::HashMap;

use crate::types::{Address, MessageId, MessageRecord};

/// Ordered record store plus id and sender indices.
#[derive(Debug, Clone, Default)]
pub struct MessageArchive {
    records: Vec<MessageRecord>,
    id_index: HashMap<MessageId, u64>,
    address_index: HashMap<Address, Vec<u64>>,
}

impl MessageArchive {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive rebuilt from stored parts.
    ///
    /// Callers should check [`is_consistent()`](Self::is_consistent) before
    /// serving reads from a rebuilt archive.
    pub fn from_parts(
        records: Vec<MessageRecord>,
        id_index: HashMap<MessageId, u64>,
        address_index: HashMap<Address, Vec<u64>>,
    ) -> Self {
        Self { records, id_index, address_index }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was ever appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position the next appended record will occupy.
    pub fn next_position(&self) -> u64 {
        self.records.len() as u64
    }

    /// Stored record at `position` (unmasked).
    pub fn get(&self, position: u64) -> Option<&MessageRecord> {
        usize::try_from(position).ok().and_then(|idx| self.records.get(idx))
    }

    /// All stored records in insertion order (unmasked).
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Position routed to by `id`.
    pub fn position_of(&self, id: MessageId) -> Option<u64> {
        self.id_index.get(&id).copied()
    }

    /// Positions of `address`'s messages, oldest first.
    pub fn positions_for(&self, address: &Address) -> &[u64] {
        self.address_index.get(address).map_or(&[], Vec::as_slice)
    }

    /// Id index entries.
    pub fn id_index(&self) -> &HashMap<MessageId, u64> {
        &self.id_index
    }

    /// Address index entries.
    pub fn address_index(&self) -> &HashMap<Address, Vec<u64>> {
        &self.address_index
    }

    /// Append `record` at `position`.
    ///
    /// # Invariants
    ///
    /// - Pre: `position == next_position()` (storage has already enforced it)
    /// - Post: `len()` grew by exactly one
    pub fn append(&mut self, position: u64, record: MessageRecord) {
        debug_assert_eq!(position, self.next_position());
        self.records.push(record);
    }

    /// Route `id` to `position`, replacing any previous route.
    pub fn index_id(&mut self, id: MessageId, position: u64) {
        self.id_index.insert(id, position);
    }

    /// Replace `sender`'s position list.
    pub fn index_sender(&mut self, sender: Address, positions: Vec<u64>) {
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        self.address_index.insert(sender, positions);
    }

    /// Check that every index entry points at a matching record.
    pub fn is_consistent(&self) -> bool {
        let ids_ok = self.id_index.values().all(|&pos| self.get(pos).is_some());

        let senders_ok = self.address_index.iter().all(|(sender, positions)| {
            positions.windows(2).all(|w| w[0] < w[1])
                && positions
                    .iter()
                    .all(|&pos| self.get(pos).is_some_and(|record| &record.sender == sender))
        });

        ids_ok && senders_ok
    }

    /// Record routed to by `id`, masked if unreleased at `now`.
    pub fn get_by_id(&self, id: MessageId, now: u64) -> Option<MessageRecord> {
        let position = self.position_of(id)?;
        self.get(position).map(|record| record.visible_at(now))
    }

    /// Id of `address`'s most recent message.
    pub fn last_id_for(&self, address: &Address) -> Option<MessageId> {
        let position = *self.positions_for(address).last()?;
        self.get(position).and_then(|record| record.id)
    }

    /// Messages sent by `address`, most recent first.
    ///
    /// When `caller` is `address` everything is returned as stored. Any other
    /// caller gets private messages removed and unreleased text masked.
    pub fn filter_by_address(
        &self,
        caller: &Address,
        address: &Address,
        now: u64,
    ) -> Vec<MessageRecord> {
        let own = caller == address;

        self.positions_for(address)
            .iter()
            .rev()
            .filter_map(|&pos| self.get(pos))
            .filter(|record| own || !record.private)
            .map(|record| if own { record.clone() } else { record.visible_at(now) })
            .collect()
    }

    /// Up to `count` released messages, newest first.
    ///
    /// Private messages are only included for their sender. With `after_ts`
    /// set, only messages released strictly after it are considered.
    pub fn recent(
        &self,
        caller: &Address,
        count: usize,
        after_ts: Option<u64>,
        now: u64,
    ) -> Vec<MessageRecord> {
        if count == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(count.min(self.records.len()));
        for record in self.records.iter().rev() {
            if record.private && &record.sender != caller {
                continue;
            }
            if after_ts.is_some_and(|ts| record.release_ts <= ts) {
                continue;
            }
            if record.is_released(now) {
                result.push(record.clone());
            }
            if result.len() >= count {
                break;
            }
        }
        result
    }
}
