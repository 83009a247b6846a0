//! Reference archive - the oracle for model-based testing.
//!
//! Deliberately naive: one flat list of records and a key map, every query a
//! linear scan. No indices, no planned actions, nothing to keep consistent.
//! The cipher and the generator are reused as-is so ids, keys and ciphertexts
//! line up exactly with the real service.

use std::collections::BTreeMap;

use bytes::Bytes;
use tardis_core::{Address, ArchiveConfig, ArchiveError, KeyRecord, MessageId, MessageRecord};
use tardis_crypto::{DeterministicRng, RngState, encrypt, generate_key_string};

use super::operation::{
    IdTarget, KeyLength, Operation, OperationResult, SmallMessage, after_ts, caller_address,
    release_at,
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Stored records in insertion order, unmasked.
    pub messages: Vec<MessageRecord>,
    /// Every issued key, sorted by address.
    pub keys: Vec<(Address, KeyRecord)>,
    /// Generator state.
    pub rng_state: RngState,
}

/// Model archive - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelArchive {
    config: ArchiveConfig,
    rng: DeterministicRng,
    now: u64,
    messages: Vec<MessageRecord>,
    keys: BTreeMap<Address, KeyRecord>,
}

impl ModelArchive {
    /// Empty archive with the given seed, clock at `now`.
    pub fn new(config: ArchiveConfig, seed: RngState, now: u64) -> Self {
        Self {
            config,
            rng: DeterministicRng::new(seed),
            now,
            messages: Vec::new(),
            keys: BTreeMap::new(),
        }
    }

    /// Current model time.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Stored records.
    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    /// Current observable state.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            messages: self.messages.clone(),
            keys: self.keys.iter().map(|(a, k)| (a.clone(), k.clone())).collect(),
            rng_state: self.rng.state(),
        }
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        tracing::trace!(?op, now = self.now, "Model apply");

        match *op {
            Operation::GenerateKey { caller, length, force_new } => {
                OperationResult::KeyGenerated(self.generate_key(caller, length, force_new))
            },
            Operation::AddMessage { caller, content, release_offset, private } => {
                match self.add_message(caller, content, release_offset, private) {
                    Ok(record) => OperationResult::Added(record),
                    Err(err) => OperationResult::Rejected(err),
                }
            },
            Operation::AdvanceTime { millis } => {
                self.now += u64::from(millis);
                OperationResult::TimeAdvanced
            },
            Operation::GetById { target } => match self.get_by_id(target) {
                Ok(record) => OperationResult::Message(record),
                Err(err) => OperationResult::Rejected(err),
            },
            Operation::GetLastId { caller } => {
                let caller = caller_address(caller);
                OperationResult::LastId(
                    self.messages.iter().rev().find(|r| r.sender == caller).and_then(|r| r.id),
                )
            },
            Operation::FilterByAddress { caller, address } => {
                match self.filter(&caller_address(caller), address.map(caller_address)) {
                    Ok(records) => OperationResult::Messages(records),
                    Err(err) => OperationResult::Rejected(err),
                }
            },
            Operation::GetRecent { caller, count, after_back } => {
                OperationResult::Messages(self.recent(&caller_address(caller), count, after_back))
            },
            Operation::GetKey { caller } => OperationResult::Key(
                self.keys.get(&caller_address(caller)).filter(|k| k.expires > self.now).cloned(),
            ),
        }
    }

    fn generate_key(&mut self, caller: u8, length: KeyLength, force_new: bool) -> bool {
        let address = caller_address(caller);
        let expired = self.keys.get(&address).is_none_or(|k| k.expires < self.now);
        if !force_new && !expired {
            return true;
        }

        let length = match length.requested() {
            Some(n) if (1..=10_000).contains(&n) => n,
            _ => 1024,
        };
        let key = KeyRecord {
            value: generate_key_string(&mut self.rng, length),
            expires: self.now + self.config.key_expires_secs * 1000,
        };
        self.keys.insert(address, key);
        true
    }

    fn add_message(
        &mut self,
        caller: u8,
        content: SmallMessage,
        release_offset: i16,
        private: bool,
    ) -> Result<MessageRecord, ArchiveError> {
        let address = caller_address(caller);
        let plaintext = content.to_bytes();
        let key = self.keys.get(&address).map_or("", |k| k.value.as_str());
        let ciphertext = encrypt(&plaintext, key.as_bytes(), self.config.block_size());
        let release_ts = release_at(self.now, release_offset);

        if release_ts < self.now {
            return Err(ArchiveError::InvalidRelease { release_ts, now: self.now });
        }
        if ciphertext.is_empty() {
            return Err(ArchiveError::EmptyMessage);
        }
        if self.keys.get(&address).is_none_or(|k| k.expires < self.now) {
            return Err(ArchiveError::InvalidKeyState { address });
        }

        let id = MessageId::from_draw(self.rng.next());
        self.messages.push(MessageRecord {
            text: Bytes::from(plaintext),
            release_ts,
            send_ts: self.now,
            sender: address.clone(),
            id: Some(id),
            private,
        });

        Ok(MessageRecord {
            text: Bytes::from(ciphertext),
            release_ts,
            send_ts: self.now,
            sender: address,
            id: None,
            private,
        })
    }

    fn get_by_id(&self, target: IdTarget) -> Result<Option<MessageRecord>, ArchiveError> {
        let id = target.resolve(&self.messages);
        if id == 0 {
            return Err(ArchiveError::EmptyId);
        }

        // Newest record wins when ids collide.
        Ok(self
            .messages
            .iter()
            .rev()
            .find(|r| r.id == Some(MessageId::new(id)))
            .map(|r| self.masked(r)))
    }

    fn filter(
        &self,
        caller: &Address,
        address: Option<Address>,
    ) -> Result<Vec<MessageRecord>, ArchiveError> {
        let address = address.ok_or(ArchiveError::EmptyAddress)?;
        let own = *caller == address;

        let mut result = Vec::new();
        for record in self.messages.iter().rev() {
            if record.sender != address {
                continue;
            }
            if own {
                result.push(record.clone());
            } else if !record.private {
                result.push(self.masked(record));
            }
        }
        Ok(result)
    }

    fn recent(&self, caller: &Address, count: u8, after_back: Option<u16>) -> Vec<MessageRecord> {
        let after = after_ts(self.now, after_back).filter(|&ts| ts > 0);

        self.messages
            .iter()
            .rev()
            .filter(|r| !r.private || r.sender == *caller)
            .filter(|r| after.is_none_or(|ts| r.release_ts > ts))
            .filter(|r| r.release_ts <= self.now)
            .take(usize::from(count))
            .cloned()
            .collect()
    }

    fn masked(&self, record: &MessageRecord) -> MessageRecord {
        let mut record = record.clone();
        if record.release_ts > self.now {
            record.text = Bytes::new();
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelArchive {
        let seed = RngState::new(12_345_678_901, 98_765_432_109);
        ModelArchive::new(ArchiveConfig::default(), seed, 1_000)
    }

    const MSG: SmallMessage = SmallMessage { seed: 1, size_class: 1 };

    #[test]
    fn add_requires_key() {
        let mut model = model();
        let result = model.apply(&Operation::AddMessage {
            caller: 0,
            content: MSG,
            release_offset: 0,
            private: false,
        });
        assert_eq!(
            result,
            OperationResult::Rejected(ArchiveError::InvalidKeyState { address: caller_address(0) })
        );
    }

    #[test]
    fn time_lock_lifts() {
        let mut model = model();
        model.apply(&Operation::GenerateKey {
            caller: 0,
            length: KeyLength::Short,
            force_new: false,
        });
        let added = model.apply(&Operation::AddMessage {
            caller: 0,
            content: MSG,
            release_offset: 100,
            private: false,
        });
        assert!(matches!(added, OperationResult::Added(ref r) if r.id.is_none()));

        let get = Operation::GetById { target: IdTarget::Stored(0) };
        let OperationResult::Message(Some(early)) = model.apply(&get) else { panic!() };
        assert!(early.text.is_empty());

        model.apply(&Operation::AdvanceTime { millis: 100 });
        let OperationResult::Message(Some(late)) = model.apply(&get) else { panic!() };
        assert_eq!(late.text.as_ref(), MSG.to_bytes().as_slice());
    }
}
