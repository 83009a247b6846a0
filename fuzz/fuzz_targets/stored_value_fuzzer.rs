//! Fuzz target for decoding stored values
//!
//! Harden value decoding against damaged databases.
//!
//! # Invariants
//!
//! - Decoding arbitrary bytes as any stored type returns a value or
//!   `StorageError::Serialization`
//! - NEVER panic on malformed input

#![no_main]

use libfuzzer_sys::fuzz_target;
use tardis_core::{KeyRecord, MessageRecord};
use tardis_crypto::RngState;
use tardis_server::{CborCodec, Codec, JsonCodec, StorageError};

fn check<C: Codec>(data: &[u8]) {
    for result in [
        C::decode::<MessageRecord>(data).map(drop),
        C::decode::<KeyRecord>(data).map(drop),
        C::decode::<RngState>(data).map(drop),
        C::decode::<Vec<u64>>(data).map(drop),
    ] {
        assert!(matches!(result, Ok(()) | Err(StorageError::Serialization(_))));
    }
}

fuzz_target!(|data: &[u8]| {
    check::<CborCodec>(data);
    check::<JsonCodec>(data);
});
