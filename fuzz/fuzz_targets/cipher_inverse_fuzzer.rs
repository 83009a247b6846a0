//! Fuzz target for the feedback stream cipher
//!
//! # Invariants
//!
//! - `decrypt(encrypt(m, k, b), k, b) == m` for every input
//! - Ciphertext length equals plaintext length
//! - Decrypting arbitrary bytes never panics (there is no integrity check)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tardis_crypto::{decrypt, encrypt};

#[derive(Debug, Arbitrary)]
struct Input {
    message: Vec<u8>,
    key: Vec<u8>,
    block_size: u8,
}

fuzz_target!(|input: Input| {
    let block_size = usize::from(input.block_size);

    let ciphertext = encrypt(&input.message, &input.key, block_size);
    assert_eq!(ciphertext.len(), input.message.len());
    assert_eq!(decrypt(&ciphertext, &input.key, block_size), input.message);

    let garbage = decrypt(&input.message, &input.key, block_size);
    assert_eq!(garbage.len(), input.message.len());
});
