//! Keyed XOR stream cipher with ciphertext feedback.
//!
//! Each byte is XORed with the key (reused cyclically) and, once at least
//! `block_size` bytes have been produced, with the ciphertext byte
//! `block_size` positions earlier. Decryption mixes in the *incoming*
//! ciphertext, which makes the scheme self-synchronizing: a corrupted byte
//! garbles at most two plaintext positions.
//!
//! # Security Properties
//!
//! - Inverse: `decrypt(encrypt(m, k, b), k, b) == m` for all inputs
//! - Totality: neither direction can fail
//! - No integrity: tampering is not detected

/// Key byte for position `index`, cycling through `key`.
///
/// An empty key contributes nothing.
#[inline]
fn key_byte(key: &[u8], index: usize) -> u8 {
    if key.is_empty() { 0 } else { key[index % key.len()] }
}

/// Encrypt `plaintext` under `key`.
///
/// Feedback comes from the ciphertext already produced, so the output at
/// position `i` depends on the output at `i - block_size`. A `block_size` of 0
/// disables feedback.
pub fn encrypt(plaintext: &[u8], key: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(plaintext.len());

    for (i, &byte) in plaintext.iter().enumerate() {
        let mut ch = byte;
        if out.len() >= block_size && block_size > 0 {
            ch ^= out[i - block_size];
        }
        ch ^= key_byte(key, i);
        out.push(ch);
    }

    debug_assert_eq!(out.len(), plaintext.len());
    out
}

/// Decrypt `ciphertext` under `key`.
///
/// Exact inverse of [`encrypt`] for the same key and block size.
pub fn decrypt(ciphertext: &[u8], key: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(ciphertext.len());

    for (i, &byte) in ciphertext.iter().enumerate() {
        let mut ch = byte ^ key_byte(key, i);
        if out.len() >= block_size && block_size > 0 {
            ch ^= ciphertext[i - block_size];
        }
        out.push(ch);
    }

    debug_assert_eq!(out.len(), ciphertext.len());
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_vector() {
        let ciphertext = encrypt(b"hello, time-locked world", b"k3y", 5);
        assert_eq!(ciphertext, vec![
            3, 86, 21, 7, 92, 86, 29, 82, 23, 90, 0, 73, 85, 75, 64, 0, 31, 72, 0, 4, 22, 6, 23, 29
        ]);
        assert_eq!(decrypt(&ciphertext, b"k3y", 5), b"hello, time-locked world");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(encrypt(b"", b"key", 5).is_empty());
        assert!(decrypt(b"", b"key", 5).is_empty());
    }

    #[test]
    fn empty_key_is_identity_before_feedback() {
        assert_eq!(encrypt(b"abcd", b"", 5), b"abcd");
        assert_eq!(decrypt(b"abcd", b"", 5), b"abcd");
    }

    #[test]
    fn no_feedback_before_block_size() {
        // Shorter than the block: plain repeating-key XOR
        let ciphertext = encrypt(b"abc", &[1, 2], 5);
        assert_eq!(ciphertext, vec![b'a' ^ 1, b'b' ^ 2, b'c' ^ 1]);
    }

    #[test]
    fn feedback_uses_earlier_ciphertext() {
        let ciphertext = encrypt(b"aaaa", &[0], 2);
        // positions 2 and 3 fold in positions 0 and 1
        assert_eq!(ciphertext, vec![b'a', b'a', 0, 0]);
    }

    #[test]
    fn corrupted_byte_does_not_fail() {
        let mut ciphertext = encrypt(b"attack at dawn", b"secret", 5);
        ciphertext[3] ^= 0xff;

        let plaintext = decrypt(&ciphertext, b"secret", 5);
        assert_eq!(plaintext.len(), 14);
        assert_ne!(plaintext, b"attack at dawn");
        // self-synchronizing: only positions 3 and 3 + block_size differ
        assert_eq!(&plaintext[..3], b"att");
        assert_eq!(&plaintext[9..], b" dawn");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_decrypt_inverts_encrypt(
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
            key in prop::collection::vec(any::<u8>(), 0..64),
            block_size in 0usize..32,
        ) {
            let ciphertext = encrypt(&plaintext, &key, block_size);
            prop_assert_eq!(ciphertext.len(), plaintext.len());
            prop_assert_eq!(decrypt(&ciphertext, &key, block_size), plaintext);
        }

        #[test]
        fn prop_decrypt_is_total(
            ciphertext in prop::collection::vec(any::<u8>(), 0..512),
            key in prop::collection::vec(any::<u8>(), 0..64),
            block_size in 0usize..32,
        ) {
            let plaintext = decrypt(&ciphertext, &key, block_size);
            prop_assert_eq!(encrypt(&plaintext, &key, block_size), ciphertext);
        }
    }
}
