//! Key strings rendered from generator output.

use crate::rng::DeterministicRng;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Render `value` in base 36 (lowercase, `-` prefix for negatives).
pub fn to_base36(value: i64) -> String {
    let mut magnitude = value.unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(14);
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();

    // Only ASCII digits, letters and '-' were pushed
    digits.into_iter().map(char::from).collect()
}

/// Generate a key string of `length - 1` characters.
///
/// Draws from `rng` and appends base-36 renderings until at least `length`
/// characters exist, then keeps the first `length - 1`. The dropped last
/// character is long-standing behavior that stored keys depend on, so a
/// request for 1024 characters yields 1023.
pub fn generate_key_string(rng: &mut DeterministicRng, length: usize) -> String {
    let mut key = String::with_capacity(length + 16);
    while key.len() < length {
        key.push_str(&to_base36(rng.next()));
    }
    key.truncate(length.saturating_sub(1));
    key
}
