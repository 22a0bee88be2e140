//! Filename-keyed prefix de-obfuscation.
//!
//! A few payload classes ship with a bounded window of their bytes obscured
//! by a rolling one-byte keystream seeded from the entry's stored name.
//! This is content obfuscation, not encryption: the "key" is derived from
//! public metadata and the recurrence is a fixed affine step.  It must be
//! reproduced bit-for-bit (including 8-bit wraparound) and never
//! strengthened.
//!
//! The transform subtracts the keystream from up to [`KEY_SPAN`] bytes
//! starting at a per-extension offset.  It never changes the buffer length,
//! and reapplying it does not undo it — this is a keyed subtraction
//! sequence, not an involution.

/// Number of bytes a single keystream pass touches at most.
pub const KEY_SPAN: usize = 0x100;

/// Starting offset of the obscured window for a recognized name, or `None`
/// when the entry is stored in the clear.
fn key_pos(name: &str) -> Option<usize> {
    if has_ext(name, ".wav") {
        Some(0)
    } else if has_ext(name, ".jpg") {
        Some(0x1100)
    } else if has_ext(name, ".scr") {
        Some(0x1000)
    } else {
        None
    }
}

fn has_ext(name: &str, ext: &str) -> bool {
    let (n, e) = (name.as_bytes(), ext.as_bytes());
    n.len() >= e.len() && n[n.len() - e.len()..].eq_ignore_ascii_case(e)
}

/// Keystream seed: the mod-256 sum of the stored name's raw bytes.
pub fn name_key(name_bytes: &[u8]) -> u8 {
    name_bytes.iter().fold(0u8, |key, &b| key.wrapping_add(b))
}

/// Remove the obfuscation from an entry's bytes, in place.
///
/// `seed` is the [`name_key`] of the stored name.  A window that starts at
/// or beyond the end of `data` leaves the buffer untouched.
pub fn decode_prefix(name: &str, seed: u8, data: &mut [u8]) {
    let Some(pos) = key_pos(name) else {
        return;
    };
    if pos >= data.len() {
        return;
    }
    let mut key = seed;
    for byte in data[pos..].iter_mut().take(KEY_SPAN) {
        *byte = byte.wrapping_sub(key);
        key = key.wrapping_mul(0x6D).wrapping_sub(0x25);
    }
}
