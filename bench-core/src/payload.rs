//! Synthetic payload construction

/// Build a payload of `size` bytes, every byte set to `filler`
pub fn build(size: usize, filler: u8) -> Vec<u8> {
    vec![filler; size]
}

/// Last byte of a buffer, `None` when it is empty
pub fn last_byte(bytes: &[u8]) -> Option<u8> {
    bytes.last().copied()
}
