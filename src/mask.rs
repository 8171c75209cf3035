//! Payload masking as required for client-to-server frames.
//!
//! Masking XORs payload byte `i` with key byte `i % 4`. The operation is its
//! own inverse, so the same routine serves for masking and unmasking.

/// Mask or unmask a payload in place.
#[inline]
pub fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        // operating on whole words keeps the hot loop branch-free
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(word ^ u32::from_ne_bytes(mask)).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
