//! Match State Hashing
//!
//! A replay is only trusted if the rebuilt match hashes exactly like the
//! recorded one after every frame. Floats go in by bit pattern, strings are
//! length-prefixed and every field is written in a fixed order, so two hashes
//! agree only when the states are bit-identical.

use sha2::{Digest, Sha256};

use super::geometry::Point;

/// SHA-256 digest of a match state or action log.
pub type StateHash = [u8; 32];

/// Domain tag of per-frame match state hashes.
const STATE_DOMAIN: &[u8] = b"TD_SIM_STATE_V1";

/// Feeds simulation values into SHA-256 in a fixed encoding.
pub struct StateHasher {
    inner: Sha256,
}

impl StateHasher {
    /// Start a hash under `domain`.
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update(domain);
        Self { inner }
    }

    /// Single byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.inner.update([value]);
    }

    /// Little-endian.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.inner.update(value.to_le_bytes());
    }

    /// Little-endian. Used for "-1 means none" fields.
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.inner.update(value.to_le_bytes());
    }

    /// Bit pattern, so `-0.0` and `0.0` differ.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// `x` then `y`.
    #[inline]
    pub fn update_point(&mut self, point: Point) {
        self.update_f32(point.x);
        self.update_f32(point.y);
    }

    /// One byte, 0 or 1.
    #[inline]
    pub fn update_bool(&mut self, flag: bool) {
        self.update_u8(u8::from(flag));
    }

    /// Length-prefixed, so adjacent names cannot run together.
    pub fn update_str(&mut self, text: &str) {
        self.update_u32(text.len() as u32);
        self.inner.update(text.as_bytes());
    }

    /// Consume the hasher.
    pub fn finalize(self) -> StateHash {
        self.inner.finalize().into()
    }
}

/// Hash an opaque blob under its own domain tag.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = StateHasher::new(domain);
    hasher.inner.update(data);
    hasher.finalize()
}

/// Hash one frame of a match.
///
/// The frame number goes first; `add_state` writes everything else.
pub fn compute_state_hash<F>(frame: u32, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::new(STATE_DOMAIN);
    hasher.update_u32(frame);
    add_state(&mut hasher);
    hasher.finalize()
}
