//! Fixed-capacity FIFO for conditioned entropy bytes.
//!
//! Bytes are wiped as soon as they are handed out, and the whole backing
//! store is wiped on drop.

use zeroize::Zeroize;

/// Default pool capacity in bytes.
pub const DEFAULT_POOL_CAPACITY: usize = 4096;

/// Smallest capacity accepted; large enough for one DRBG seed plus nonce.
pub const MIN_POOL_CAPACITY: usize = 64;

pub struct EntropyPool {
    slots: Box<[u8]>,
    /// Index of the oldest stored byte.
    start: usize,
    /// Number of stored bytes.
    filled: usize,
}

impl EntropyPool {
    /// Capacity is raised to `MIN_POOL_CAPACITY` if smaller.
    pub fn new(capacity: usize) -> Self {
        EntropyPool {
            slots: vec![0u8; capacity.max(MIN_POOL_CAPACITY)].into_boxed_slice(),
            start: 0,
            filled: 0,
        }
    }

    /// Append as much of `data` as fits. Returns the number of bytes stored.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let cap = self.capacity();
        let take = data.len().min(cap - self.filled);
        for (i, &byte) in data[..take].iter().enumerate() {
            let slot = (self.start + self.filled + i) % cap;
            self.slots[slot] = byte;
        }
        self.filled += take;
        take
    }

    /// Move up to `out.len()` of the oldest bytes into `out`.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let cap = self.capacity();
        let take = out.len().min(self.filled);
        for dst in out[..take].iter_mut() {
            *dst = self.slots[self.start];
            self.slots[self.start].zeroize();
            self.start = (self.start + 1) % cap;
        }
        self.filled -= take;
        if self.filled == 0 {
            self.start = 0;
        }
        take
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for EntropyPool {
    fn drop(&mut self) {
        self.slots.zeroize();
    }
}
