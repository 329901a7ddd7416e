//! Pooled, zeroizing byte buffers for handshake scratch data.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut, RangeBounds};
use std::vec::Drain;

use zeroize::Zeroize;

/// Pool of reusable buffers.
///
/// Handshake scratch buffers hold key material in flight, so buffers are
/// zeroized before they go back into the pool.
#[derive(Default)]
pub struct BufferPool {
    free: VecDeque<Buf>,
}

impl BufferPool {
    /// Take a buffer from the pool.
    ///
    /// Creates a new buffer if none is free.
    pub fn pop(&mut self) -> Buf {
        if self.free.is_empty() {
            self.free.push_back(Buf::new());
        }
        // Unwrap is OK see above handling of empty.
        self.free.pop_front().unwrap()
    }

    /// Return a buffer to the pool.
    pub fn push(&mut self, mut buffer: Buf) {
        buffer.zeroize();
        buffer.clear();
        self.free.push_back(buffer);
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("free", &self.free.len())
            .finish()
    }
}

/// A growable byte buffer that zeroizes its contents on drop.
pub struct Buf(Vec<u8>, ZeroOnDrop);

#[derive(Clone, Copy, PartialEq, Eq)]
enum ZeroOnDrop {
    Yes,
    No,
}

impl Buf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Buf(Vec::with_capacity(capacity), ZeroOnDrop::Yes)
    }

    /// Truncate to zero length. Capacity is retained.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Reserve space for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    /// Append the given bytes.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Resize, filling new space with `value`.
    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    /// Remove and iterate a range of bytes.
    pub fn drain(&mut self, r: impl RangeBounds<usize>) -> Drain<'_, u8> {
        self.0.drain(r)
    }

    /// Turn into a plain `Vec<u8>`, skipping the zeroize-on-drop.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }

    /// Disable zeroize-on-drop for this buffer.
    pub fn keep_on_drop(mut self) -> Self {
        self.1 = ZeroOnDrop::No;
        self
    }
}

impl Default for Buf {
    fn default() -> Self {
        Buf(vec![], ZeroOnDrop::Yes)
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        if self.1 == ZeroOnDrop::Yes {
            self.0.zeroize();
        }
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

/// Conversion into a [`Buf`].
pub trait ToBuf {
    /// Convert into a [`Buf`].
    fn to_buf(self) -> Buf;
}

impl ToBuf for Vec<u8> {
    fn to_buf(self) -> Buf {
        Buf(self, ZeroOnDrop::Yes)
    }
}

impl ToBuf for &[u8] {
    fn to_buf(self) -> Buf {
        self.to_vec().to_buf()
    }
}
