//! Fixed-width byte codecs for memory-copyable value types.
//!
//! # Invariants
//! - Decoders never read past the provided buffer; truncation is an error.
//! - `deserialize_pod(serialize_pod(v), 0)` yields `v` and `size_of::<T>()`.
//!
//! Fields are emitted in the native byte order of the running process.
//! Buffers are in-memory only and never cross a machine boundary, so encode
//! and decode always agree on layout.

use bytemuck::Pod;

/// Errors from decoding a binary stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializeError {
    #[error("buffer truncated: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// A decoded value together with the number of bytes consumed producing it.
///
/// Returning the consumed length lets callers pack multiple objects
/// back-to-back in one buffer and decode them sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deserialized<T> {
    value: T,
    bytes_read: usize,
}

impl<T> Deserialized<T> {
    pub fn new(value: T, bytes_read: usize) -> Self {
        Self { value, bytes_read }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn into_parts(self) -> (T, usize) {
        (self.value, self.bytes_read)
    }
}

/// Append the raw bytes of a memory-copyable value. Returns bytes written.
pub fn serialize_pod<T: Pod>(value: &T, buffer: &mut Vec<u8>) -> usize {
    let bytes = bytemuck::bytes_of(value);
    buffer.extend_from_slice(bytes);
    bytes.len()
}

/// Decode a memory-copyable value starting at `offset`.
///
/// Fails with [`SerializeError::TruncatedBuffer`] if fewer than
/// `size_of::<T>()` bytes remain.
pub fn deserialize_pod<T: Pod>(
    buffer: &[u8],
    offset: usize,
) -> Result<Deserialized<T>, SerializeError> {
    let needed = size_of::<T>();
    let remaining = buffer.len().saturating_sub(offset);
    if remaining < needed {
        return Err(SerializeError::TruncatedBuffer {
            offset,
            needed,
            remaining,
        });
    }
    let value = bytemuck::pod_read_unaligned(&buffer[offset..offset + needed]);
    Ok(Deserialized::new(value, needed))
}
