// Copyright (c) Sean Lawlor
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree.

//! The marshaling buffers which carry an active message's payload

use bytes::{Buf, Bytes};

use super::Serializable;
use crate::SerializationErr;

/// An append-only, growable byte buffer which values are serialized into.
///
/// Handing a [SerializeBuffer] to [crate::Network::send] or
/// [crate::Network::broadcast] moves it into the engine, so the sender can't
/// touch the payload once it's enqueued.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SerializeBuffer {
    data: Vec<u8>,
}

impl SerializeBuffer {
    /// Create a new, empty buffer
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a new buffer with at least `capacity` bytes pre-allocated
    pub fn with_capacity(capacity: usize) -> Result<Self, SerializationErr> {
        let mut data = Vec::new();
        try_grow(&mut data, capacity)?;
        Ok(Self { data })
    }

    /// Append a value to the end of the buffer
    pub fn write<T: Serializable + ?Sized>(&mut self, value: &T) -> Result<(), SerializationErr> {
        value.serialize(self)
    }

    /// Append raw bytes to the end of the buffer. Growth failures are reported
    /// rather than aborting the process.
    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), SerializationErr> {
        try_grow(&mut self.data, bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a `u64` length prefix, used ahead of every variable-length sequence
    pub fn put_len(&mut self, len: usize) -> Result<(), SerializationErr> {
        self.put_slice(&(len as u64).to_be_bytes())
    }

    /// The number of bytes written so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, producing the immutable payload
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.data)
    }

    /// Consume the buffer, producing `header` followed by the payload. The
    /// payload is shifted within its own allocation rather than copied into a
    /// new one.
    pub(crate) fn freeze_with_header(mut self, header: &[u8]) -> Result<Bytes, SerializationErr> {
        try_grow(&mut self.data, header.len())?;
        self.data.splice(0..0, header.iter().copied());
        Ok(Bytes::from(self.data))
    }
}

/// Grow `data`'s capacity by `extra` bytes, reporting failure instead of
/// aborting the process
pub(super) fn try_grow(data: &mut Vec<u8>, extra: usize) -> Result<(), SerializationErr> {
    data.try_reserve(extra)
        .map_err(|_| SerializationErr::Allocation(extra))
}

impl std::fmt::Debug for SerializeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializeBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

/// A received payload with a monotonic read cursor. Values must be read in
/// exactly the order they were written on the sending side.
#[derive(Clone)]
pub struct DeserializeBuffer {
    data: Bytes,
    position: usize,
}

impl DeserializeBuffer {
    /// Wrap a received payload
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    /// Read the next value off of the buffer
    pub fn read<T: Serializable>(&mut self) -> Result<T, SerializationErr> {
        T::deserialize(self)
    }

    /// Read the next value into a caller-supplied destination
    pub fn read_into<T: Serializable>(&mut self, destination: &mut T) -> Result<(), SerializationErr> {
        *destination = T::deserialize(self)?;
        Ok(())
    }

    /// Take the next `len` raw bytes, without copying
    pub fn take_bytes(&mut self, len: usize) -> Result<Bytes, SerializationErr> {
        self.ensure(len)?;
        self.position += len;
        Ok(self.data.split_to(len))
    }

    /// Take the next `N` raw bytes as a fixed-size array
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SerializationErr> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.data.copy_to_slice(&mut out);
        self.position += N;
        Ok(out)
    }

    /// Read a `u64` length prefix written by [SerializeBuffer::put_len]
    pub fn take_len(&mut self) -> Result<usize, SerializationErr> {
        let len = u64::from_be_bytes(self.take_array()?);
        usize::try_from(len).map_err(|_| SerializationErr::InvalidData("sequence length"))
    }

    /// The number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    /// The number of bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether every byte has been read
    pub fn is_empty(&self) -> bool {
        !self.data.has_remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), SerializationErr> {
        let remaining = self.data.remaining();
        if needed > remaining {
            Err(SerializationErr::Underrun { needed, remaining })
        } else {
            Ok(())
        }
    }
}

impl From<Bytes> for DeserializeBuffer {
    fn from(value: Bytes) -> Self {
        Self::new(value)
    }
}

impl From<SerializeBuffer> for DeserializeBuffer {
    fn from(value: SerializeBuffer) -> Self {
        Self::new(value.freeze())
    }
}

impl std::fmt::Debug for DeserializeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeserializeBuffer")
            .field("position", &self.position)
            .field("remaining", &self.data.remaining())
            .finish()
    }
}
