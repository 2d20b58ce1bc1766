//! Error types for buffer operations.

use thiserror::Error;

/// Errors that can occur while operating on a [`crate::Buffer`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A cursor or absolute index fell outside `[0, capacity)` or the
    /// readable/writable window.
    #[error("index {index} with length {len} out of bounds for capacity {capacity}")]
    Index {
        index: usize,
        len: usize,
        capacity: usize,
    },

    /// Growing the buffer would exceed `max_capacity`.
    #[error("cannot grow by {requested} bytes beyond max capacity {max_capacity}")]
    Capacity { requested: usize, max_capacity: usize },

    /// The operation was attempted on a buffer whose ref-count has reached
    /// zero.
    #[error("operation on released buffer (ref_count=0)")]
    Released,

    /// `release()` was called when `ref_count` was already zero.
    #[error("ref-count underflow: release() called with ref_count already 0")]
    RefCountUnderflow,

    /// `reset_reader`/`reset_writer` found the saved snapshot no longer
    /// valid (reader would end up past writer).
    #[error("marker snapshot ({marker}) invalid against writer index ({writer_index})")]
    InvalidMarker { marker: usize, writer_index: usize },
}

impl BufferError {
    /// `true` for errors that leave the buffer state untouched and could be
    /// retried after the caller adjusts its request (e.g. after a
    /// `discard_read`).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Index { .. } | Self::Capacity { .. })
    }

    /// `true` once the buffer itself is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::RefCountUnderflow)
    }
}
