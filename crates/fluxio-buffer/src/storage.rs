use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::allocator::BufferAllocator;
use crate::error::BufferError;
use crate::invariants::debug_assert_ref_count_nonnegative;

/// Shared backing bytes for a Buffer root and every slice/duplicate derived
/// from it.
///
/// Access is not synchronized beyond `ref_count` and `capacity`: the
/// protocol (§5 of the owning specification) assumes a single logical owner
/// touches the bytes at a time, with ownership handed off rather than
/// shared concurrently. `ref_count` uses atomic read-modify-write because
/// retain/release are part of the public explicit contract and may
/// legitimately race with a concurrent release from another view holder
/// that was handed off to a different thread.
pub(crate) struct Storage {
    data: UnsafeCell<Vec<u8>>,
    capacity: AtomicUsize,
    max_capacity: usize,
    ref_count: AtomicIsize,
    allocator: Arc<dyn BufferAllocator>,
}

// SAFETY: `data` is only dereferenced while the caller holds a live Buffer
// handle and observes the single-owner-at-a-time discipline documented on
// the type; no two handles produce overlapping `&mut` accesses without that
// discipline being upheld by the caller. This matches how `Ring<T>` in the
// sibling ring-buffer crate reasons about its own `UnsafeCell` field.
unsafe impl Send for Storage {}

// SAFETY: needed so `Arc<Storage>` is `Send` (its std impl requires
// `Storage: Send + Sync` together, not `Send` alone), which lets a `Buffer`
// cross an executor handoff as a pipeline `Message`. This is not a claim
// that two threads may call `as_mut_slice`/`grow_*` on the same `Storage`
// concurrently — that would race on the `UnsafeCell` same as with a single
// thread holding two aliases. It only asserts that *handing off* a `Storage`
// reference between threads, one at a time, is sound, which is exactly
// what `ref_count`'s atomic bookkeeping already assumes.
unsafe impl Sync for Storage {}

impl Storage {
    pub(crate) fn new(initial_capacity: usize, max_capacity: usize, allocator: Arc<dyn BufferAllocator>) -> Self {
        Self {
            data: UnsafeCell::new(vec![0u8; initial_capacity]),
            capacity: AtomicUsize::new(initial_capacity),
            max_capacity,
            ref_count: AtomicIsize::new(1),
            allocator,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// # Safety
    ///
    /// The returned slice is valid only until the next call that may grow
    /// the storage (`grow_to`), since growth may reallocate the backing
    /// `Vec`.
    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: see struct-level comment; single logical owner at a time.
        unsafe { &(*self.data.get())[..self.capacity()] }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn as_mut_slice(&self) -> &mut [u8] {
        // SAFETY: see struct-level comment; single logical owner at a time.
        let cap = self.capacity();
        unsafe { &mut (*self.data.get())[..cap] }
    }

    /// Grows the backing `Vec` to at least `min_required`, per the
    /// allocator's growth policy, and returns the new capacity. Returns an
    /// error without mutating anything if `min_required` exceeds
    /// `max_capacity`.
    pub(crate) fn grow_for(&self, min_required: usize) -> Result<usize, BufferError> {
        let current = self.capacity();
        if current >= min_required {
            return Ok(current);
        }
        if min_required > self.max_capacity {
            return Err(BufferError::Capacity {
                requested: min_required - current,
                max_capacity: self.max_capacity,
            });
        }
        let new_capacity = self
            .allocator
            .calculate_new_capacity(min_required, self.max_capacity)
            .clamp(min_required, self.max_capacity);
        self.grow_to(new_capacity);
        Ok(new_capacity)
    }

    /// Grows (or leaves unchanged) the backing `Vec` to exactly
    /// `new_capacity`, which must not exceed `max_capacity`. Used by the
    /// forcing variant of `ensure_writable`, which may grow all the way to
    /// `max_capacity` even when that still falls short of the request.
    pub(crate) fn grow_to(&self, new_capacity: usize) {
        debug_assert!(new_capacity <= self.max_capacity);
        let current = self.capacity();
        if new_capacity <= current {
            return;
        }
        // SAFETY: see struct-level comment; single logical owner at a time.
        unsafe { (*self.data.get()).resize(new_capacity, 0) };
        self.capacity.store(new_capacity, Ordering::Release);
    }

    #[inline]
    pub(crate) fn retain(&self) {
        let previous = self.ref_count.fetch_add(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "retain() called on a released buffer");
    }

    /// Decrements the shared ref-count. Returns `Ok(true)` if this call just
    /// transitioned the count from 1 to 0 (Live -> Released).
    pub(crate) fn release(&self) -> Result<bool, BufferError> {
        let previous = self.ref_count.fetch_sub(1, Ordering::AcqRel);
        if previous <= 0 {
            self.ref_count.fetch_add(1, Ordering::AcqRel);
            return Err(BufferError::RefCountUnderflow);
        }
        let count = previous - 1;
        debug_assert_ref_count_nonnegative!(count);
        Ok(count == 0)
    }

    #[inline]
    pub(crate) fn ref_count(&self) -> isize {
        self.ref_count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.ref_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::DoublingAllocator;

    fn storage(initial: usize, max: usize) -> Storage {
        Storage::new(initial, max, Arc::new(DoublingAllocator::default()))
    }

    #[test]
    fn retain_then_release_is_a_no_op() {
        let s = storage(8, 8);
        assert_eq!(s.ref_count(), 1);
        s.retain();
        assert_eq!(s.ref_count(), 2);
        assert!(!s.release().unwrap());
        assert_eq!(s.ref_count(), 1);
    }

    #[test]
    fn release_from_one_transitions_to_released() {
        let s = storage(8, 8);
        assert!(s.release().unwrap());
        assert!(!s.is_live());
    }

    #[test]
    fn release_past_zero_underflows() {
        let s = storage(8, 8);
        assert!(s.release().unwrap());
        assert_eq!(s.release().unwrap_err(), BufferError::RefCountUnderflow);
        assert_eq!(s.ref_count(), 0);
    }

    #[test]
    fn grow_for_respects_max_capacity() {
        let s = storage(4, 8);
        assert_eq!(s.grow_for(8).unwrap(), 8);
        assert!(s.grow_for(9).is_err());
    }
}
