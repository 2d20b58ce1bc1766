//! Debug-only invariant checks.
//!
//! These compile to nothing in release builds. They exist to catch
//! violations of the cursor/capacity/ref-count contracts during
//! development and in the test suite, not to be part of the public API.

/// Index ordering: `0 <= reader <= writer <= capacity <= max_capacity`.
macro_rules! debug_assert_cursor_order {
    ($reader:expr, $writer:expr, $capacity:expr, $max_capacity:expr) => {
        #[cfg(debug_assertions)]
        {
            debug_assert!(
                $reader <= $writer,
                "reader index {} exceeds writer index {}",
                $reader,
                $writer
            );
            debug_assert!(
                $writer <= $capacity,
                "writer index {} exceeds capacity {}",
                $writer,
                $capacity
            );
            debug_assert!(
                $capacity <= $max_capacity,
                "capacity {} exceeds max_capacity {}",
                $capacity,
                $max_capacity
            );
        }
    };
}

/// A marker must never exceed the writer index it was clamped against.
macro_rules! debug_assert_marker_bounded {
    ($marker:expr, $writer:expr) => {
        #[cfg(debug_assertions)]
        debug_assert!(
            $marker <= $writer,
            "marker {} exceeds writer index {}",
            $marker,
            $writer
        );
    };
}

/// `ref_count` must never go negative; callers check this before the
/// underflow would otherwise occur.
macro_rules! debug_assert_ref_count_nonnegative {
    ($ref_count:expr) => {
        #[cfg(debug_assertions)]
        debug_assert!($ref_count >= 0, "ref_count went negative: {}", $ref_count);
    };
}

pub(crate) use debug_assert_cursor_order;
pub(crate) use debug_assert_marker_bounded;
pub(crate) use debug_assert_ref_count_nonnegative;
