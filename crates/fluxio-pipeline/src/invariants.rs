//! Debug-only invariant checks for pipeline structure.
//!
//! Compile to nothing in release builds.

/// Head and Tail must always be present and adjacent to at least their
/// sentinel partner.
macro_rules! debug_assert_sentinels_linked {
    ($head_next_is_some:expr, $tail_prev_is_some:expr) => {
        #[cfg(debug_assertions)]
        {
            debug_assert!($head_next_is_some, "head.next must always be set");
            debug_assert!($tail_prev_is_some, "tail.prev must always be set");
        }
    };
}

/// The name index must contain exactly as many entries as the list has
/// linked (non-removed) contexts.
macro_rules! debug_assert_name_index_consistent {
    ($index_len:expr, $list_len:expr) => {
        #[cfg(debug_assertions)]
        debug_assert_eq!(
            $index_len, $list_len,
            "name index has {} entries but the list has {}",
            $index_len, $list_len
        );
    };
}

pub(crate) use debug_assert_name_index_consistent;
pub(crate) use debug_assert_sentinels_linked;
