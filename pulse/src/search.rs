//! Bound searches over sequences sorted ascending by capture time.
//!
//! Range queries across the crate locate their boundaries with the two named
//! bound functions in this module, both thin wrappers over one iterative
//! partition routine. There is deliberately no single generic search taking a
//! tie-break parameter: two distinct names cannot be transposed silently.
//!
//! # Sortedness precondition
//!
//! Inputs must be sorted ascending by capture time. This is a precondition,
//! not something the searches re-validate: only a cheap first-versus-last
//! comparison is performed (raised as [`QueryError::Unsorted`]); deeper
//! disorder yields unspecified results.
//!
//! # Range convention
//!
//! `first_at_or_after` and `last_at_or_before` combine into an **inclusive**
//! index range `[start, end]`: the matching run is `&seq[start..=end]`, its
//! length is `end - start + 1`, and the range is empty exactly when
//! `last_at_or_before` returns `None` or `end < start`. [`inclusive_range`]
//! packages this convention; callers slice with it rather than re-deriving
//! lengths.

use crate::error::{QueryError, Result};
use crate::sample::Timestamped;

/// Iterative binary narrowing over index space.
///
/// Given a predicate that is `true` for a (possibly empty) prefix of
/// `0..len` and `false` from some point on, returns the index of the first
/// `false`, or `len` if the predicate holds everywhere. O(log len), never
/// evaluates the predicate outside `0..len`.
///
/// This is the single boundary-location primitive in the crate; the slice
/// wrappers below and the ring store's wrapped index mapping both build on it.
pub fn partition_index<F>(len: usize, pred: F) -> usize
where
    F: Fn(usize) -> bool,
{
    let mut lo = 0usize;
    let mut hi = len;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Lower bound: the smallest index `i` with `seq[i].captured_at_ns() >=
/// from_ns`, or `seq.len()` if no element qualifies.
///
/// # Errors
///
/// Returns [`QueryError::Unsorted`] if the cheap sortedness check fails.
pub fn first_at_or_after<T: Timestamped>(seq: &[T], from_ns: u64) -> Result<usize> {
    check_sorted(seq)?;
    Ok(partition_index(seq.len(), |i| {
        seq[i].captured_at_ns() < from_ns
    }))
}

/// Upper bound: the largest index `i` with `seq[i].captured_at_ns() <=
/// to_ns`, or `None` if no element qualifies.
///
/// # Errors
///
/// Returns [`QueryError::Unsorted`] if the cheap sortedness check fails.
pub fn last_at_or_before<T: Timestamped>(seq: &[T], to_ns: u64) -> Result<Option<usize>> {
    check_sorted(seq)?;
    let first_after = partition_index(seq.len(), |i| seq[i].captured_at_ns() <= to_ns);
    Ok(first_after.checked_sub(1))
}

/// Locates the inclusive index range `[start, end]` of elements with capture
/// time in `[from_ns, to_ns]`, or `None` if no element falls in the range.
///
/// # Errors
///
/// Returns [`QueryError::Unsorted`] if the cheap sortedness check fails.
pub fn inclusive_range<T: Timestamped>(
    seq: &[T],
    from_ns: u64,
    to_ns: u64,
) -> Result<Option<(usize, usize)>> {
    let start = first_at_or_after(seq, from_ns)?;
    let Some(end) = last_at_or_before(seq, to_ns)? else {
        return Ok(None);
    };
    if start > end {
        return Ok(None);
    }
    Ok(Some((start, end)))
}

/// Cheap sortedness sanity check: first element versus last.
fn check_sorted<T: Timestamped>(seq: &[T]) -> Result<()> {
    if let (Some(first), Some(last)) = (seq.first(), seq.last())
        && first.captured_at_ns() > last.captured_at_ns()
    {
        return Err(QueryError::Unsorted.into());
    }
    Ok(())
}
