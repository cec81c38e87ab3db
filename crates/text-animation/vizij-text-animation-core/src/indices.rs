//! `[start, end)` character intervals with a stacking order at their start index.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TextAnimError};

/// Raw end value marking an interval that extends to the end of the text.
pub const OPEN_END: i32 = -1;

/// Interval over character positions.
///
/// `end == None` is an open interval that must be closed against the current
/// character count before it takes part in lookups. `order` disambiguates
/// intervals sharing the same `start`: lower order means opened earlier, i.e.
/// outer nesting and lower in the stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalIndices {
    pub start: usize,
    pub end: Option<usize>,
    pub order: u32,
}

impl IntervalIndices {
    pub fn new(start: usize, end: Option<usize>, order: u32) -> Self {
        Self { start, end, order }
    }

    /// Closed interval helper, mostly for tests and default animations.
    pub fn closed_range(start: usize, end: usize, order: u32) -> Self {
        Self::new(start, Some(end), order)
    }

    /// Check raw parser bounds: `start >= 0` and `end >= start` unless `end` is open.
    pub fn validate_raw(start: i32, end: i32) -> Result<()> {
        if start < 0 || (end != OPEN_END && end < start) {
            return Err(TextAnimError::InvalidInterval { start, end });
        }
        Ok(())
    }

    /// Build from raw parser bounds, rejecting invalid ones.
    pub fn from_raw(start: i32, end: i32, order: u32) -> Result<Self> {
        Self::validate_raw(start, end)?;
        let end = if end == OPEN_END {
            None
        } else {
            Some(end as usize)
        };
        Ok(Self::new(start as usize, end, order))
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Resolve an open end to `len`; closed intervals are returned unchanged.
    #[inline]
    pub fn closed(self, len: usize) -> Self {
        Self {
            end: Some(self.end.unwrap_or(len)),
            ..self
        }
    }

    /// End bound used for lookups, treating an open interval as reaching `len`.
    #[inline]
    pub fn end_or(&self, len: usize) -> usize {
        self.end.unwrap_or(len)
    }

    /// Containment test. An open interval contains every index from `start` on.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && self.end.map_or(true, |end| index < end)
    }

    /// Number of covered positions, `None` while open.
    #[inline]
    pub fn len(&self) -> Option<usize> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Key the tag collections are sorted by.
    #[inline]
    pub fn sort_key(&self) -> (usize, u32) {
        (self.start, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_bounds_are_validated() {
        assert!(IntervalIndices::from_raw(0, 2, 0).is_ok());
        assert!(IntervalIndices::from_raw(3, OPEN_END, 0).unwrap().is_open());
        assert_eq!(
            IntervalIndices::from_raw(-1, 2, 0),
            Err(TextAnimError::InvalidInterval { start: -1, end: 2 })
        );
        assert!(IntervalIndices::from_raw(4, 2, 0).is_err());
        // empty intervals are legal
        assert!(IntervalIndices::from_raw(2, 2, 0).unwrap().is_empty());
    }

    #[test]
    fn open_interval_closes_to_len() {
        let open = IntervalIndices::new(1, None, 0);
        assert!(open.contains(1_000));
        let closed = open.closed(5);
        assert_eq!(closed.end, Some(5));
        assert!(closed.contains(4));
        assert!(!closed.contains(5));
        assert!(!closed.contains(0));
        // closing twice keeps the first bound
        assert_eq!(closed.closed(9).end, Some(5));
    }
}
