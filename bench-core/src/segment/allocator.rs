//! Bump allocator over the data region of a segment

use std::ops::Range;

use super::layout::ALIGNMENT;
use super::SegmentError;

/// Round `value` up to the next multiple of `align` (a power of two)
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Hands out aligned, never-freed ranges of a fixed region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpAllocator {
    start: usize,
    cursor: usize,
    end: usize,
}

impl BumpAllocator {
    /// Allocator over the empty region `start..end`
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            cursor: start,
            end,
        }
    }

    /// Rebuild an allocator from a persisted cursor
    pub fn resume(start: usize, cursor: usize, end: usize) -> Result<Self, SegmentError> {
        if cursor < start || cursor > end {
            return Err(SegmentError::Corrupt(format!(
                "allocation cursor {} outside data region {}..{}",
                cursor, start, end
            )));
        }
        Ok(Self { start, cursor, end })
    }

    /// Reserve `len` bytes at the next aligned offset
    pub fn allocate(&mut self, len: usize) -> Result<Range<usize>, SegmentError> {
        let offset = align_up(self.cursor, ALIGNMENT);
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.end)
            .ok_or(SegmentError::OutOfSpace {
                requested: len,
                available: self.remaining(),
            })?;

        self.cursor = end;
        Ok(offset..end)
    }

    /// Next free offset
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes already handed out, alignment padding included
    pub fn used(&self) -> usize {
        self.cursor - self.start
    }

    /// Largest allocation that would still succeed
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(align_up(self.cursor, ALIGNMENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(1089, 16), 1104);
    }

    #[test]
    fn test_allocations_are_aligned_and_disjoint() {
        let mut alloc = BumpAllocator::new(64, 1024);
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(20).unwrap();

        assert_eq!(a, 64..74);
        assert_eq!(b.start % ALIGNMENT, 0);
        assert!(b.start >= a.end);
        assert_eq!(alloc.cursor(), b.end);
        assert_eq!(alloc.used(), b.end - 64);
    }

    #[test]
    fn test_out_of_space_leaves_cursor_untouched() {
        let mut alloc = BumpAllocator::new(0, 100);
        alloc.allocate(90).unwrap();
        let cursor = alloc.cursor();

        let result = alloc.allocate(20);
        assert!(matches!(
            result,
            Err(SegmentError::OutOfSpace { requested: 20, available: 4 })
        ));
        assert_eq!(alloc.cursor(), cursor);
    }

    #[test]
    fn test_zero_length_allocation() {
        let mut alloc = BumpAllocator::new(32, 32);
        assert_eq!(alloc.allocate(0).unwrap(), 32..32);
        assert_eq!(alloc.remaining(), 0);
    }

    #[test]
    fn test_resume_rejects_cursor_outside_region() {
        assert!(BumpAllocator::resume(64, 32, 128).is_err());
        assert!(BumpAllocator::resume(64, 129, 128).is_err());
        let alloc = BumpAllocator::resume(64, 100, 128).unwrap();
        assert_eq!(alloc.cursor(), 100);
    }
}
