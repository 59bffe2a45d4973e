use crate::Point;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous window over the particle array, representing one molecule or
/// one atomic reservoir.
///
/// The window `[begin, begin + capacity)` is fixed at allocation; only the
/// active prefix `[begin, begin + size)` changes over the simulation.
/// Inactive slots keep real, allocated particles so that activation never
/// moves memory and rejection can restore in O(change).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Molecule kind id.
    pub molecule: usize,
    /// Cached from the molecule kind: atomic reservoirs resize freely,
    /// molecular groups are all-or-nothing.
    pub atomic: bool,
    /// Mass center of the active particles; `None` for atomic groups.
    pub mass_center: Option<Point>,
    /// Index into the molecule kind's conformation library.
    pub conformation: usize,
    begin: usize,
    capacity: usize,
    size: usize,
}

impl Group {
    pub fn new(molecule: usize, atomic: bool, begin: usize, capacity: usize) -> Self {
        Self {
            molecule,
            atomic,
            mass_center: None,
            conformation: 0,
            begin,
            capacity,
            size: capacity,
        }
    }

    /// First particle slot of the window.
    #[inline]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Number of active particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocated window size; immutable over the simulation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Absolute slot range of the active particles.
    #[inline]
    pub fn active_range(&self) -> Range<usize> {
        self.begin..self.begin + self.size
    }

    /// Absolute slot range of the whole window, inactive tail included.
    #[inline]
    pub fn full_range(&self) -> Range<usize> {
        self.begin..self.begin + self.capacity
    }

    /// Absolute slot of a relative index; may point into the inactive tail.
    #[inline]
    pub fn absolute(&self, relative: usize) -> usize {
        debug_assert!(relative < self.capacity);
        self.begin + relative
    }

    /// Relative index of an absolute slot inside this window.
    #[inline]
    pub fn relative(&self, absolute: usize) -> usize {
        debug_assert!(self.full_range().contains(&absolute));
        absolute - self.begin
    }

    /// True if the absolute slot is an active member of this group.
    #[inline]
    pub fn contains_active(&self, absolute: usize) -> bool {
        self.active_range().contains(&absolute)
    }

    /// Grow the active region by `n` slots. Panics past capacity; feasibility
    /// is the caller's contract (speciation checks headroom first).
    pub fn activate(&mut self, n: usize) {
        assert!(
            self.size + n <= self.capacity,
            "group activation past capacity ({} + {} > {})",
            self.size,
            n,
            self.capacity
        );
        self.size += n;
    }

    /// Shrink the active region by `n` slots.
    pub fn deactivate(&mut self, n: usize) {
        assert!(
            n <= self.size,
            "group deactivation below zero ({} - {})",
            self.size,
            n
        );
        self.size -= n;
    }

    /// Overwrite the active size; used by state synchronization and loading.
    pub(crate) fn set_len(&mut self, size: usize) {
        assert!(size <= self.capacity);
        self.size = size;
    }
}
