//! Fixed-capacity ring buffer with on-demand averaging

use crate::error::{BeaconError, Result};

use super::Average;

/// Bounded history that overwrites its oldest entry once full
///
/// Storage is allocated inline, so pushing never allocates. Occupancy
/// saturates at `N` and never decreases.
#[derive(Debug, Clone)]
pub struct HistoryWindow<T: Copy + Default, const N: usize> {
    buf: [T; N],
    offset: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> Default for HistoryWindow<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> HistoryWindow<T, N> {
    /// Zero-initialized, empty window
    pub fn new() -> Self {
        Self {
            buf: [T::default(); N],
            offset: 0,
            len: 0,
        }
    }

    /// Insert at the rotating offset
    pub fn push(&mut self, value: T) {
        self.buf[self.offset] = value;
        self.offset = (self.offset + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of valid entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Index the next push will write to
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Most recently pushed entry
    pub fn latest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        Some(&self.buf[(self.offset + N - 1) % N])
    }

    /// Iterate valid entries, oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + Clone {
        let start = if self.len < N { 0 } else { self.offset };
        (0..self.len).map(move |i| &self.buf[(start + i) % N])
    }

    /// Mean over all valid entries
    ///
    /// # Errors
    ///
    /// `EmptyWindow` if nothing has been pushed yet
    pub fn average(&self) -> Result<T>
    where
        T: Average,
    {
        T::average(self.iter()).ok_or(BeaconError::EmptyWindow)
    }
}
