//! Fixed-size cell blocks backing the sparse grid.

use serde::{Deserialize, Serialize};

/// A dense square block of cells.
///
/// Cells live in one contiguous row-major buffer so that ray traversal and
/// distance propagation touch memory sequentially. Patches are allocated
/// lazily by the [`SparseGrid`](super::SparseGrid) on first write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patch<T> {
    cells: Vec<T>,
}

impl<T: Copy + Default> Patch<T> {
    /// Allocate a patch of `side * side` default cells.
    pub(super) fn new(side: usize) -> Self {
        Self {
            cells: vec![T::default(); side * side],
        }
    }

    /// Read the cell at a flat row-major slot.
    #[inline]
    pub fn get(&self, slot: usize) -> T {
        self.cells[slot]
    }

    /// Mutable access to the cell at a flat row-major slot.
    #[inline]
    pub(super) fn get_mut(&mut self, slot: usize) -> &mut T {
        &mut self.cells[slot]
    }

    /// The raw cell buffer, row-major.
    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}
