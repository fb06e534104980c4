//! Row-cyclic ownership of global indices
//!
//! Global index `i` belongs to rank `i mod P` and sits in slot `i div P` of that rank's
//! local arrays. The same mapping is used for matrix rows and vector entries.

use crate::error::{Result, SpmvError};

/// Cyclic distribution of `[0, N)` over a group of `size` ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicPartition {
    size: usize,
}

impl CyclicPartition {
    /// Creates the partition for a group of `size` ranks.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SpmvError::InvalidDimension(
                "a partition needs at least one rank".to_string(),
            ));
        }
        Ok(Self { size })
    }

    /// Number of ranks in the group
    pub fn size(&self) -> usize {
        self.size
    }

    /// Rank owning global index `i`
    #[inline]
    pub fn owner(&self, i: usize) -> usize {
        i % self.size
    }

    /// Slot of global index `i` inside its owner's local arrays
    #[inline]
    pub fn local(&self, i: usize) -> usize {
        i / self.size
    }

    /// Inverse of (`owner`, `local`)
    #[inline]
    pub fn global(&self, owner: usize, local: usize) -> usize {
        local * self.size + owner
    }

    /// Number of indices in `[0, n)` owned by `rank`.
    pub fn local_len(&self, rank: usize, n: usize) -> usize {
        if rank >= n {
            0
        } else {
            (n - rank + self.size - 1) / self.size
        }
    }

    /// Global indices owned by `rank`, in local-slot order.
    pub fn owned_indices(&self, rank: usize, n: usize) -> impl Iterator<Item = usize> {
        (rank..n).step_by(self.size)
    }
}
