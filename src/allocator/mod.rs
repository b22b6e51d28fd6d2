//! Memory collaborator for class and instance storage
//!
//! The registry never allocates class or instance blocks on its own; every
//! block goes through an injected [`Allocator`] and is handed back to it on
//! teardown. Blocks are zero-initialised byte slices.

pub(crate) mod storage;

#[cfg(test)]
mod tests;

use crate::errors::{MetaError, MetaResult};
use crate::logging::{log_allocation, log_allocation_failure, log_deallocation};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Storage block handed out by an allocator
pub type Block = Box<[u8]>;

/// Allocation strategy injected into a registry
pub trait Allocator: Send + Sync {
    /// Allocate a zeroed block of `size` bytes. `tag` names the purpose.
    fn alloc(&self, size: usize, tag: &'static str) -> MetaResult<Block>;

    /// Return a block previously obtained from `alloc`
    fn free(&self, block: Block, tag: &'static str);

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::default()
    }
}

/// Allocator statistics for monitoring and debugging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub total_allocations: usize,
    pub failed_allocations: usize,
}

/// Global-heap allocator with optional byte limit
///
/// The limit caps live bytes; requests past it fail with
/// [`MetaError::MemAlloc`] exactly like an exhausted heap would.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    limit: Option<usize>,
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
    failed_allocations: AtomicUsize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that fails once `limit` live bytes are outstanding
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn reserve(&self, size: usize) -> bool {
        let prev = self.live_bytes.fetch_add(size, Ordering::AcqRel);
        match self.limit {
            Some(limit) if prev.saturating_add(size) > limit => {
                self.live_bytes.fetch_sub(size, Ordering::AcqRel);
                false
            }
            _ => true,
        }
    }

    fn fail(&self, size: usize, tag: &'static str) -> MetaError {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
        log_allocation_failure(size, tag);
        MetaError::MemAlloc { size, tag }
    }
}

impl Allocator for HeapAllocator {
    fn alloc(&self, size: usize, tag: &'static str) -> MetaResult<Block> {
        if !self.reserve(size) {
            return Err(self.fail(size, tag));
        }

        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(size).is_err() {
            self.live_bytes.fetch_sub(size, Ordering::AcqRel);
            return Err(self.fail(size, tag));
        }
        bytes.resize(size, 0u8);

        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);

        let block = bytes.into_boxed_slice();
        log_allocation(size, tag);
        Ok(block)
    }

    fn free(&self, block: Block, tag: &'static str) {
        let size = block.len();
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        log_deallocation(size, tag);
        drop(block);
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live_blocks: self.live_blocks.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
        }
    }
}
