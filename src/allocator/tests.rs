//! Allocator tests
//!
//! - Heap allocation: zeroing, counters
//! - Limits: failure injection and recovery

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ErrorKind;

    // ===== Heap Allocation =====

    #[test]
    fn allocation_is_zeroed() {
        let allocator = HeapAllocator::new();
        let block = allocator.alloc(64, "test").expect("alloc");
        assert_eq!(block.len(), 64);
        assert!(block.iter().all(|b| *b == 0));
        allocator.free(block, "test");
    }

    #[test]
    fn stats_track_live_blocks() {
        let allocator = HeapAllocator::new();
        let a = allocator.alloc(16, "test").expect("first alloc");
        let b = allocator.alloc(48, "test").expect("second alloc");

        let stats = allocator.stats();
        assert_eq!(stats.live_blocks, 2);
        assert_eq!(stats.live_bytes, 64);
        assert_eq!(stats.total_allocations, 2);

        allocator.free(a, "test");
        allocator.free(b, "test");

        let stats = allocator.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.total_allocations, 2);
    }

    #[test]
    fn zero_sized_allocation() {
        let allocator = HeapAllocator::new();
        let block = allocator.alloc(0, "empty").expect("zero alloc");
        assert!(block.is_empty());
        allocator.free(block, "empty");
        assert_eq!(allocator.stats().live_blocks, 0);
    }

    // ===== Limits =====

    #[test]
    fn limit_rejects_excess() {
        let allocator = HeapAllocator::with_limit(100);
        let keep = allocator.alloc(80, "test").expect("within limit");

        let err = allocator.alloc(32, "class").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemAlloc);
        assert_eq!(err, MetaError::MemAlloc { size: 32, tag: "class" });

        let stats = allocator.stats();
        assert_eq!(stats.live_bytes, 80);
        assert_eq!(stats.failed_allocations, 1);

        allocator.free(keep, "test");
        let again = allocator.alloc(32, "class").expect("room after free");
        allocator.free(again, "class");
    }

    #[test]
    fn default_stats_are_empty() {
        struct Null;
        impl Allocator for Null {
            fn alloc(&self, size: usize, tag: &'static str) -> MetaResult<Block> {
                Err(MetaError::MemAlloc { size, tag })
            }
            fn free(&self, _block: Block, _tag: &'static str) {}
        }
        assert_eq!(Null.stats(), AllocatorStats::default());
    }
}
