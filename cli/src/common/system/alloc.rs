//! Process-wide heap accounting.
//!
//! `CountingAllocator` forwards to the system allocator and keeps running
//! totals that the resource report reads. It is installed once in `main.rs`:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOCATOR: common::system::alloc::CountingAllocator =
//!     common::system::alloc::CountingAllocator;
//! ```
//!
//! Counters are global, updated with relaxed atomics, and only ever read for
//! reporting. Without the allocator installed every counter stays at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

/// Bytes currently allocated.
static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);

/// Bytes allocated since program start, never decremented.
static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);

/// Allocations not yet freed.
static LIVE_ALLOCS: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the heap counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapCounters {
    pub live_bytes: u64,
    pub total_bytes: u64,
    pub live_allocs: u64,
}

/// Reads the current counters.
pub fn heap_counters() -> HeapCounters {
    HeapCounters {
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        total_bytes: TOTAL_BYTES.load(Ordering::Relaxed),
        live_allocs: LIVE_ALLOCS.load(Ordering::Relaxed),
    }
}

/// Global allocator that counts what it hands out.
pub struct CountingAllocator;

#[inline]
fn record_alloc(size: usize) {
    LIVE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    TOTAL_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    LIVE_ALLOCS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn record_dealloc(size: usize) {
    LIVE_BYTES.fetch_sub(size as u64, Ordering::Relaxed);
    LIVE_ALLOCS.fetch_sub(1, Ordering::Relaxed);
}

// SAFETY: every method forwards its arguments unchanged to `System`, so the
// pointers, layouts and null-on-failure results are exactly the system
// allocator's and satisfy the `GlobalAlloc` contract. The counters are plain
// relaxed atomics; they never allocate, never touch the memory being managed,
// and are updated only after a successful allocation or after a release.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: the caller guarantees `layout` has a non-zero size.
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: same `layout` precondition as `alloc`.
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` came from this allocator, hence from `System`, with
        // this same `layout`.
        System.dealloc(ptr, layout);
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: `ptr`/`layout` describe a live `System` block and the caller
        // guarantees `new_size` is non-zero and fits `layout.align()`. On
        // failure the old block stays valid and the counters are untouched.
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old_size = layout.size() as u64;
            let new_size = new_size as u64;
            if new_size > old_size {
                LIVE_BYTES.fetch_add(new_size - old_size, Ordering::Relaxed);
                TOTAL_BYTES.fetch_add(new_size - old_size, Ordering::Relaxed);
            } else {
                LIVE_BYTES.fetch_sub(old_size - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}
