//! Host allocator backed by the global Rust allocator.
//!
//! Every block carries a small header in front of the pointer handed out to the
//! caller. The header records the requested size so [`Allocator::free`] needs no
//! size argument, matching the contract expected by the collector.
//!
//! # Layout
//!
//! ```text
//! base                    block (returned)
//! |<---- BLOCK_ALIGN ---->|<------------ size ------------>|
//! | size: usize | pad ... | payload ...                    |
//! ```

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

/// Alignment of every block returned by [`HostAllocator`].
///
/// Large enough for any scalar type including `u128` and SIMD-free `f64` pairs.
pub const BLOCK_ALIGN: usize = 16;

/// Raw memory provider contract.
///
/// Implementations must be safe to use from multiple threads without external
/// locking.
pub trait Allocator: Send + Sync {
    /// Returns a block of at least `size` bytes, or `None` when memory is exhausted.
    ///
    /// The block is aligned to at least [`BLOCK_ALIGN`] bytes and does not overlap
    /// any other live block. Never aborts.
    fn try_allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Returns a block of at least `size` bytes, terminating the process on exhaustion.
    ///
    /// Built on [`Allocator::try_allocate`]. Memory exhaustion at this layer is
    /// not recoverable.
    fn allocate(&self, size: usize) -> NonNull<u8> {
        match self.try_allocate(size) {
            Some(block) => block,
            None => exhausted(size),
        }
    }

    /// Releases a block previously returned by this allocator.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by `try_allocate`/`allocate` of this same
    /// allocator and must not have been freed already.
    unsafe fn free(&self, block: NonNull<u8>);
}

/// Terminates the process after an allocation of `size` bytes could not be served.
pub(crate) fn exhausted(size: usize) -> ! {
    log::error!("out of memory allocating {} bytes", size);
    match Layout::from_size_align(size.max(1), BLOCK_ALIGN) {
        Ok(layout) => alloc::handle_alloc_error(layout),
        Err(_) => std::process::abort(),
    }
}

/// Snapshot of allocator usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently handed out (payload only, headers excluded).
    pub live_bytes: usize,
    /// Highest value `live_bytes` has reached.
    pub peak_bytes: usize,
    /// Number of successful allocations.
    pub allocations: u64,
    /// Number of blocks freed.
    pub frees: u64,
    /// Number of allocation requests that returned `None`.
    pub failures: u64,
}

/// Thread-safe allocator over the global Rust allocator.
///
/// `HostAllocator` keeps lock-free usage counters. When constructed with a hard
/// limit, requests that would push the live byte count past it fail instead of
/// reaching the global allocator.
///
/// # Example
///
/// ```rust
/// use vmsys::memory::{Allocator, HostAllocator};
///
/// let allocator = HostAllocator::new(1024 * 1024, None);
/// let block = allocator.try_allocate(64).unwrap();
/// unsafe { allocator.free(block) };
/// assert_eq!(allocator.stats().live_bytes, 0);
/// ```
#[derive(Debug)]
pub struct HostAllocator {
    /// Sizing hint; crossing it is logged once.
    hint: usize,
    /// Hard cap on live bytes, if enforced.
    limit: Option<usize>,
    live: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicU64,
    frees: AtomicU64,
    failures: AtomicU64,
    hint_exceeded: AtomicBool,
}

impl HostAllocator {
    /// Creates an allocator with a sizing hint and an optional hard limit.
    ///
    /// # Arguments
    ///
    /// * `hint` - Expected working-set size in bytes; informational only
    /// * `limit` - Maximum live bytes; `None` means the host is the only limit
    #[must_use]
    pub fn new(hint: usize, limit: Option<usize>) -> Self {
        HostAllocator {
            hint,
            limit,
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            hint_exceeded: AtomicBool::new(false),
        }
    }

    /// Returns the sizing hint this allocator was created with.
    #[must_use]
    pub fn hint(&self) -> usize {
        self.hint
    }

    /// Returns the hard limit, if one is enforced.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns a snapshot of the usage counters.
    ///
    /// The counters are read individually, so under concurrent use the snapshot
    /// is only approximately consistent.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            live_bytes: self.live.load(Ordering::Relaxed),
            peak_bytes: self.peak.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn layout_for(size: usize) -> Option<Layout> {
        let total = size.checked_add(BLOCK_ALIGN)?;
        Layout::from_size_align(total, BLOCK_ALIGN).ok()
    }

    /// Reserves `size` live bytes against the limit. Returns the new live total.
    fn reserve(&self, size: usize) -> Option<usize> {
        let mut current = self.live.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(size)?;
            if let Some(limit) = self.limit {
                if next > limit {
                    return None;
                }
            }
            match self.live.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(next),
                Err(actual) => current = actual,
            }
        }
    }

    fn fail(&self, size: usize) -> Option<NonNull<u8>> {
        self.failures.fetch_add(1, Ordering::Relaxed);
        log::debug!("allocation of {} bytes refused", size);
        None
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        // 64 MB working set, no hard limit
        Self::new(64 * 1024 * 1024, None)
    }
}

impl Allocator for HostAllocator {
    fn try_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let Some(layout) = Self::layout_for(size) else {
            return self.fail(size);
        };
        let Some(live) = self.reserve(size) else {
            return self.fail(size);
        };

        // SAFETY: layout has a non-zero size (at least BLOCK_ALIGN bytes).
        let base = unsafe { alloc::alloc(layout) };
        let Some(base) = NonNull::new(base) else {
            self.live.fetch_sub(size, Ordering::AcqRel);
            return self.fail(size);
        };

        // SAFETY: the header lies within the allocation and is suitably aligned
        // for usize; the payload starts BLOCK_ALIGN bytes in.
        let block = unsafe {
            base.as_ptr().cast::<usize>().write(size);
            NonNull::new_unchecked(base.as_ptr().add(BLOCK_ALIGN))
        };

        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(live, Ordering::Relaxed);
        if live > self.hint && !self.hint_exceeded.swap(true, Ordering::Relaxed) {
            log::debug!(
                "heap usage {} bytes exceeds the configured hint of {} bytes",
                live,
                self.hint
            );
        }

        Some(block)
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        let base = block.as_ptr().sub(BLOCK_ALIGN);
        let size = base.cast::<usize>().read();
        let Some(layout) = Self::layout_for(size) else {
            // Unreachable for blocks produced by try_allocate.
            std::process::abort();
        };

        alloc::dealloc(base, layout);
        self.live.fetch_sub(size, Ordering::AcqRel);
        self.frees.fetch_add(1, Ordering::Relaxed);
    }
}
