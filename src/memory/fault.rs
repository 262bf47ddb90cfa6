//! Fault injection for allocator consumers.

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::memory::Allocator;

/// Allocator wrapper that starts failing after a fixed number of successful
/// allocations.
///
/// Used to drive the exhaustion paths of code that consumes an [`Allocator`]:
/// `try_allocate` starts returning `None`, and the provided
/// [`Allocator::allocate`] terminates the process.
///
/// # Example
///
/// ```rust
/// use vmsys::memory::{Allocator, FaultInjectingAllocator, HostAllocator};
///
/// let allocator = FaultInjectingAllocator::new(HostAllocator::default(), 1);
/// let block = allocator.try_allocate(8).unwrap();
/// assert!(allocator.try_allocate(8).is_none());
/// unsafe { allocator.free(block) };
/// ```
#[derive(Debug)]
pub struct FaultInjectingAllocator<A> {
    inner: A,
    /// Allocations left before every request fails.
    remaining: AtomicUsize,
}

impl<A: Allocator> FaultInjectingAllocator<A> {
    /// Wraps `inner`, allowing `successes` allocations before failing.
    #[must_use]
    pub fn new(inner: A, successes: usize) -> Self {
        FaultInjectingAllocator {
            inner,
            remaining: AtomicUsize::new(successes),
        }
    }

    /// Wraps `inner` so that every allocation fails.
    #[must_use]
    pub fn exhausted(inner: A) -> Self {
        Self::new(inner, 0)
    }

    /// Returns the wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Allows `successes` further allocations.
    pub fn rearm(&self, successes: usize) {
        self.remaining.store(successes, Ordering::Release);
    }
}

impl<A: Allocator> Allocator for FaultInjectingAllocator<A> {
    fn try_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .ok()?;
        self.inner.try_allocate(size)
    }

    unsafe fn free(&self, block: NonNull<u8>) {
        self.inner.free(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HostAllocator;

    #[test]
    fn test_fails_after_budget() {
        let allocator = FaultInjectingAllocator::new(HostAllocator::default(), 2);

        let a = allocator.try_allocate(16).unwrap();
        let b = allocator.try_allocate(16).unwrap();
        assert!(allocator.try_allocate(16).is_none());
        assert!(allocator.try_allocate(1).is_none());

        unsafe {
            allocator.free(a);
            allocator.free(b);
        }
        assert_eq!(allocator.inner().stats().live_bytes, 0);
    }

    #[test]
    fn test_rearm() {
        let allocator = FaultInjectingAllocator::exhausted(HostAllocator::default());
        assert!(allocator.try_allocate(4).is_none());

        allocator.rearm(1);
        let block = allocator.try_allocate(4).unwrap();
        unsafe { allocator.free(block) };
    }
}
