//! Raw memory provider.
//!
//! This module defines the [`Allocator`] contract consumed by the garbage collector
//! and the host implementation backing [`crate::HostSystem`].
//!
//! # Key Components
//!
//! - [`Allocator`] - `try_allocate` / `allocate` / `free` contract
//! - [`HostAllocator`] - thread-safe allocator over the global Rust allocator
//! - [`AllocatorStats`] - usage snapshot of a [`HostAllocator`]
//! - [`FaultInjectingAllocator`] - wrapper that fails on demand, for exercising
//!   the fatal exhaustion path
//!
//! # Exhaustion
//!
//! [`Allocator::try_allocate`] reports exhaustion with `None` and never aborts.
//! [`Allocator::allocate`] treats exhaustion as fatal. The managed heap is expected
//! to collect garbage or otherwise degrade *before* it asks for memory it cannot
//! live without.

mod allocator;
mod fault;

pub use allocator::{Allocator, AllocatorStats, HostAllocator, BLOCK_ALIGN};
pub use fault::FaultInjectingAllocator;
