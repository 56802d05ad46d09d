//! # simheap — a simulated heap with a tracing garbage collector
//!
//! This crate models, inside a fixed-size backing buffer of bytes, the
//! behaviour of a low-level heap manager: it services allocation and
//! deallocation requests using a choice of placement policies (first-fit,
//! best-fit, worst-fit, next-fit), enforces an 8-byte alignment discipline
//! on returned addresses, coalesces neighbouring free regions on release,
//! and periodically reclaims unreachable allocated regions via a classical
//! mark-and-sweep collector driven by an external root set and by
//! intra-block reference lists.
//!
//! ## Crate structure
//!
//! ```text
//!   simheap
//!   ├── block      - Block metadata (start, size, free/marked, references)
//!   ├── policy     - the four placement policies
//!   ├── root_set   - the GC root set
//!   ├── heap       - the backing buffer, block list, allocation index
//!   ├── collector  - mark-and-sweep
//!   ├── align      - the 8-byte alignment discipline
//!   └── error      - HeapError (InvalidFree / InvalidAccess / UnknownStrategy)
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use simheap::{Heap, Strategy, Collector};
//!
//! let mut heap = Heap::new(256);
//! heap.set_strategy(Strategy::FirstFit);
//!
//! let a = heap.allocate(16).expect("heap has room");
//! heap.write(a, 42).unwrap();
//! assert_eq!(heap.read(a).unwrap(), 42);
//!
//! let b = heap.allocate(16).unwrap();
//! heap.find_block_mut(a).unwrap().add_reference(b);
//! heap.root_set_mut().add(a);
//!
//! Collector::new(&mut heap).collect();
//! assert!(!heap.find_block(a).unwrap().is_free());
//! assert!(!heap.find_block(b).unwrap().is_free());
//! ```
//!
//! ## Non-goals
//!
//! No real OS memory is touched — addresses are indices into a simulated
//! byte buffer. No concurrency, no compaction, no generational or
//! incremental collection, no finalisers, no weak references. This crate
//! is single-threaded and non-suspending: every public operation is a
//! straight-line synchronous procedure. Re-entering a `Heap` from within a
//! reference traversal is not supported.

pub mod align;
pub mod block;
pub mod collector;
pub mod error;
pub mod heap;
pub mod policy;
pub mod root_set;

pub use block::Block;
pub use collector::Collector;
pub use error::HeapError;
pub use heap::Heap;
pub use policy::Strategy;
pub use root_set::RootSet;
