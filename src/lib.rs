//! # list-allocator — a composite of lazily grown, MRU-managed children
//!
//! A `List` does not allocate memory itself. It holds a chain of child
//! sub-allocators, created on demand by a [`Factory`], and forwards each
//! operation to whichever child owns the block in question (or, for
//! `allocate`, to the first child with room — falling back to growing
//! the chain by one child when none has room).
//!
//! ```text
//!   List
//!   ┌───────────────────────────────────────────────────────────┐
//!   │  slot array (self-hosted in a child, or in a separate      │
//!   │  bookkeeping allocator)                                    │
//!   │                                                             │
//!   │   root ──▶ [slot 2] ──▶ [slot 0] ──▶ [slot 1] ──▶ END       │
//!   │             (MRU)                      (LRU)                │
//!   └───────────────────────────────────────────────────────────┘
//!         each slot: a child + its outstanding byte count
//! ```
//!
//! Re-used (just-touched) children move to the front of the chain so the
//! common case — repeated alloc/dealloc against whichever child was used
//! last — is an O(1) chain-head check, not a full scan.
//!
//! ## Crate structure
//!
//! ```text
//!   list_allocator
//!   ├── align        - Alignment macros (align!, align_to!)
//!   ├── error         - AllocError
//!   ├── capability    - Allocate/Owns/Expand/Reallocate/Deallocate/DeallocateAll traits
//!   ├── handle        - ChildHandle<C> (a child plus its outstanding byte count)
//!   ├── slot          - Slot<C>, SlotLink (the index-linked MRU chain cell)
//!   ├── raw_slots     - RawSlots<C>, SlotStore<C> (slot array storage + chain walking)
//!   ├── bookkeeping   - SlotArrayHost, Ouroboros, External (where the slot array lives)
//!   ├── factory       - Factory trait, SizedRegionFactory
//!   ├── region        - Region (reference bump-allocator child)
//!   ├── debug_log     - trace macro
//!   └── list          - List<C, F, K>, the composite itself
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use std::alloc::Layout;
//! use list_allocator::{Allocate, Deallocate, List, SizedRegionFactory};
//!
//! let list = List::new_ouroboros(SizedRegionFactory::default());
//!
//! let layout = Layout::new::<u64>();
//! let block = unsafe { list.allocate(layout) }.unwrap();
//! let ptr = block.as_ptr() as *mut u8;
//!
//! unsafe {
//!     use std::ptr::NonNull;
//!     list.deallocate(NonNull::new(ptr).unwrap(), layout);
//! }
//! ```
//!
//! ## Safety
//!
//! Every capability method is `unsafe`: callers must supply a `Layout`
//! matching the one a block was allocated with, and pointers that were
//! actually served by this allocator. No operation may be called
//! re-entrantly from within another operation already in progress on the
//! same `List` (a `RefCell` double-borrow panics if this is violated).

pub mod align;
mod bookkeeping;
pub mod capability;
mod debug_log;
mod error;
mod factory;
mod handle;
mod list;
mod raw_slots;
mod region;
mod slot;

pub use bookkeeping::{External, Ouroboros};
pub use capability::{Allocate, Deallocate, DeallocateAll, Expand, Owns, Reallocate};
pub use error::AllocError;
pub use factory::{Factory, SizedRegionFactory};
pub use list::List;
pub use region::Region;
