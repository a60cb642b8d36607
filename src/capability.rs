//! The child capability surface.
//!
//! Each capability is its own narrow trait rather than one monolithic
//! interface with stub methods, so a child that only implements
//! [`Allocate`] still compiles against [`crate::list::List`] — `owns`,
//! `expand`, `reallocate`, `deallocate`, and `deallocate_all` simply never
//! appear in the composite's API for that instantiation. The gating is a
//! compile-time trait bound on the relevant `impl` block, not a runtime
//! capability flag. `unsafe trait` marks the memory-safety-relevant
//! members; default methods appear only where a generic fallback exists
//! for every implementor.

use std::alloc::Layout;
use std::cmp::Ordering;
use std::ptr::{self, NonNull};

use crate::error::AllocError;

/// Minimum capability every child must have: serve a request of exactly
/// `layout`, and report the alignment the composite exposes verbatim.
///
/// # Safety
/// Implementors must return memory valid for `layout.size()` bytes,
/// aligned to at least `layout.align()`, and distinct from any other live
/// allocation from the same instance.
pub unsafe trait Allocate {
  /// Attempts to allocate `layout`. The returned slice's length need not
  /// equal `layout.size()`, but a `List` never trims an over-sized
  /// response: it only accepts a block whose length is *exactly* the
  /// requested size, and keeps walking its chain otherwise.
  ///
  /// # Safety
  /// Caller must eventually deallocate (if supported) with the same
  /// layout that produced this allocation.
  unsafe fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError>;

  /// The alignment this child guarantees for every allocation.
  fn alignment(&self) -> usize;
}

/// Ownership queries. Required for `owns`, `deallocate`, `expand`, and
/// `reallocate` at the composite level.
///
/// # Safety
/// A `true` result must be authoritative: the composite does not
/// second-guess a positive `owns` answer.
pub unsafe trait Owns: Allocate {
  fn owns(&self, ptr: NonNull<u8>) -> bool;
}

/// In-place resize without moving the block.
///
/// # Safety
/// `ptr`/`layout` must describe a block this child currently owns.
pub unsafe trait Expand: Owns {
  /// Attempts to grow `ptr` (currently `layout`) by `delta` bytes in
  /// place. Returns `true` on success; `ptr` is unchanged either way.
  ///
  /// # Safety
  /// `ptr`/`layout` must describe a block this child currently owns.
  unsafe fn expand(&self, ptr: NonNull<u8>, layout: Layout, delta: usize) -> bool;
}

/// Resize to an arbitrary new size, possibly moving the block.
///
/// # Safety
/// `ptr`/`layout` must describe a block this child currently owns. On
/// success the old pointer is invalidated.
pub unsafe trait Reallocate: Owns {
  /// # Safety
  /// `ptr`/`layout` must describe a block this child currently owns. On
  /// success the old pointer is invalidated.
  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Result<NonNull<[u8]>, AllocError>;

  /// Generic allocate-copy-deallocate fallback, usable by any `Reallocate`
  /// implementor that cannot resize more cleverly: allocate a fresh block
  /// at the new size, copy the overlapping prefix, deallocate the old
  /// block.
  ///
  /// # Safety
  /// Same as `reallocate`.
  unsafe fn reallocate_via_copy(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Result<NonNull<[u8]>, AllocError>
  where
    Self: Deallocate,
  {
    let new_layout = Layout::from_size_align(new_size, layout.align())
      .map_err(|_| AllocError)?;
    let new_block = unsafe { self.allocate(new_layout)? };
    let copy_len = layout.size().min(new_size);
    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_block.as_ptr() as *mut u8, copy_len);
      self.deallocate(ptr, layout);
    }
    Ok(new_block)
  }
}

/// Release a single previously allocated block.
///
/// # Safety
/// `ptr`/`layout` must describe a block this child currently owns; after
/// this call `ptr` is invalid.
pub unsafe trait Deallocate: Owns {
  /// # Safety
  /// `ptr`/`layout` must describe a block this child currently owns;
  /// after this call `ptr` is invalid.
  unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Release every block a child has ever served, in one step.
///
/// # Safety
/// After this call every previously returned pointer from this child is
/// invalid, including ones the caller forgot to `deallocate` individually.
pub unsafe trait DeallocateAll: Allocate {
  /// # Safety
  /// After this call every previously returned pointer from this child is
  /// invalid, including ones the caller forgot to `deallocate` individually.
  unsafe fn deallocate_all(&self);
}

/// Compares a returned block's length against the exact size requested:
/// `Equal` is satisfaction, anything else means "keep walking" (a `List`
/// never trims an over-sized response down to fit).
pub(crate) fn satisfies(block: &NonNull<[u8]>, requested: usize) -> bool {
  matches!(block.len().cmp(&requested), Ordering::Equal)
}
