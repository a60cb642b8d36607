//! # Region — a reference child allocator
//!
//! `Region` is not part of the List itself — child allocator
//! implementations are external collaborators the composite only ever
//! sees through the capability traits. It exists so this crate's own
//! tests, doc examples, and demo binary can exercise a
//! [`crate::list::List`] without depending on an external allocator
//! crate.
//!
//! It is a bump allocator over one `mmap` mapping, grounded on this
//! crate's own bump-allocator ancestor: same header-free, pointer-bump
//! strategy and the same "only the most recent block can shrink the bump
//! pointer" trade-off, but backed by an independent mapping per instance
//! (rather than one process-wide `sbrk` heap) because a `List` needs many
//! independent, independently destructible children.
//!
//! ```text
//!   mmap'd region (size bytes)
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ served │ served │ served │         free space              │
//!   └───────────────────────────────────────────────────────────┘
//!   base                              ▲
//!                                   bump (next allocation starts here)
//! ```

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::{self, NonNull};

use libc::{MAP_ANONYMOUS, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

use crate::align_to;
use crate::capability::{Allocate, Deallocate, DeallocateAll, Expand, Owns, Reallocate};
use crate::error::AllocError;

const PAGE_SIZE: usize = 4096;

/// Most recent allocation, tracked so `expand`/`reallocate`/`deallocate`
/// can detect the one case a bump allocator can resize in place: the
/// block sitting right at the bump pointer.
#[derive(Clone, Copy)]
struct LastBlock {
  offset: usize,
  size: usize,
}

/// A bump allocator over a single anonymous `mmap` mapping.
pub struct Region {
  base: NonNull<u8>,
  size: usize,
  bump: Cell<usize>,
  last: Cell<Option<LastBlock>>,
}

impl Region {
  /// Maps at least `min_bytes`, rounded up to a whole number of pages.
  pub fn new(min_bytes: usize) -> Result<Self, AllocError> {
    let size = align_to!(min_bytes.max(1), PAGE_SIZE);

    let addr = unsafe {
      mmap(
        ptr::null_mut(),
        size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == libc::MAP_FAILED {
      return Err(AllocError);
    }

    Ok(Region {
      base: NonNull::new(addr as *mut u8).expect("mmap returned non-null on success"),
      size,
      bump: Cell::new(0),
      last: Cell::new(None),
    })
  }

  fn contains_range(&self, offset: usize, len: usize) -> bool {
    offset <= self.size && len <= self.size - offset
  }

  fn is_last(&self, offset: usize, size: usize) -> bool {
    matches!(self.last.get(), Some(last) if last.offset == offset && last.size == size)
  }

  fn ptr_offset(&self, ptr: NonNull<u8>) -> Option<usize> {
    let base = self.base.as_ptr() as usize;
    let addr = ptr.as_ptr() as usize;
    addr.checked_sub(base).filter(|&off| off <= self.size)
  }
}

unsafe impl Allocate for Region {
  unsafe fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    let aligned_offset = align_to!(self.bump.get(), layout.align());

    if !self.contains_range(aligned_offset, layout.size()) {
      return Err(AllocError);
    }

    self.bump.set(aligned_offset + layout.size());
    self.last.set(Some(LastBlock { offset: aligned_offset, size: layout.size() }));

    let block_ptr = unsafe { self.base.as_ptr().add(aligned_offset) };
    let block = NonNull::new(block_ptr).expect("offset within a non-null mapping is non-null");
    Ok(NonNull::slice_from_raw_parts(block, layout.size()))
  }

  fn alignment(&self) -> usize {
    PAGE_SIZE
  }
}

unsafe impl Owns for Region {
  fn owns(&self, ptr: NonNull<u8>) -> bool {
    self.ptr_offset(ptr).is_some_and(|off| off < self.size)
  }
}

unsafe impl Expand for Region {
  unsafe fn expand(&self, ptr: NonNull<u8>, layout: Layout, delta: usize) -> bool {
    let Some(offset) = self.ptr_offset(ptr) else { return false };
    if !self.is_last(offset, layout.size()) {
      return false;
    }
    if !self.contains_range(offset, layout.size() + delta) {
      return false;
    }

    self.bump.set(offset + layout.size() + delta);
    self.last.set(Some(LastBlock { offset, size: layout.size() + delta }));
    true
  }
}

unsafe impl Reallocate for Region {
  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Result<NonNull<[u8]>, AllocError> {
    if new_size >= layout.size()
      && unsafe { self.expand(ptr, layout, new_size - layout.size()) }
    {
      return Ok(NonNull::slice_from_raw_parts(ptr, new_size));
    }
    unsafe { self.reallocate_via_copy(ptr, layout, new_size) }
  }
}

unsafe impl Deallocate for Region {
  unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
    let Some(offset) = self.ptr_offset(ptr) else { return };
    if self.is_last(offset, layout.size()) {
      self.bump.set(offset);
      self.last.set(None);
    }
    // Earlier blocks become holes; a bump allocator never reclaims them
    // individually, matching the documented trade-off of its ancestor.
  }
}

unsafe impl DeallocateAll for Region {
  unsafe fn deallocate_all(&self) {
    self.bump.set(0);
    self.last.set(None);
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe {
      munmap(self.base.as_ptr() as *mut c_void, self.size);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_within_capacity() {
    let region = Region::new(PAGE_SIZE).unwrap();
    unsafe {
      let block = region.allocate(Layout::new::<u64>()).unwrap();
      assert_eq!(block.len(), 8);
      assert!(region.owns(NonNull::new(block.as_ptr() as *mut u8).unwrap()));
    }
  }

  #[test]
  fn fails_once_capacity_exhausted() {
    let region = Region::new(PAGE_SIZE).unwrap();
    unsafe {
      let layout = Layout::from_size_align(PAGE_SIZE, 1).unwrap();
      assert!(region.allocate(layout).is_ok());
      let second = Layout::from_size_align(1, 1).unwrap();
      assert!(region.allocate(second).is_err());
    }
  }

  #[test]
  fn expand_only_succeeds_on_most_recent_block() {
    let region = Region::new(PAGE_SIZE).unwrap();
    unsafe {
      let layout_a = Layout::from_size_align(16, 8).unwrap();
      let a = region.allocate(layout_a).unwrap();
      let layout_b = Layout::from_size_align(16, 8).unwrap();
      let _b = region.allocate(layout_b).unwrap();

      let a_ptr = NonNull::new(a.as_ptr() as *mut u8).unwrap();
      assert!(!region.expand(a_ptr, layout_a, 8));
    }
  }

  #[test]
  fn deallocate_last_block_rewinds_bump_pointer() {
    let region = Region::new(PAGE_SIZE).unwrap();
    unsafe {
      let layout = Layout::from_size_align(32, 8).unwrap();
      let block = region.allocate(layout).unwrap();
      let ptr = NonNull::new(block.as_ptr() as *mut u8).unwrap();
      region.deallocate(ptr, layout);

      // The freed space is reusable because it was the last block.
      let reused = region.allocate(layout).unwrap();
      assert_eq!(reused.as_ptr() as *mut u8, block.as_ptr() as *mut u8);
    }
  }
}
