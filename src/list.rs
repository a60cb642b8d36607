//! `List`: a composite allocator that lazily creates and MRU-manages a
//! chain of child sub-allocators, forwarding every operation to whichever
//! child owns the block in question.

use std::alloc::Layout;
use std::cell::RefCell;
use std::mem::size_of;
use std::ptr::{self, NonNull};

use crate::bookkeeping::{External, Ouroboros, SlotArrayHost};
use crate::capability::{
  Allocate, Deallocate, DeallocateAll, Expand, Owns, Reallocate, satisfies,
};
use crate::debug_log;
use crate::error::AllocError;
use crate::factory::Factory;
use crate::raw_slots::SlotStore;

struct Inner<C, F, K> {
  store: SlotStore<C>,
  factory: F,
  host: K,
}

/// A composite allocator over a lazily grown, MRU-ordered chain of
/// children of type `C`, produced on demand by a [`Factory`] `F`. `K`
/// selects where the bookkeeping slot array itself lives: self-hosted in
/// one of the children ([`Ouroboros`]) or in a separate bookkeeping
/// allocator ([`External`]).
///
/// All state lives behind a `RefCell`: every capability method takes
/// `&self` so a `List` can itself serve as a child of another `List`.
/// A `RefCell` double-borrow panic is exactly the symptom of calling an
/// operation re-entrantly (from inside a child's own allocate/expand/
/// etc., itself invoked through this `List`) — which no caller may do.
pub struct List<C, F, K>
where
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  inner: RefCell<Inner<C, F, K>>,
}

impl<C, F> List<C, F, Ouroboros>
where
  F: Factory<Child = C>,
  C: Owns + Expand + Deallocate + DeallocateAll,
{
  /// A `List` whose slot array lives inside one of its own children —
  /// `C` must be able to answer `owns` so the array's host can be found
  /// again on the next growth.
  pub fn new_ouroboros(factory: F) -> Self {
    List { inner: RefCell::new(Inner { store: SlotStore::new(), factory, host: Ouroboros }) }
  }
}

impl<C, F, B> List<C, F, External<B>>
where
  F: Factory<Child = C>,
  C: Allocate,
  B: Allocate + Deallocate + Expand,
{
  /// A `List` whose slot array lives in a separate bookkeeping allocator,
  /// unrelated to any child.
  pub fn new_external(factory: F, bookkeeper: B) -> Self {
    List {
      inner: RefCell::new(Inner { store: SlotStore::new(), factory, host: External::new(bookkeeper) }),
    }
  }
}

impl<C, F, K> List<C, F, K>
where
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  /// No live children.
  pub fn empty(&self) -> bool {
    self.inner.borrow().store.is_empty()
  }
}

unsafe impl<C, F, K> Allocate for List<C, F, K>
where
  C: Allocate,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  unsafe fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    let mut inner = self.inner.borrow_mut();

    let live: Vec<u32> = inner.store.chain().collect();
    for idx in live {
      let result = unsafe { inner.store.handle(idx).child.allocate(layout) };
      if let Ok(block) = result {
        debug_assert!(satisfies(&block, layout.size()), "child over/under-allocated a request");
        inner.store.handle_mut(idx).add_outstanding(block.len());
        inner.store.promote(idx);
        debug_log!("allocate: served {} bytes from slot {}", layout.size(), idx);
        return Ok(block);
      }
    }

    // If the root child exists and is already empty, it has nothing to
    // offer and growing the chain would just strand it: fail instead of
    // creating a new child while a perfectly good, unused one sits idle.
    if let Some(root) = inner.store.root.as_index()
      && inner.store.handle(root).is_empty()
    {
      return Err(AllocError);
    }

    // No live child had room: grow the chain by exactly one child.
    let idx = {
      let Inner { store, factory, host } = &mut *inner;
      let installed = unsafe { host.ensure_room(store, factory, layout.size())? };
      match installed {
        Some(idx) => idx,
        None => {
          let new_child = factory.create(layout.size())?;
          let idx = store.last_index();
          store.insert_new_root(idx, new_child);
          idx
        }
      }
    };

    let block = unsafe { inner.store.handle(idx).child.allocate(layout)? };
    debug_assert!(satisfies(&block, layout.size()), "freshly grown child over/under-allocated");
    inner.store.handle_mut(idx).add_outstanding(block.len());
    debug_log!("allocate: served {} bytes from freshly grown slot {}", layout.size(), idx);
    Ok(block)
  }

  fn alignment(&self) -> usize {
    size_of::<usize>()
  }
}

unsafe impl<C, F, K> Owns for List<C, F, K>
where
  C: Owns,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  fn owns(&self, ptr: NonNull<u8>) -> bool {
    let inner = self.inner.borrow();
    inner.store.chain().any(|idx| inner.store.handle(idx).child.owns(ptr))
  }
}

unsafe impl<C, F, K> Expand for List<C, F, K>
where
  C: Expand + Allocate,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  unsafe fn expand(&self, ptr: NonNull<u8>, layout: Layout, delta: usize) -> bool {
    // An empty block has no owner to walk to; growing it by `delta` is
    // just allocating `delta` fresh.
    if layout.size() == 0 {
      let Ok(new_layout) = Layout::from_size_align(delta, layout.align()) else {
        return false;
      };
      return match unsafe { self.allocate(new_layout) } {
        Ok(block) => block.len() == delta,
        Err(_) => false,
      };
    }

    let mut inner = self.inner.borrow_mut();
    let Some(idx) = inner.store.chain().find(|&i| inner.store.handle(i).child.owns(ptr)) else {
      return false;
    };

    let grew = unsafe { inner.store.handle(idx).child.expand(ptr, layout, delta) };
    if grew {
      inner.store.handle_mut(idx).add_outstanding(delta);
      inner.store.promote(idx);
      debug_log!("expand: grew block in slot {} by {} bytes", idx, delta);
    }
    grew
  }
}

unsafe impl<C, F, K> Reallocate for List<C, F, K>
where
  C: Reallocate + Deallocate,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  /// Forwards to the owning child's own `reallocate`. On failure, falls
  /// back to the composite's own generic reallocate pattern (allocate a
  /// fresh block from the chain, copy, deallocate the old one) rather
  /// than giving up — the owning child being unable to resize in place
  /// doesn't mean no child in the chain has room.
  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Result<NonNull<[u8]>, AllocError> {
    // An empty block has no owner to walk to; resizing it to `new_size`
    // is just allocating `new_size` fresh.
    if layout.size() == 0 {
      let new_layout = Layout::from_size_align(new_size, layout.align()).map_err(|_| AllocError)?;
      return unsafe { self.allocate(new_layout) };
    }

    let old_size = layout.size();
    {
      let mut inner = self.inner.borrow_mut();
      if let Some(idx) = inner.store.chain().find(|&i| inner.store.handle(i).child.owns(ptr)) {
        let result = unsafe { inner.store.handle(idx).child.reallocate(ptr, layout, new_size) };
        if let Ok(block) = result {
          if new_size >= old_size {
            inner.store.handle_mut(idx).add_outstanding(new_size - old_size);
          } else {
            inner.store.handle_mut(idx).sub_outstanding(old_size - new_size);
          }
          inner.store.promote(idx);
          debug_log!("reallocate: slot {} now serving {} bytes", idx, new_size);
          return Ok(block);
        }
      } else {
        return Err(AllocError);
      }
    }

    // The owning child couldn't resize in place: fall back to the
    // composite-level allocate/copy/deallocate pattern, which can land
    // the new block on a different child entirely.
    let new_layout = Layout::from_size_align(new_size, layout.align()).map_err(|_| AllocError)?;
    let new_block = unsafe { self.allocate(new_layout)? };
    let copy_len = old_size.min(new_size);
    unsafe {
      ptr::copy_nonoverlapping(ptr.as_ptr(), new_block.as_ptr() as *mut u8, copy_len);
      self.deallocate(ptr, layout);
    }
    debug_log!("reallocate: fell back to composite copy for {} bytes", new_size);
    Ok(new_block)
  }
}

unsafe impl<C, F, K> Deallocate for List<C, F, K>
where
  C: Deallocate,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
    let mut inner = self.inner.borrow_mut();
    let Some(idx) = inner.store.chain().find(|&i| inner.store.handle(i).child.owns(ptr)) else {
      return;
    };

    unsafe { inner.store.handle(idx).child.deallocate(ptr, layout) };
    inner.store.handle_mut(idx).sub_outstanding(layout.size());
    inner.store.promote(idx);
    debug_log!("deallocate: released {} bytes from slot {}", layout.size(), idx);

    if !inner.store.handle(idx).is_empty() {
      return;
    }

    // Pair-based release: destroy a second empty child, if one exists,
    // rather than the one that was just emptied — avoids immediately
    // tearing down and recreating a child that's still being used in an
    // alloc/dealloc/alloc cycle.
    let array_ptr = (inner.store.raw.cap() > 0).then(|| inner.store.raw.as_ptr());
    let mut cur = inner.store.slot(idx).next;
    let mut candidate = None;
    while let Some(i) = cur.as_index() {
      // The array's own host, in ouroboros mode, must survive even while
      // its client-facing byte count is zero — destroying it would
      // destroy the slot array mid-walk.
      let is_special = array_ptr.is_some_and(|p| inner.store.handle(i).child.owns(p));
      if !is_special && inner.store.handle(i).is_empty() {
        candidate = Some(i);
        break;
      }
      cur = inner.store.slot(i).next;
    }

    if let Some(i) = candidate {
      debug_log!("deallocate: pair-releasing empty slot {}", i);
      drop(inner.store.destroy_slot(i));
    }
  }
}

unsafe impl<C, F, K> DeallocateAll for List<C, F, K>
where
  C: DeallocateAll,
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  unsafe fn deallocate_all(&self) {
    let mut inner = self.inner.borrow_mut();
    let Inner { store, host, .. } = &mut *inner;
    unsafe { host.release_all(store) };
    debug_log!("deallocate_all: released every child and the slot array");
  }
}

impl<C, F, K> Drop for List<C, F, K>
where
  F: Factory<Child = C>,
  K: SlotArrayHost<C, F>,
{
  fn drop(&mut self) {
    let Inner { store, host, .. } = self.inner.get_mut();
    unsafe { host.teardown(store) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::factory::SizedRegionFactory;
  use crate::region::Region;

  type TestList = List<Region, SizedRegionFactory, Ouroboros>;

  fn small_list() -> TestList {
    List::new_ouroboros(SizedRegionFactory::new(64 * 1024))
  }

  #[test]
  fn starts_empty() {
    let list = small_list();
    assert!(list.empty());
  }

  #[test]
  fn first_allocation_creates_a_child() {
    let list = small_list();
    let layout = Layout::from_size_align(128, 8).unwrap();
    let block = unsafe { list.allocate(layout) }.unwrap();
    assert!(block.len() >= 128);
    assert!(!list.empty());
    let ptr = NonNull::new(block.as_ptr() as *mut u8).unwrap();
    assert!(list.owns(ptr));
  }

  #[test]
  fn second_small_allocation_reuses_the_same_child() {
    let list = small_list();
    let layout = Layout::from_size_align(128, 8).unwrap();
    unsafe { list.allocate(layout) }.unwrap();
    unsafe { list.allocate(layout) }.unwrap();
    assert_eq!(list.inner.borrow().store.chain().count(), 1);
  }

  #[test]
  fn oversized_request_grows_the_chain() {
    let list = small_list();
    let small = Layout::from_size_align(128, 8).unwrap();
    unsafe { list.allocate(small) }.unwrap();

    let huge = Layout::from_size_align(1024 * 1024, 8).unwrap();
    unsafe { list.allocate(huge) }.unwrap();
    assert_eq!(list.inner.borrow().store.chain().count(), 2);
  }

  #[test]
  fn deallocate_promotes_owner_to_mru_root() {
    let list = small_list();
    let layout = Layout::from_size_align(128, 8).unwrap();
    let small = unsafe { list.allocate(layout) }.unwrap();

    // A second, larger request grows the chain, pushing the new child to
    // the front — the first child is no longer root.
    let huge = Layout::from_size_align(1024 * 1024, 8).unwrap();
    unsafe { list.allocate(huge) }.unwrap();
    let root_before = list.inner.borrow().store.chain().next().unwrap();

    // Freeing the first (non-root) block must promote its owner back to
    // the chain head.
    let small_ptr = NonNull::new(small.as_ptr() as *mut u8).unwrap();
    unsafe { list.deallocate(small_ptr, layout) };
    let root_after = list.inner.borrow().store.chain().next();
    assert_ne!(Some(root_before), root_after);
  }

  #[test]
  fn deallocate_all_empties_the_chain() {
    let list = small_list();
    let layout = Layout::from_size_align(128, 8).unwrap();
    unsafe { list.allocate(layout) }.unwrap();
    unsafe { list.allocate(layout) }.unwrap();
    assert!(!list.empty());

    unsafe { list.deallocate_all() };
    assert!(list.empty());
  }

  #[test]
  fn empty_root_too_small_for_a_request_fails_instead_of_growing() {
    let list = small_list();
    let small = Layout::from_size_align(100, 8).unwrap();
    let block = unsafe { list.allocate(small) }.unwrap();
    let ptr = NonNull::new(block.as_ptr() as *mut u8).unwrap();
    unsafe { list.deallocate(ptr, small) };
    let root = list.inner.borrow().store.chain().next().unwrap();
    assert!(list.inner.borrow().store.handle(root).is_empty());

    // The lone (now-empty) root child can't serve a request far larger
    // than its own capacity: this must fail rather than grow a new child
    // while the idle root sits there unused.
    let huge = Layout::from_size_align(1024 * 1024, 8).unwrap();
    assert!(unsafe { list.allocate(huge) }.is_err());
  }

  #[test]
  fn reallocate_falls_back_to_the_composite_when_the_owner_cannot_resize() {
    let list = small_list();
    let small = Layout::from_size_align(100, 8).unwrap();
    let block = unsafe { list.allocate(small) }.unwrap();
    let ptr = NonNull::new(block.as_ptr() as *mut u8).unwrap();

    // Wedge another allocation right after it so the first block is no
    // longer the region's most recent, and can't grow in place.
    unsafe { list.allocate(small) }.unwrap();

    let grown_size = 1024 * 1024;
    let result = unsafe { list.reallocate(ptr, small, grown_size) };
    assert!(result.is_ok());
    assert_eq!(result.unwrap().len(), grown_size);
  }

  #[test]
  fn a_pointer_never_served_is_not_owned() {
    let list = small_list();
    let layout = Layout::from_size_align(128, 8).unwrap();
    unsafe { list.allocate(layout) }.unwrap();

    let bogus = NonNull::new(0x1000 as *mut u8).unwrap();
    assert!(!list.owns(bogus));
  }
}
