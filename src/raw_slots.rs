//! The slot array's backing storage, the MRU chain threaded through it,
//! and relocation to a larger buffer when the chain grows.
//!
//! `RawSlots<C>` is a typed view over someone else's allocation — either a
//! child's (ouroboros) or the bookkeeping allocator's (external); it does
//! not own that memory's lifetime and has no `Drop` impl. `SlotStore<C>`
//! adds the MRU `root` and the chain-walking primitives every composite
//! operation in `list.rs` builds on.

use std::alloc::Layout;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use crate::handle::ChildHandle;
use crate::slot::{Slot, SlotLink, is_unused};

/// Raw, untyped-lifetime backing storage for `cap` slot cells.
pub struct RawSlots<C> {
  ptr: NonNull<Slot<C>>,
  cap: u32,
}

impl<C> RawSlots<C> {
  pub(crate) fn empty() -> Self {
    Self { ptr: NonNull::dangling(), cap: 0 }
  }

  /// The `Layout` for `cap` slot cells — used both to request storage
  /// from a host and to release it later with a matching layout.
  pub(crate) fn layout(cap: u32) -> Layout {
    Layout::array::<Slot<C>>(cap as usize).expect("slot array layout overflow")
  }

  /// Wraps a raw buffer of at least `Self::layout(cap)` bytes as slot
  /// storage for `cap` cells.
  ///
  /// # Safety
  /// `ptr` must be valid for `Self::layout(cap)` and every cell must
  /// already hold a valid `Slot<C>` (typically freshly written "unused").
  pub(crate) unsafe fn from_raw(ptr: NonNull<u8>, cap: u32) -> Self {
    Self { ptr: ptr.cast(), cap }
  }

  pub(crate) fn cap(&self) -> u32 {
    self.cap
  }

  pub(crate) fn as_ptr(&self) -> NonNull<u8> {
    self.ptr.cast()
  }

  fn as_slice(&self) -> &[Slot<C>] {
    if self.cap == 0 {
      return &[];
    }
    unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.cap as usize) }
  }

  fn as_mut_slice(&mut self) -> &mut [Slot<C>] {
    if self.cap == 0 {
      return &mut [];
    }
    unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.cap as usize) }
  }

  /// Records that the backing allocation was grown in place (same
  /// address, more bytes) to `new_cap` cells, initializing the newly
  /// available cells as unused.
  ///
  /// # Safety
  /// The backing allocation must already be valid for
  /// `Self::layout(new_cap)`.
  pub(crate) unsafe fn grew_in_place_to(&mut self, new_cap: u32) {
    debug_assert!(new_cap >= self.cap);
    let old_cap = self.cap;
    self.cap = new_cap;
    for i in old_cap..new_cap {
      self.as_mut_slice()[i as usize] = Slot::unused_at(i);
    }
  }

  /// Copies every existing slot (live or unused) into `dest`, bitwise —
  /// child handles move as positionally owned resources, so no destructor
  /// runs on the source. Because slots link by index rather than address,
  /// no pointer translation is needed: an index that meant "slot 7"
  /// before the move still means "slot 7" after. Trailing cells of `dest`
  /// beyond `self.cap` are initialized as unused.
  pub(crate) fn relocate_into(&self, dest: &mut RawSlots<C>) {
    debug_assert!(dest.cap >= self.cap);
    if self.cap > 0 {
      unsafe {
        ptr::copy_nonoverlapping(self.ptr.as_ptr(), dest.ptr.as_ptr(), self.cap as usize);
      }
    }
    for i in self.cap..dest.cap {
      dest.as_mut_slice()[i as usize] = Slot::unused_at(i);
    }
  }
}

/// Iterator over the MRU chain, yielding live slot indices from root to
/// the terminating `END`.
pub(crate) struct ChainIter<'a, C> {
  store: &'a SlotStore<C>,
  cur: SlotLink,
}

impl<'a, C> Iterator for ChainIter<'a, C> {
  type Item = u32;

  fn next(&mut self) -> Option<u32> {
    let idx = self.cur.as_index()?;
    self.cur = self.store.slot(idx).next;
    Some(idx)
  }
}

/// The slot array plus the MRU chain threaded through it.
pub struct SlotStore<C> {
  pub(crate) raw: RawSlots<C>,
  pub(crate) root: SlotLink,
}

impl<C> SlotStore<C> {
  pub(crate) fn new() -> Self {
    Self { raw: RawSlots::empty(), root: SlotLink::END }
  }

  /// No live slots.
  pub(crate) fn is_empty(&self) -> bool {
    self.root.is_end()
  }

  pub(crate) fn slot(&self, idx: u32) -> &Slot<C> {
    &self.raw.as_slice()[idx as usize]
  }

  pub(crate) fn slot_mut(&mut self, idx: u32) -> &mut Slot<C> {
    &mut self.raw.as_mut_slice()[idx as usize]
  }

  pub(crate) fn handle(&self, idx: u32) -> &ChildHandle<C> {
    unsafe { self.slot(idx).handle.assume_init_ref() }
  }

  pub(crate) fn handle_mut(&mut self, idx: u32) -> &mut ChildHandle<C> {
    unsafe { self.slot_mut(idx).handle.assume_init_mut() }
  }

  pub(crate) fn chain(&self) -> ChainIter<'_, C> {
    ChainIter { store: self, cur: self.root }
  }

  /// Unlinks `idx` from wherever it sits in the chain, without relinking
  /// it anywhere (used just before destroying a slot).
  fn unlink(&mut self, idx: u32) {
    if self.root.as_index() == Some(idx) {
      self.root = self.slot(idx).next;
      return;
    }
    let mut cur = self.root;
    while let Some(i) = cur.as_index() {
      let next = self.slot(i).next;
      if next.as_index() == Some(idx) {
        self.slot_mut(i).next = self.slot(idx).next;
        return;
      }
      cur = next;
    }
  }

  /// MRU promotion: unlink `idx` from its current chain position and
  /// relink it at the head. A no-op if `idx` is already root.
  pub(crate) fn promote(&mut self, idx: u32) {
    if self.root.as_index() == Some(idx) {
      return;
    }
    self.unlink(idx);
    self.slot_mut(idx).next = self.root;
    self.root = SlotLink::index(idx);
  }

  /// Tears down a live slot and returns its handle for the caller to
  /// finish destroying (e.g. call `deallocate_all` on the child).
  pub(crate) fn destroy_slot(&mut self, idx: u32) -> ChildHandle<C> {
    self.unlink(idx);
    let slot = self.slot_mut(idx);
    let handle = std::mem::replace(&mut slot.handle, MaybeUninit::uninit());
    slot.next = SlotLink::index(idx);
    unsafe { handle.assume_init() }
  }

  /// Installs `child` into the unused slot at `idx` and inserts it at the
  /// chain head.
  pub(crate) fn insert_new_root(&mut self, idx: u32, child: C) {
    debug_assert!(is_unused(self.slot(idx), idx));
    let old_root = self.root;
    let slot = self.slot_mut(idx);
    slot.handle = MaybeUninit::new(ChildHandle::new(child));
    slot.next = old_root;
    self.root = SlotLink::index(idx);
  }

  /// The index of the trailing slot, valid only right after the backing
  /// storage grew by exactly one cell.
  pub(crate) fn last_index(&self) -> u32 {
    self.raw.cap() - 1
  }
}
