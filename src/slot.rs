//! The slot and its MRU chain link.
//!
//! A slot is a pair `(handle, next)`. `next` doubles as the liveness tag,
//! distinguishing *unused*, *live-with-successor*, and *live-last* using
//! a single self-referential value: a slot whose `next` equals its own
//! index is unused. Using `u32` indices rather than raw pointers for the
//! chain links means this trick needs no pointer translation when the
//! backing storage relocates — an index that meant "slot 7" still means
//! "slot 7" in the new buffer.

use std::mem::MaybeUninit;

use crate::handle::ChildHandle;

/// A chain pointer: either the index of the next live slot, or
/// [`SlotLink::END`] terminating the chain. Whether a slot is *live* at
/// all is not encoded here — it's the caller's job to compare `next`
/// against the slot's own index (see [`is_unused`]).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct SlotLink(u32);

impl SlotLink {
  /// No successor: either the last live slot in the chain, or (when
  /// stored as `root`) no live slots at all.
  pub(crate) const END: SlotLink = SlotLink(u32::MAX);

  pub(crate) fn index(i: u32) -> Self {
    debug_assert_ne!(i, u32::MAX, "slot index collides with the END sentinel");
    SlotLink(i)
  }

  pub(crate) fn is_end(self) -> bool {
    self.0 == u32::MAX
  }

  pub(crate) fn as_index(self) -> Option<u32> {
    if self.is_end() { None } else { Some(self.0) }
  }
}

/// One cell of the slot array: either unused, or a live child plus its
/// chain link.
pub(crate) struct Slot<C> {
  pub(crate) next: SlotLink,
  pub(crate) handle: MaybeUninit<ChildHandle<C>>,
}

impl<C> Slot<C> {
  /// Builds the "unused" state for the slot living at `own_index`.
  pub(crate) fn unused_at(own_index: u32) -> Self {
    Slot { next: SlotLink::index(own_index), handle: MaybeUninit::uninit() }
  }
}

/// True iff the slot at `own_index` is unused (self-index sentinel).
pub(crate) fn is_unused<C>(slot: &Slot<C>, own_index: u32) -> bool {
  slot.next.as_index() == Some(own_index)
}
