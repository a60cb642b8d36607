//! Bookkeeping-mode dispatch: where the List's own slot array lives.
//!
//! There are two distinct append paths depending on where the array is
//! hosted. Rather than branch on a runtime flag inside `List`, this crate
//! encodes the mode as
//! a [`SlotArrayHost`] strategy type, so `Ouroboros`'s `impl` can carry the
//! `C: Owns` bound its self-hosting trick genuinely needs while
//! `External<B>`'s `impl` asks nothing extra of `C` — a `List<C, F,
//! Ouroboros>` simply fails to compile for a child that can't answer
//! `owns`, which is the compile-time equivalent of gating the optional
//! composite operations by child capability.

use std::mem::size_of;
use std::ptr::NonNull;

use crate::capability::{Allocate, Deallocate, DeallocateAll, Expand, Owns};
use crate::debug_log;
use crate::error::AllocError;
use crate::factory::Factory;
use crate::raw_slots::{RawSlots, SlotStore};
use crate::slot::{Slot, SlotLink};

/// Headroom folded into the ouroboros bootstrap/relocation sizing request
/// the new child's slot array entry, the triggering request, and headroom.
const HEADROOM: usize = 128;

/// Strategy for growing and tearing down the slot array's backing
/// storage. Implemented by [`Ouroboros`] and [`External`]; not part of
/// this crate's public API — callers select a strategy by naming one of
/// those two types as `List`'s third type parameter, not by implementing
/// this trait themselves.
pub trait SlotArrayHost<C, F: Factory<Child = C>> {
  /// Ensures the slot array has room for at least one more live slot,
  /// producing and installing a new child in the process when — and only
  /// when — growing storage happens to require creating one anyway
  /// (ouroboros's relocation path: the child that hosts the relocated
  /// array doubles as the new slot). Returns the index of an
  /// already-installed child (`Some`) or `None` when the caller must
  /// still produce one via `factory` and install it at
  /// `store.last_index()`.
  ///
  /// # Safety
  /// Must only be called with exclusive access to `store` and in a
  /// non-reentrant context.
  unsafe fn ensure_room(
    &mut self,
    store: &mut SlotStore<C>,
    factory: &mut F,
    triggering_request: usize,
  ) -> Result<Option<u32>, AllocError>;

  /// Tears down every live child and the slot array itself.
  ///
  /// # Safety
  /// Same as `ensure_room`.
  unsafe fn release_all(&mut self, store: &mut SlotStore<C>)
  where
    C: DeallocateAll;

  /// Drops every live child and releases the slot array, without first
  /// asking children to reset themselves — used when the List itself is
  /// being torn down (`Drop`), as opposed to `release_all`'s "stay usable,
  /// start empty again" semantics for the explicit `deallocateAll`
  /// operation.
  ///
  /// # Safety
  /// Same as `ensure_room`.
  unsafe fn teardown(&mut self, store: &mut SlotStore<C>);
}

/// Self-hosting mode: the slot array lives inside one of the List's own
/// children (the *special child*).
pub struct Ouroboros;

impl<C, F> SlotArrayHost<C, F> for Ouroboros
where
  C: Owns + Expand + Deallocate + DeallocateAll,
  F: Factory<Child = C>,
{
  unsafe fn ensure_room(
    &mut self,
    store: &mut SlotStore<C>,
    factory: &mut F,
    triggering_request: usize,
  ) -> Result<Option<u32>, AllocError> {
    let old_cap = store.raw.cap();
    let slot_size = size_of::<Slot<C>>();

    // The slot array doesn't exist yet on the very first growth
    // (the bootstrap case) — there is no special child to
    // ask for an in-place expansion.
    let special_idx = if old_cap > 0 {
      let array_ptr = store.raw.as_ptr();
      store.chain().find(|&idx| store.handle(idx).child.owns(array_ptr))
    } else {
      None
    };

    if let Some(special_idx) = special_idx {
      let old_layout = RawSlots::<C>::layout(old_cap);
      let grew = unsafe {
        store.handle(special_idx).child.expand(store.raw.as_ptr(), old_layout, slot_size)
      };
      if grew {
        unsafe { store.raw.grew_in_place_to(old_cap + 1) };
        debug_log!("ouroboros: grew slot array in place to {} slots", old_cap + 1);
        return Ok(None);
      }
    }

    // In-place growth wasn't possible (or there was nothing to grow):
    // produce a new child sized for both the array and the client's
    // original request, and relocate into a buffer it hosts. That child
    // becomes the new last slot — it owns the array it's hosting.
    let new_cap = old_cap + 1;
    let need = (new_cap as usize) * slot_size + triggering_request + HEADROOM;
    let new_child = factory.create(need)?;
    let new_layout = RawSlots::<C>::layout(new_cap);
    let buffer = unsafe { new_child.allocate(new_layout)? };
    let new_ptr = NonNull::new(buffer.as_ptr() as *mut u8).ok_or(AllocError)?;
    let mut new_raw = unsafe { RawSlots::from_raw(new_ptr, new_cap) };
    store.raw.relocate_into(&mut new_raw);

    let old_raw = std::mem::replace(&mut store.raw, new_raw);
    // Release the old buffer through its owning child directly rather
    // than recursing into the composite's own `deallocate` — that would
    // be a re-entrant call into the List from within an operation already
    // in progress, since `ensure_room` itself runs inside `allocate`.
    if let Some(special_idx) = special_idx {
      let old_layout = RawSlots::<C>::layout(old_raw.cap());
      unsafe { store.handle(special_idx).child.deallocate(old_raw.as_ptr(), old_layout) };
      debug_log!(
        "ouroboros: released old {}-slot array via child {}",
        old_raw.cap(),
        special_idx
      );
    }

    let new_last = store.last_index();
    store.insert_new_root(new_last, new_child);
    debug_log!("ouroboros: relocating child installed as new root slot {}", new_last);
    Ok(Some(new_last))
  }

  unsafe fn release_all(&mut self, store: &mut SlotStore<C>)
  where
    C: DeallocateAll,
  {
    let array_ptr = store.raw.as_ptr();
    let live: Vec<u32> = store.chain().collect();

    let mut special = None;
    for idx in live {
      if store.handle(idx).child.owns(array_ptr) {
        special = Some(idx);
        continue;
      }
      unsafe { store.handle(idx).child.deallocate_all() };
      store.destroy_slot(idx);
    }

    if let Some(idx) = special {
      let layout = RawSlots::<C>::layout(store.raw.cap());
      let handle = store.destroy_slot(idx);
      unsafe { handle.child.deallocate(array_ptr, layout) };
    }

    store.raw = RawSlots::empty();
    store.root = SlotLink::END;
  }

  unsafe fn teardown(&mut self, store: &mut SlotStore<C>) {
    let array_ptr = store.raw.as_ptr();
    let live: Vec<u32> = store.chain().collect();

    let mut special = None;
    for idx in live {
      if store.handle(idx).child.owns(array_ptr) {
        special = Some(idx);
        continue;
      }
      drop(store.destroy_slot(idx));
    }

    if let Some(idx) = special {
      let layout = RawSlots::<C>::layout(store.raw.cap());
      let handle = store.destroy_slot(idx);
      unsafe { handle.child.deallocate(array_ptr, layout) };
      drop(handle);
    }

    store.raw = RawSlots::empty();
    store.root = SlotLink::END;
  }
}

/// External bookkeeping mode: the slot array lives in an allocation owned
/// by a separate bookkeeping allocator `B`, unrelated to any child.
pub struct External<B> {
  pub bookkeeper: B,
}

impl<B> External<B> {
  pub fn new(bookkeeper: B) -> Self {
    Self { bookkeeper }
  }
}

impl<C, F, B> SlotArrayHost<C, F> for External<B>
where
  C: Allocate,
  F: Factory<Child = C>,
  B: Allocate + Deallocate + Expand,
{
  unsafe fn ensure_room(
    &mut self,
    store: &mut SlotStore<C>,
    factory: &mut F,
    triggering_request: usize,
  ) -> Result<Option<u32>, AllocError> {
    let old_cap = store.raw.cap();
    let slot_size = size_of::<Slot<C>>();

    let mut grew_in_place = false;
    if old_cap > 0 {
      let old_layout = RawSlots::<C>::layout(old_cap);
      grew_in_place =
        unsafe { self.bookkeeper.expand(store.raw.as_ptr(), old_layout, slot_size) };
      if grew_in_place {
        unsafe { store.raw.grew_in_place_to(old_cap + 1) };
        debug_log!("external: grew slot array in place to {} slots", old_cap + 1);
      }
    }

    if !grew_in_place {
      let new_cap = old_cap + 1;
      let new_layout = RawSlots::<C>::layout(new_cap);
      let buffer = unsafe { self.bookkeeper.allocate(new_layout)? };
      let new_ptr = NonNull::new(buffer.as_ptr() as *mut u8).ok_or(AllocError)?;
      let mut new_raw = unsafe { RawSlots::from_raw(new_ptr, new_cap) };
      store.raw.relocate_into(&mut new_raw);

      let old_raw = std::mem::replace(&mut store.raw, new_raw);
      if old_raw.cap() > 0 {
        let old_layout = RawSlots::<C>::layout(old_raw.cap());
        unsafe { self.bookkeeper.deallocate(old_raw.as_ptr(), old_layout) };
      }
      debug_log!("external: relocated slot array to {} slots", new_cap);
    }

    // Unlike ouroboros, growing storage never doubles as producing the
    // new child: the bookkeeping allocator is unrelated to any child.
    let new_child = factory.create(triggering_request)?;
    let idx = store.last_index();
    store.insert_new_root(idx, new_child);
    Ok(Some(idx))
  }

  unsafe fn release_all(&mut self, store: &mut SlotStore<C>)
  where
    C: DeallocateAll,
  {
    let live: Vec<u32> = store.chain().collect();
    for idx in live {
      unsafe { store.handle(idx).child.deallocate_all() };
      store.destroy_slot(idx);
    }

    if store.raw.cap() > 0 {
      let layout = RawSlots::<C>::layout(store.raw.cap());
      unsafe { self.bookkeeper.deallocate(store.raw.as_ptr(), layout) };
    }

    store.raw = RawSlots::empty();
    store.root = SlotLink::END;
  }

  unsafe fn teardown(&mut self, store: &mut SlotStore<C>) {
    let live: Vec<u32> = store.chain().collect();
    for idx in live {
      drop(store.destroy_slot(idx));
    }

    if store.raw.cap() > 0 {
      let layout = RawSlots::<C>::layout(store.raw.cap());
      unsafe { self.bookkeeper.deallocate(store.raw.as_ptr(), layout) };
    }

    store.raw = RawSlots::empty();
    store.root = SlotLink::END;
  }
}
