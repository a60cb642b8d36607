//! The child handle: a thin wrapper around a live child allocator that
//! tracks bytes currently outstanding so the List can answer the
//! emptiness test (`outstanding == 0`) without asking the child.
//!
//! Most of a handle's behavior is delegated straight through to the child;
//! the handle itself owns exactly one `usize` of bookkeeping.

/// A live child allocator plus its outstanding-byte counter.
pub(crate) struct ChildHandle<C> {
  pub(crate) child: C,
  outstanding: usize,
}

impl<C> ChildHandle<C> {
  pub(crate) fn new(child: C) -> Self {
    Self { child, outstanding: 0 }
  }

  /// True iff the child holds no client allocation.
  pub(crate) fn is_empty(&self) -> bool {
    self.outstanding == 0
  }

  pub(crate) fn add_outstanding(&mut self, bytes: usize) {
    self.outstanding += bytes;
  }

  pub(crate) fn sub_outstanding(&mut self, bytes: usize) {
    self.outstanding = self.outstanding.saturating_sub(bytes);
  }
}
