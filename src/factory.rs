//! The child factory: produces a fresh child able to satisfy at least one
//! allocation of a given byte count.

use crate::error::AllocError;

/// Produces children for a [`crate::list::List`].
///
/// Accepts a minimum byte count `n` and returns a child able to satisfy
/// at least one allocation of `n`. In ouroboros mode, the `n` a factory
/// sees is occasionally larger than the triggering client request,
/// because the composite folds in space for its own slot array plus
/// headroom; implementors must tolerate this.
pub trait Factory {
  type Child;

  fn create(&mut self, min_bytes: usize) -> Result<Self::Child, AllocError>;
}

/// Reference factory: produces a [`crate::region::Region`] sized to
/// `max(requested, minimum)`, so small requests still get a reasonably
/// sized child instead of one just barely big enough.
pub struct SizedRegionFactory {
  minimum: usize,
}

impl SizedRegionFactory {
  pub const DEFAULT_MINIMUM: usize = 4 * 1024 * 1024;

  pub fn new(minimum: usize) -> Self {
    Self { minimum }
  }
}

impl Default for SizedRegionFactory {
  fn default() -> Self {
    Self::new(Self::DEFAULT_MINIMUM)
  }
}

impl Factory for SizedRegionFactory {
  type Child = crate::region::Region;

  fn create(&mut self, min_bytes: usize) -> Result<Self::Child, AllocError> {
    crate::region::Region::new(min_bytes.max(self.minimum))
  }
}
