//! Sentinel error type used throughout the crate.
//!
//! Per the composite's error-handling design, there is nothing to recover
//! from locally: a failure is always "this call could not obtain enough
//! storage", identical in shape whether it bubbles up from a child, the
//! bookkeeping allocator, or the factory. `AllocError` therefore carries no
//! payload — it is a marker, not a diagnostic.

use thiserror::Error;

/// Failure to satisfy an allocation, expansion, or reallocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("allocator exhausted: unable to satisfy the request")]
pub struct AllocError;
