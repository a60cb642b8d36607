//! A reentrancy-safe trace macro for the List's growth/relocation/pair-
//! release bookkeeping.
//!
//! Hand-rolled rather than routed through `log`/`tracing`, because a
//! global logger could itself allocate and reenter the allocator
//! mid-operation — the one thing no caller of a `List` may do. This macro
//! writes straight to stderr and performs no allocation; it compiles to
//! nothing unless the `debug_log` feature is enabled.
#[macro_export]
macro_rules! debug_log {
  ($($arg:tt)*) => {
    #[cfg(feature = "debug_log")]
    {
      eprintln!("[list-allocator] {}", format_args!($($arg)*));
    }
  };
}
