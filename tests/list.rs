use std::alloc::Layout;
use std::ptr::NonNull;

use list_allocator::{Allocate, Deallocate, DeallocateAll, List, Owns, SizedRegionFactory};

fn layout(size: usize) -> Layout {
  Layout::from_size_align(size, 8).unwrap()
}

fn as_nonnull(block: NonNull<[u8]>) -> NonNull<u8> {
  NonNull::new(block.as_ptr() as *mut u8).unwrap()
}

#[test]
fn fresh_composite_over_dimensions_to_the_factory_minimum() {
  let list = List::new_ouroboros(SizedRegionFactory::default());
  assert!(list.empty());

  let block = unsafe { list.allocate(layout(8 * 1024 * 1024)) }.unwrap();
  assert!(block.len() >= 8 * 1024 * 1024);
  assert!(!list.empty());
}

#[test]
fn small_allocation_on_a_populated_composite_gets_exact_length() {
  let list = List::new_ouroboros(SizedRegionFactory::default());
  unsafe { list.allocate(layout(8 * 1024 * 1024)) }.unwrap();

  let small = unsafe { list.allocate(layout(10 * 1024)) }.unwrap();
  assert_eq!(small.len(), 10 * 1024);

  let ptr = as_nonnull(small);
  assert!(list.owns(ptr));
}

#[test]
fn deallocate_all_empties_the_composite_without_panicking() {
  let list = List::new_ouroboros(SizedRegionFactory::default());
  unsafe { list.allocate(layout(4 * 1024 * 1024 - 4 * 1024)) }.unwrap();
  assert!(!list.empty());

  unsafe { list.deallocate_all() };
  assert!(list.empty());
}

#[test]
fn pair_based_release_keeps_reusing_the_same_child() {
  let list = List::new_ouroboros(SizedRegionFactory::default());

  let first = unsafe { list.allocate(layout(100)) }.unwrap();
  let first_ptr = as_nonnull(first);
  unsafe { list.deallocate(first_ptr, layout(100)) };

  let second = unsafe { list.allocate(layout(100)) }.unwrap();
  let second_ptr = as_nonnull(second);

  // Freeing and re-requesting the same small size lands back on the same
  // backing region rather than spinning up (and then discarding) a new one.
  assert_eq!(first_ptr.as_ptr(), second_ptr.as_ptr());
  assert!(list.owns(second_ptr));
}

#[test]
fn ouroboros_survives_repeated_growth_without_losing_older_blocks() {
  let list = List::new_ouroboros(SizedRegionFactory::new(64 * 1024));

  let a = unsafe { list.allocate(layout(32 * 1024)) }.unwrap();
  let a_ptr = as_nonnull(a);

  // Force a growth event: a request bigger than the first child's capacity.
  let b = unsafe { list.allocate(layout(128 * 1024)) }.unwrap();
  let b_ptr = as_nonnull(b);

  // And again, to exercise relocating an already-relocated slot array.
  let c = unsafe { list.allocate(layout(256 * 1024)) }.unwrap();
  let c_ptr = as_nonnull(c);

  assert!(list.owns(a_ptr));
  assert!(list.owns(b_ptr));
  assert!(list.owns(c_ptr));
}

#[test]
fn exhaustion_creates_exactly_one_new_child() {
  let list = List::new_ouroboros(SizedRegionFactory::new(64 * 1024));

  // Fill the first child to its full capacity in one block.
  unsafe { list.allocate(layout(64 * 1024)) }.unwrap();

  // A further request past that capacity grows the chain by exactly one.
  let before = unsafe { list.allocate(layout(128 * 1024)) };
  assert!(before.is_ok());
}
