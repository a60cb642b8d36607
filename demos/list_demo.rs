use std::alloc::Layout;
use std::io::BufRead;

use list_allocator::{Allocate, Deallocate, List, SizedRegionFactory};

/// Waits until the user presses ENTER. Useful for inspecting process memory
/// with `pmap`/`htop` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let mut line = String::new();
  let _ = std::io::stdin().lock().read_line(&mut line);
}

fn main() {
  // A self-hosted List: its own bookkeeping slot array lives inside one of
  // its own children, so no external bookkeeping allocator is needed.
  let list = List::new_ouroboros(SizedRegionFactory::new(64 * 1024));

  println!("[start] list is empty: {}", list.empty());
  block_until_enter_pressed();

  unsafe {
    // 1) First allocation creates the first child.
    let layout_a = Layout::new::<u64>();
    let a = list.allocate(layout_a).unwrap();
    println!("\n[1] Allocated {} bytes at {:?}", layout_a.size(), a.as_ptr());
    block_until_enter_pressed();

    // 2) A second small allocation reuses the same (MRU) child.
    let layout_b = Layout::array::<u8>(64).unwrap();
    let b = list.allocate(layout_b).unwrap();
    println!("\n[2] Allocated {} bytes at {:?}", layout_b.size(), b.as_ptr());
    block_until_enter_pressed();

    // 3) An oversized request grows the chain with a fresh child.
    let layout_big = Layout::array::<u8>(128 * 1024).unwrap();
    let big = list.allocate(layout_big).unwrap();
    println!("\n[3] Allocated {} bytes at {:?} (forced a new child)", layout_big.size(), big.as_ptr());
    block_until_enter_pressed();

    // 4) Deallocating promotes the freed block's owner back to MRU root.
    let a_ptr = std::ptr::NonNull::new(a.as_ptr() as *mut u8).unwrap();
    list.deallocate(a_ptr, layout_a);
    println!("\n[4] Deallocated block from step 1");
    block_until_enter_pressed();

    let b_ptr = std::ptr::NonNull::new(b.as_ptr() as *mut u8).unwrap();
    list.deallocate(b_ptr, layout_b);
    println!("[4] Deallocated block from step 2 too");

    let big_ptr = std::ptr::NonNull::new(big.as_ptr() as *mut u8).unwrap();
    list.deallocate(big_ptr, layout_big);
    println!("[4] Deallocated block from step 3 too");

    println!("\n[end] list is empty: {}", list.empty());
  }
}
