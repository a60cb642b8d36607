use std::alloc::Layout;
use std::ptr::NonNull;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use list_allocator::{Allocate, Deallocate, List, SizedRegionFactory};

fn bench_allocate_deallocate(c: &mut Criterion) {
  c.bench_function("allocate+deallocate same-size, steady state", |b| {
    let list = List::new_ouroboros(SizedRegionFactory::default());
    let layout = Layout::from_size_align(64, 8).unwrap();

    b.iter(|| {
      let block = unsafe { list.allocate(black_box(layout)) }.unwrap();
      let ptr = NonNull::new(block.as_ptr() as *mut u8).unwrap();
      unsafe { list.deallocate(ptr, layout) };
    });
  });
}

fn bench_chain_growth(c: &mut Criterion) {
  c.bench_function("allocate distinct sizes, growing the chain", |b| {
    b.iter(|| {
      let list = List::new_ouroboros(SizedRegionFactory::new(16 * 1024));
      for i in 1..8usize {
        let layout = Layout::from_size_align(i * 4096 + 1, 8).unwrap();
        let _ = unsafe { list.allocate(black_box(layout)) };
      }
    });
  });
}

criterion_group!(benches, bench_allocate_deallocate, bench_chain_growth);
criterion_main!(benches);
