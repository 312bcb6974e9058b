use std::alloc::{Layout, alloc_zeroed};

pub const CACHE_LINE_SIZE: usize = 64;

/// Allocate a zeroed region suitable for hosting a broadcast buffer. The counters in the
/// trailer rely on the region starting out zero filled.
pub fn alloc_aligned(size: usize, alignment: usize) -> *const u8 {
    let layout = Layout::from_size_align(size, alignment).expect("invalid layout");
    unsafe { alloc_zeroed(layout) }
}
