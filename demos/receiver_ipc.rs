use crate::common::receiver;
use memmap2::MmapOptions;
use std::fs::OpenOptions;

mod common;

/// This example assumes a memory mapped file has already been created and will attach a
/// receiver to it. The memory mapped file must be initialised (its length set) by the
/// transmitter before it can be used.

fn main() -> anyhow::Result<()> {
    let file = OpenOptions::new().read(true).open("broadcast.dat")?;

    // wait until file has been initialised
    loop {
        let len = file.metadata()?.len() as usize;
        if len > 0 {
            break;
        }
    }

    let mmap = unsafe { MmapOptions::new().map(&file)? };
    let bytes = mmap.as_ref();

    receiver(bytes)?;

    Ok(())
}
