use crate::common::transmitter;
use memmap2::MmapOptions;
use shmcast::TRAILER_LENGTH;
use std::fs::{OpenOptions, remove_file};
use std::path::Path;

mod common;

/// This example will create a memory mapped file and attach a transmitter to it.
/// If the file exists it will be removed so that any potential receivers can detect message
/// loss and act accordingly.
fn main() -> anyhow::Result<()> {
    let path = Path::new("broadcast.dat");
    if path.exists() {
        println!("removing {}", path.display());
        remove_file(path)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open("broadcast.dat")?;
    file.set_len((1024 + TRAILER_LENGTH) as u64)?;
    file.sync_all()?;

    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    let bytes = mmap.as_ref();

    transmitter(bytes)?;

    Ok(())
}
