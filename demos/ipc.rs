use crate::common::{receiver, transmitter};
use shmcast::TRAILER_LENGTH;
use shmcast::mem::{CACHE_LINE_SIZE, alloc_aligned};
use std::slice::from_raw_parts;

mod common;

/// This example will demonstrate the use of a shared region in order to achieve in-process
/// communication between transmitter and receiver that are running on separate threads.

const REGION_SIZE: usize = 1024 + TRAILER_LENGTH;

fn main() -> anyhow::Result<()> {
    let ptr = alloc_aligned(REGION_SIZE, CACHE_LINE_SIZE);
    let addr = ptr as usize;

    let tx_task = std::thread::spawn(move || {
        let bytes = unsafe { from_raw_parts(addr as *const u8, REGION_SIZE) };
        transmitter(bytes).unwrap();
    });

    let rx_task = std::thread::spawn(move || {
        // delay for a bit so that we are not joining from position 0
        std::thread::sleep(std::time::Duration::from_secs(1));
        let bytes = unsafe { from_raw_parts(addr as *const u8, REGION_SIZE) };
        receiver(bytes).unwrap();
    });

    tx_task.join().unwrap();
    rx_task.join().unwrap();

    Ok(())
}
