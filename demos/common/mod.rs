use rand::{Rng, thread_rng};
use shmcast::BroadcastBuffer;
use shmcast::error::Error;

/// Publish a random message every 1 millisecond. The type id carries the symbol so the
/// receiving side can validate payload integrity.
#[allow(dead_code)]
pub fn transmitter(bytes: &[u8]) -> anyhow::Result<()> {
    let mut tx = BroadcastBuffer::new(bytes)?.into_transmitter();
    loop {
        let symbol = thread_rng().gen_range(b'A'..=b'Z');
        let msg_len = thread_rng().gen_range(1..20);
        let payload: Vec<u8> = (0..msg_len).map(|_| symbol).collect();
        tx.transmit(symbol as i32, &payload)?;
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

/// Consume messages produced by the transmitter. Each payload is validated against the type
/// id set by the transmitter and laps are reported as they are detected.
#[allow(dead_code)]
pub fn receiver(bytes: &[u8]) -> anyhow::Result<()> {
    let mut rx = BroadcastBuffer::new(bytes)?.into_receiver();
    let mut payload = [0u8; 64];
    let mut laps = 0;
    loop {
        if !rx.receive_next() {
            // adding delay here to simulate impact of a slow consumer
            std::thread::sleep(std::time::Duration::from_millis(10));
            continue;
        }

        if rx.lapped_count() > laps {
            laps = rx.lapped_count();
            println!("lapped by the transmitter, skipped {} bytes", rx.last_gap());
        }

        match rx.read_into(&mut payload) {
            Ok(len) => {
                let symbol = rx.type_id() as u8;
                assert!(payload[..len].iter().all(|b| *b == symbol));
                println!("{}", String::from_utf8_lossy(&payload[..len]));
            }
            Err(Error::Lapped(position)) => {
                println!("record at position {} overwritten mid-read, dropping it", position);
            }
            Err(e) => return Err(e.into()),
        }
    }
}
