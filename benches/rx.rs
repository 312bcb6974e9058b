use shmcast::{BroadcastBuffer, TRAILER_LENGTH};
use std::slice::from_raw_parts;
use std::time::{SystemTime, UNIX_EPOCH};

// Will measure receive delays between transmitter and receiver. The transmitter will attach
// current time in nanoseconds to outgoing messages. When the receiver reads those it will
// compute receive delay as current time in nanoseconds minus timestamp from the message.

const REGION_SIZE: usize = 1024 * 1024 * 32 + TRAILER_LENGTH;
const NUM_MESSAGES: usize = 1_000_000;

fn main() -> anyhow::Result<()> {
    let bytes = vec![0u8; REGION_SIZE];
    let addr = bytes.as_ptr() as usize;

    let rx_task = std::thread::spawn(move || {
        let bytes = unsafe { from_raw_parts(addr as *const u8, REGION_SIZE) };
        let mut rx = BroadcastBuffer::new(bytes).unwrap().into_receiver();

        let mut payload = [0u8; 8];
        let mut latencies = hdrhistogram::Histogram::<u64>::new(3).unwrap();

        loop {
            if !rx.receive_next() {
                continue;
            }
            if rx.read_into(&mut payload).is_err() {
                // overwritten mid-read, the record cannot be trusted
                continue;
            }
            let time = u64::from_le_bytes(payload);

            #[cold]
            #[inline(never)]
            fn poison() {
                println!("poison");
            }

            if time == 0 {
                poison();
                break;
            }

            latencies
                .record(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64 - time)
                .unwrap();
        }

        println!("######################");
        println!("receive delay (ns)");
        println!("######################");
        println!("min: {}", latencies.min());
        println!("50th: {}", latencies.value_at_percentile(50.0));
        println!("99th: {}", latencies.value_at_percentile(99.0));
        println!("99.9th: {}", latencies.value_at_percentile(99.9));
        println!("max: {}", latencies.max());
        println!("laps: {}", rx.lapped_count());
    });

    let tx_task = std::thread::spawn(move || {
        let bytes = unsafe { from_raw_parts(addr as *const u8, REGION_SIZE) };
        let mut tx = BroadcastBuffer::new(bytes).unwrap().into_transmitter();

        for _ in 0..NUM_MESSAGES {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;
            tx.transmit(1, &now.to_le_bytes()).unwrap();
        }

        // zero timestamp terminates the receiver
        tx.transmit(1, &0u64.to_le_bytes()).unwrap();
    });

    tx_task.join().unwrap();
    rx_task.join().unwrap();

    Ok(())
}
