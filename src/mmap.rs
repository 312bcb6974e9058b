//! Provides wrappers for `Transmitter` and `Receiver` to work with memory mapped files.

use crate::{BroadcastBuffer, Receiver, Result, Transmitter};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// Transmitter backed by memory mapped object.
pub struct MappedTransmitter {
    transmitter: Transmitter,
    #[allow(dead_code)]
    mmap: MmapMut,
}

impl Deref for MappedTransmitter {
    type Target = Transmitter;

    fn deref(&self) -> &Self::Target {
        &self.transmitter
    }
}

impl DerefMut for MappedTransmitter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transmitter
    }
}

impl MappedTransmitter {
    /// Construct transmitter backed by memory mapped file of certain size. If the file
    /// already exists it will be removed so that the region starts out zero filled and any
    /// receivers still attached to the old file can detect message loss. To continue
    /// publishing to an existing file use `MappedTransmitter::join` instead.
    pub fn create(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            std::fs::remove_file(path.as_ref())?;
        }

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        file.set_len(size as u64)?;
        file.sync_all()?;

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let bytes = mmap.as_ref();
        Ok(Self {
            transmitter: BroadcastBuffer::new(bytes)?.into_transmitter(),
            mmap,
        })
    }

    /// Construct transmitter backed by memory mapped file and continue publishing from the
    /// stored tail position. It assumes the file already exists.
    pub fn join(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let bytes = mmap.as_ref();
        Ok(Self {
            transmitter: BroadcastBuffer::new(bytes)?.into_transmitter(),
            mmap,
        })
    }
}

/// Receiver backed by memory mapped object. The mapping is read-only, receivers never
/// mutate the shared region.
pub struct MappedReceiver {
    receiver: Receiver,
    #[allow(dead_code)]
    mmap: Mmap,
}

impl Deref for MappedReceiver {
    type Target = Receiver;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl DerefMut for MappedReceiver {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}

impl MappedReceiver {
    /// Construct receiver backed by memory mapped file, joining the stream at the
    /// transmitter's most recently started record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let bytes = mmap.as_ref();
        Ok(Self {
            receiver: BroadcastBuffer::new(bytes)?.into_receiver(),
            mmap,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::TRAILER_LENGTH;
    use crate::mmap::{MappedReceiver, MappedTransmitter};
    use tempfile::NamedTempFile;

    const REGION_SIZE: usize = 1024 + TRAILER_LENGTH;

    #[test]
    fn should_use_mapped_transmitter_and_receiver() {
        let file = NamedTempFile::new().unwrap();

        let mut tx = MappedTransmitter::create(&file, REGION_SIZE).unwrap();
        let mut rx = MappedReceiver::open(&file).unwrap();

        tx.transmit(100, b"hello").unwrap();
        tx.transmit(101, b"world").unwrap();

        let mut payload = [0u8; 16];

        assert!(rx.receive_next());
        assert_eq!(100, rx.type_id());
        let len = rx.read_into(&mut payload).unwrap();
        assert_eq!(b"hello", &payload[..len]);

        assert!(rx.receive_next());
        assert_eq!(101, rx.type_id());
        let len = rx.read_into(&mut payload).unwrap();
        assert_eq!(b"world", &payload[..len]);

        assert!(!rx.receive_next());
    }

    #[test]
    fn should_continue_publishing_after_join() {
        let file = NamedTempFile::new().unwrap();

        {
            let mut tx = MappedTransmitter::create(&file, REGION_SIZE).unwrap();
            tx.transmit(100, b"first").unwrap();
            tx.transmit(101, b"second").unwrap();
        }

        let mut tx = MappedTransmitter::join(&file).unwrap();
        assert_eq!(32, tx.position());
        tx.transmit(102, b"third").unwrap();

        // a receiver opening now joins at the most recently started record
        let mut rx = MappedReceiver::open(&file).unwrap();
        let mut payload = [0u8; 16];

        assert!(rx.receive_next());
        assert_eq!(102, rx.type_id());
        let len = rx.read_into(&mut payload).unwrap();
        assert_eq!(b"third", &payload[..len]);

        assert!(!rx.receive_next());
    }
}
