//! Low latency, single producer & many consumer broadcast transport that works with shared
//! memory. Natively supports variable message sizes. Delivery is best effort, a consumer that
//! falls behind is lapped by the producer and resumes from the most recent record, accepting
//! the loss of everything in between.
//!
//! ## Examples
//! Create `Transmitter` and use `transmit` to publish messages.
//! ```no_run
//! use shmcast::{BroadcastBuffer, TRAILER_LENGTH};
//! use shmcast::util::AlignedBytes;
//!
//! // create transmitter
//! let bytes = AlignedBytes::<{ 1024 + TRAILER_LENGTH }>::new();
//! let mut tx = BroadcastBuffer::new(&bytes).unwrap().into_transmitter();
//!
//! // publish messages
//! tx.transmit(1, b"hello").unwrap();
//! tx.transmit(1, b"world").unwrap();
//! ```
//! Create `Receiver` and poll `receive_next` to observe the stream.
//! ```no_run
//! use shmcast::{BroadcastBuffer, TRAILER_LENGTH};
//! use shmcast::util::AlignedBytes;
//!
//! // create receiver, it joins the stream at the producer's most recent record
//! let bytes = AlignedBytes::<{ 1024 + TRAILER_LENGTH }>::new();
//! let mut rx = BroadcastBuffer::new(&bytes).unwrap().into_receiver();
//! let mut payload = [0u8; 128];
//!
//! while rx.receive_next() {
//!     let len = rx.read_into(&mut payload).unwrap();
//!     println!("type: {}, payload: {:?}", rx.type_id(), &payload[..len]);
//! }
//! ```

pub mod error;
pub mod mem;
#[cfg(feature = "mmap")]
pub mod mmap;
pub mod util;

use crossbeam_utils::CachePadded;
use std::ptr::{NonNull, copy_nonoverlapping};
use std::sync::atomic::{AtomicU64, Ordering, fence};

use crate::error::Error;
use crate::mem::CACHE_LINE_SIZE;
// re-export
pub use error::Result;
use std::mem::{align_of, size_of};

/// Counter trailer length in bytes, located immediately after the message area.
pub const TRAILER_LENGTH: usize = CACHE_LINE_SIZE * 2;
/// Record header length in bytes.
pub const HEADER_LENGTH: usize = size_of::<RecordHeader>();
/// Alignment unit applied to every record's total length.
pub const RECORD_ALIGNMENT: usize = align_of::<RecordHeader>();
/// Reserved type id that marks unused space at the end of the buffer before a lap.
pub const PADDING_TYPE_ID: i32 = -1;

// trailer counter offsets, relative to the end of the message area
const TAIL_INTENT_COUNTER_OFFSET: usize = 0;
const TAIL_COUNTER_OFFSET: usize = size_of::<u64>();
const LATEST_COUNTER_OFFSET: usize = 2 * size_of::<u64>();

/// Record header that precedes every message payload in the message area.
#[repr(C, align(8))]
struct RecordHeader {
    type_id: i32, // message type tag, `PADDING_TYPE_ID` is reserved
    length: u32,  // total record length including this header, unaligned
}

impl RecordHeader {
    #[inline]
    const fn is_padding(&self) -> bool {
        self.type_id == PADDING_TYPE_ID
    }

    /// Get pointer to the message payload.
    #[inline]
    const fn payload_ptr(&self) -> *const u8 {
        let header_ptr: *const RecordHeader = self;
        unsafe { header_ptr.add(1) as *const u8 }
    }

    /// Get mutable pointer to the message payload.
    #[inline]
    const fn payload_ptr_mut(&mut self) -> *mut u8 {
        let header_ptr = self as *const RecordHeader as *mut RecordHeader;
        unsafe { header_ptr.add(1) as *mut u8 }
    }
}

/// Calculate the number of bytes a record occupies in the message area once rounded up to
/// the record alignment unit.
#[inline]
const fn get_aligned_size(record_length: usize) -> usize {
    const ALIGNMENT_MASK: usize = RECORD_ALIGNMENT - 1;
    (record_length + ALIGNMENT_MASK) & !ALIGNMENT_MASK
}

/// Shared broadcast region backed by caller supplied bytes. The message area occupies
/// `bytes.len() - TRAILER_LENGTH` bytes and must be a power of two; the trailer holds the
/// tail-intent, tail and latest counters at fixed offsets.
#[derive(Debug, Clone)]
pub struct BroadcastBuffer {
    ptr: NonNull<u8>,
    capacity: usize,
    mask: u64,
    max_msg_len: usize,
}

impl BroadcastBuffer {
    /// Create new `BroadcastBuffer` by wrapping provided `bytes`. It is necessary to call
    /// `into_transmitter()` or `into_receiver()` following the buffer construction to start
    /// using it. The message area length (`bytes.len() - TRAILER_LENGTH`) must be a power
    /// of two and the region itself must start zero filled when first created.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        const MIN_REGION_SIZE: usize = TRAILER_LENGTH + 2 * RECORD_ALIGNMENT;
        if bytes.len() < MIN_REGION_SIZE {
            return Err(Error::region_too_small(bytes.len(), MIN_REGION_SIZE));
        }

        let capacity = bytes.len() - TRAILER_LENGTH;
        if !capacity.is_power_of_two() {
            return Err(Error::capacity_not_power_of_two(capacity));
        }

        debug_assert!(bytes.as_ptr().cast::<RecordHeader>().is_aligned(), "region must be 8-byte aligned");

        Ok(Self {
            ptr: NonNull::new(bytes.as_ptr() as *mut u8).unwrap(),
            capacity,
            mask: (capacity - 1) as u64,
            max_msg_len: capacity / 8,
        })
    }

    /// Message area length in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical offset into the message area for an unwrapped stream position.
    #[inline]
    const fn index(&self, position: u64) -> usize {
        (position & self.mask) as usize
    }

    /// Project one of the trailer counters out of the shared region.
    #[inline]
    fn counter(&self, offset: usize) -> &AtomicU64 {
        unsafe { &*(self.ptr.as_ptr().add(self.capacity + offset) as *const AtomicU64) }
    }

    #[inline]
    fn tail_intent_counter(&self) -> &AtomicU64 {
        self.counter(TAIL_INTENT_COUNTER_OFFSET)
    }

    #[inline]
    fn tail_counter(&self) -> &AtomicU64 {
        self.counter(TAIL_COUNTER_OFFSET)
    }

    #[inline]
    fn latest_counter(&self) -> &AtomicU64 {
        self.counter(LATEST_COUNTER_OFFSET)
    }

    /// Get reference to the record header at the given physical offset.
    #[inline]
    fn record_header(&self, record_offset: usize) -> &RecordHeader {
        unsafe { &*(self.ptr.as_ptr().add(record_offset) as *const RecordHeader) }
    }

    /// Get mutable reference to the record header at the given physical offset.
    #[inline]
    fn record_header_mut(&mut self, record_offset: usize) -> &mut RecordHeader {
        unsafe { &mut *(self.ptr.as_ptr().add(record_offset) as *mut RecordHeader) }
    }

    /// Total record length (header included) as stored at the given physical offset.
    #[inline]
    fn record_length(&self, record_offset: usize) -> usize {
        self.record_header(record_offset).length as usize
    }

    /// Will consume `self` and return instance of `Transmitter` backed by this buffer. The
    /// local tail is seeded from the tail counter so a transmitter can rejoin a region it
    /// published to before.
    pub fn into_transmitter(self) -> Transmitter {
        let tail = self.tail_counter().load(Ordering::Acquire);
        Transmitter { buffer: self, tail }
    }

    /// Will consume `self` and return instance of `Receiver` backed by this buffer. The
    /// receiver joins the stream at the most recently started record.
    pub fn into_receiver(self) -> Receiver {
        let cursor = self.latest_counter().load(Ordering::Acquire);
        let record_offset = self.index(cursor);
        Receiver {
            buffer: self,
            cursor,
            next_record: cursor,
            record_offset,
            last_gap: 0,
            lapped_count: CachePadded::new(AtomicU64::new(0)),
        }
    }
}

/// Wraps `BroadcastBuffer` and allows to publish messages. Only a single transmitter should
/// be present at any time; it never blocks and never observes its consumers.
#[derive(Debug)]
pub struct Transmitter {
    buffer: BroadcastBuffer,
    tail: u64, // local producer position, unwrapped
}

impl From<BroadcastBuffer> for Transmitter {
    fn from(buffer: BroadcastBuffer) -> Self {
        buffer.into_transmitter()
    }
}

impl Transmitter {
    /// Publish a message. The record is committed in two phases: the tail-intent counter is
    /// advanced before any record bytes are written and the tail counter only after all of
    /// them, which is what lets a receiver detect an in-progress overwrite.
    pub fn transmit(&mut self, type_id: i32, payload: &[u8]) -> Result<()> {
        if type_id < 1 {
            return Err(Error::invalid_type_id(type_id));
        }
        if payload.len() > self.buffer.max_msg_len {
            return Err(Error::max_message_length_exceeded(payload.len(), self.buffer.max_msg_len));
        }

        let mut current_tail = self.tail;
        let mut record_offset = self.buffer.index(current_tail);
        let record_length = HEADER_LENGTH + payload.len();
        let aligned_record_length = get_aligned_size(record_length);
        let new_tail = current_tail + aligned_record_length as u64;
        let to_end_of_buffer = self.buffer.capacity - record_offset;

        if aligned_record_length > to_end_of_buffer {
            // the record will not fit before the end of the buffer, declare intent over the
            // padding and the record on the next lap, then mark the remainder as padding
            self.signal_tail_intent(new_tail + to_end_of_buffer as u64);

            let padding = self.buffer.record_header_mut(record_offset);
            padding.type_id = PADDING_TYPE_ID;
            padding.length = to_end_of_buffer as u32;

            current_tail += to_end_of_buffer as u64;
            record_offset = 0;
        } else {
            self.signal_tail_intent(new_tail);
        }

        let header = self.buffer.record_header_mut(record_offset);
        header.type_id = type_id;
        header.length = record_length as u32;
        unsafe {
            copy_nonoverlapping(payload.as_ptr(), header.payload_ptr_mut(), payload.len());
        }

        self.tail = current_tail + aligned_record_length as u64;
        self.buffer.tail_counter().store(self.tail, Ordering::Release);
        self.buffer.latest_counter().store(current_tail, Ordering::Release);

        Ok(())
    }

    /// Declare intent to write up to `new_tail`. The intent store must reach memory before
    /// any of the record bytes, the fence stops the subsequent plain stores from being
    /// reordered ahead of it.
    #[inline]
    fn signal_tail_intent(&self, new_tail: u64) {
        self.buffer.tail_intent_counter().store(new_tail, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    /// Get maximum permissible payload length that can be accepted by the buffer,
    /// calculated as `capacity / 8`.
    #[inline]
    pub const fn max_msg_len(&self) -> usize {
        self.buffer.max_msg_len
    }

    /// Message area length in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Producer position (unwrapped) at which the next record will start.
    #[inline]
    pub const fn position(&self) -> u64 {
        self.tail
    }
}

/// Wraps `BroadcastBuffer` and allows to observe the message stream. Any number of receivers
/// can poll the same region, each holds a private cursor and requires no coordination with
/// the transmitter or with other receivers. A receiver is not shareable across threads.
#[derive(Debug)]
pub struct Receiver {
    buffer: BroadcastBuffer,
    cursor: u64,          // position of the record currently claimed, unwrapped
    next_record: u64,     // position of the next record to attempt, unwrapped
    record_offset: usize, // physical offset of the claimed record
    last_gap: u64,        // bytes skipped by the most recent resynchronization
    lapped_count: CachePadded<AtomicU64>,
}

impl Receiver {
    /// Advance to the next record if one is available. Returns `false` when the transmitter
    /// has not published past this receiver's position. When the claimed record turns out to
    /// have been overwritten the receiver counts a lap and resynchronizes to the most
    /// recently started record, the skipped range is reported through [`Receiver::last_gap`].
    ///
    /// A `true` result only means the record headers were consistent at claim time. Payload
    /// bytes read afterwards must be confirmed with [`Receiver::validate`] (or consumed via
    /// [`Receiver::read_into`] which does this) before they can be trusted.
    pub fn receive_next(&mut self) -> bool {
        let tail = self.buffer.tail_counter().load(Ordering::Acquire);
        let mut cursor = self.next_record;

        if tail <= cursor {
            return false;
        }

        let mut record_offset = self.buffer.index(cursor);

        if !self.is_within_window(cursor) {
            self.lapped_count
                .store(self.lapped_count.load(Ordering::Relaxed) + 1, Ordering::Release);
            let resynced = self.buffer.latest_counter().load(Ordering::Acquire);
            self.last_gap = resynced - cursor;
            cursor = resynced;
            record_offset = self.buffer.index(cursor);
        }

        self.cursor = cursor;
        self.next_record = cursor + get_aligned_size(self.buffer.record_length(record_offset)) as u64;

        // padding is skipped transparently, the real record restarts at the next lap
        if self.buffer.record_header(record_offset).is_padding() {
            record_offset = 0;
            self.cursor = self.next_record;
            self.next_record += get_aligned_size(self.buffer.record_length(record_offset)) as u64;
        }

        self.record_offset = record_offset;
        true
    }

    /// Re-check that the transmitter's write intent has not reached the claimed record. Must
    /// be called after the payload bytes have been read, the acquire fence orders those plain
    /// reads before the counter re-read.
    #[inline]
    pub fn validate(&self) -> bool {
        fence(Ordering::Acquire);
        self.is_within_window(self.cursor)
    }

    #[inline]
    fn is_within_window(&self, cursor: u64) -> bool {
        cursor + self.buffer.capacity as u64 > self.buffer.tail_intent_counter().load(Ordering::Acquire)
    }

    /// Type tag of the claimed record.
    #[inline]
    pub fn type_id(&self) -> i32 {
        self.buffer.record_header(self.record_offset).type_id
    }

    /// Physical offset of the claimed record's payload within the message area.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.record_offset + HEADER_LENGTH
    }

    /// Payload length of the claimed record. A length field torn by a concurrent overwrite
    /// can be arbitrary garbage, which the saturation below keeps in bounds until
    /// `validate()` rejects the record.
    #[inline]
    pub fn length(&self) -> usize {
        self.buffer.record_length(self.record_offset).saturating_sub(HEADER_LENGTH)
    }

    /// Number of times this receiver has been lapped by the transmitter. Safe to read from
    /// another thread while the owner keeps polling.
    #[inline]
    pub fn lapped_count(&self) -> u64 {
        self.lapped_count.load(Ordering::Acquire)
    }

    /// Bytes of the logical stream skipped by the most recent resynchronization, zero if the
    /// receiver has never been lapped.
    #[inline]
    pub const fn last_gap(&self) -> u64 {
        self.last_gap
    }

    /// Message area length in bytes.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Copy the claimed record's payload into `buf` and confirm it was not overwritten while
    /// being read. On success returns the number of bytes written to `buf`.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let length = self.length();
        if length > buf.len() {
            return Err(Error::insufficient_buffer_size(buf.len(), length));
        }

        // a record never crosses the end of the message area, a length that would is torn
        // and the claim is already stale
        if self.offset() + length > self.buffer.capacity {
            return Err(Error::lapped(self.cursor));
        }

        unsafe {
            copy_nonoverlapping(
                self.buffer.record_header(self.record_offset).payload_ptr(),
                buf.as_mut_ptr(),
                length,
            );
        }

        if !self.validate() {
            return Err(Error::lapped(self.cursor));
        }

        Ok(length)
    }
}
