//! Defines error types.
use thiserror::Error;

/// Crate result type (re-exported).
pub type Result<T> = std::result::Result<T, Error>;

/// Error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Message area length is not a power of two.
    #[error("message area length must be a power of two, got: {0}")]
    CapacityNotPowerOfTwo(usize),
    /// The provided region cannot hold the counter trailer and at least one record.
    #[error("region of insufficient size, provided: {0}, required: {1}")]
    RegionTooSmall(usize, usize),
    /// Consumer has been lapped by the producer and the record is no longer valid.
    #[error("lapped by the producer, receiver position: {0}")]
    Lapped(u64),
    /// The buffer used to read the message is too small.
    #[error("provided buffer is of insufficient size, provided: {0}, required: {1}")]
    InsufficientBufferSize(usize, usize),
    /// Attempting to publish a message that exceeds the max message length.
    #[error("max message length exceeded, requested: {0}, max: {1}")]
    MaxMessageLengthExceeded(usize, usize),
    /// Message type id outside the application range.
    #[error("message type id must be greater than zero, got: {0}")]
    InvalidTypeId(i32),
    /// Propagated io error when working with file backed regions.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[cold]
    #[inline(never)]
    pub(crate) const fn capacity_not_power_of_two(capacity: usize) -> Error {
        Error::CapacityNotPowerOfTwo(capacity)
    }

    #[cold]
    #[inline(never)]
    pub(crate) const fn region_too_small(provided: usize, required: usize) -> Error {
        Error::RegionTooSmall(provided, required)
    }

    #[cold]
    #[inline(never)]
    pub(crate) const fn lapped(position: u64) -> Error {
        Error::Lapped(position)
    }

    #[cold]
    #[inline(never)]
    pub(crate) const fn insufficient_buffer_size(provided: usize, required: usize) -> Error {
        Error::InsufficientBufferSize(provided, required)
    }

    #[cold]
    #[inline(never)]
    pub(crate) const fn max_message_length_exceeded(requested: usize, max: usize) -> Error {
        Error::MaxMessageLengthExceeded(requested, max)
    }

    #[cold]
    #[inline(never)]
    pub(crate) const fn invalid_type_id(type_id: i32) -> Error {
        Error::InvalidTypeId(type_id)
    }
}
