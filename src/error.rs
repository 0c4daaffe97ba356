//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (registry validation,
//! bit-level payload access, codec work, frame sending).
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
/// Fatal configuration errors detected while validating the generated
/// registry tables. A stack must not start with an invalid registry.
pub enum RegistryError {
    /// Two frames on one bus share the same (identifier, extended) pair.
    #[error("Duplicate CAN ID on bus {idx_bus}: key {key:#x}")]
    DuplicateKey { idx_bus: u8, key: u32 },
    /// A lookup row is not strictly ascending by ordered key.
    #[error("Unsorted lookup row on bus {idx_bus} near key {key:#x}")]
    UnsortedRow { idx_bus: u8, key: u32 },
    /// More frames than the 8-bit handler index can address.
    #[error("Frame count {count} exceeds the handler index width")]
    HandlerIndexOverflow { count: usize },
    /// A lookup entry points outside the frame table.
    #[error("Handler {handler} out of range on bus {idx_bus}")]
    HandlerOutOfRange { idx_bus: u8, handler: u8 },
    /// The descriptor at position n does not carry handler index n.
    #[error("Handler indices not dense: expected {expected}, found {found}")]
    NonDenseHandler { expected: u8, found: u8 },
    /// A descriptor names a bus the registry does not know.
    #[error("Bus index {idx_bus} of handler {handler} out of range")]
    BusOutOfRange { handler: u8, idx_bus: u8 },
    /// Direct table and sorted row disagree for a standard identifier.
    #[error("Direct/sorted table mismatch on bus {idx_bus} for standard ID {id:#x}")]
    DirectTableMismatch { idx_bus: u8, id: u16 },
    /// A lookup key does not match the identifier of the frame it names.
    #[error("Lookup key on bus {idx_bus} does not match descriptor of handler {handler}")]
    KeyMismatch { idx_bus: u8, handler: u8 },
    /// A sorted row holds an entry for a frame registered on another bus.
    #[error("Frame of handler {handler} listed on wrong bus {idx_bus}")]
    WrongBus { idx_bus: u8, handler: u8 },
    /// Payload length outside 1..=8.
    #[error("Invalid DLC {dlc} for handler {handler}")]
    InvalidDlc { handler: u8, dlc: u8 },
    /// Checksum or sequence counter field placed outside the payload.
    #[error("E2E field out of payload bounds for handler {handler}")]
    E2eFieldOutOfRange { handler: u8 },
    /// The scheduler state capacity does not match the frame table.
    #[error("State capacity {capacity} does not match frame count {count}")]
    CapacityMismatch { capacity: usize, count: usize },
}

//==================================================================================CODEC_ERROR

#[derive(Error, Debug, PartialEq, Eq)]
/// Failures of generated pack/unpack code at the codec seam.
pub enum CodecError {
    /// Provided buffer is too small for the packed payload.
    #[error("Buffer too small")]
    BufferTooSmall,
    /// Bytes cannot be interpreted as the frame's signal set.
    #[error("Malformed payload")]
    MalformedPayload,
    /// Bit-level access failed while packing or unpacking.
    #[error("BitRead error: {0}")]
    BitRead(#[from] BitReaderError),
    /// Bit-level access failed while packing.
    #[error("BitWrite error: {0}")]
    BitWrite(#[from] BitWriterError),
}

//==================================================================================SEND_ERROR
#[derive(Debug, Error)]
/// Errors encountered when protecting and submitting an outbound frame.
pub enum SendFrameError<E: core::fmt::Debug> {
    /// Payload packing failed.
    #[error("Payload packing failed: {0}")]
    Pack(CodecError),
    /// E2E protection could not be applied to the packed bytes.
    #[error("E2E protection failed: {0}")]
    Protect(BitWriterError),
    /// CAN layer refused or failed to send the frame.
    #[error("CAN bus send error: {0:?}")]
    Send(E),
}

//==================================================================================BITREADER_ERRORS
#[derive(Debug, Error, PartialEq, Eq)]
/// Errors raised during bitwise payload reads.
pub enum BitReaderError {
    /// Attempted to read past the end of the payload.
    #[error("Attempted to read out of bounds -> asked: {asked}, available: {available}")]
    OutOfBounds { asked: usize, available: usize },
    /// Requested more bits than the target type can hold.
    #[error("Cannot read more than {max} bits. Requested: {asked}")]
    TooLongForType { max: u8, asked: u8 },
}

//==================================================================================BITWRITER_ERRORS
#[derive(Debug, Error, PartialEq, Eq)]
/// Errors raised during bitwise writes into a payload.
pub enum BitWriterError {
    /// Attempted to write beyond the provided capacity.
    #[error("Attempted to write out of bounds -> asked: {asked}, available: {available}")]
    OutOfBounds { asked: usize, available: usize },
    /// Field is too large for the provided type.
    #[error("Cannot write more than {max} bits. Requested: {asked}")]
    TooLongForType { max: u8, asked: u8 },
}
