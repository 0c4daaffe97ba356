//! Defines the "data contract" between the code generator (the scribe) and
//! the protocol engines (the interpreters).
//!
//! The generator emits static [`FrameDescriptor`] tables and lookup rows that
//! implement this contract. The registry, the E2E validator and the
//! transmission scheduler consume those descriptors to drive their
//! frame-individual behavior without any per-frame code.

use crate::protocol::transport::can_id::FrameId;

/// Payload capacity of a classic CAN frame.
pub const FRAME_MAX_BYTES: usize = 8;

/// Size of the 11-bit standard identifier space, i.e. the number of slots in
/// a per-bus direct lookup table.
pub const STD_ID_SPACE: usize = 0x800;

/// Transmission timing pattern of an outbound frame, as attributed in the
/// network database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendMode {
    /// Pure periodic transmission with the frame's cycle time.
    Regular,
    /// Transmission only on an application trigger, debounced by the
    /// minimum distance.
    Event,
    /// Periodic fallback transmission plus opportunistic triggered sends;
    /// a triggered send restarts the cycle timer.
    Mixed,
}

/// Transmission direction of a frame relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Dense, zero-based frame processing slot, unique across the whole stack.
///
/// Only values up to [`HandlerIndex::MAX`] are representable; the all-ones
/// byte is reserved as the raw "not found" sentinel at the storage boundary
/// and never becomes a valid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandlerIndex(u8);

impl HandlerIndex {
    /// Largest representable handler index.
    pub const MAX: u8 = 254;

    /// Raw byte reserved to signal "no such frame" in packed tables.
    pub const NOT_FOUND_RAW: u8 = u8::MAX;

    /// Build a handler index. Returns `None` for the reserved sentinel byte.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= Self::MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// The raw index value.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The index as a `usize`, ready for table access.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Checksum algorithm applied by the E2E protection.
///
/// The concrete algorithm is a frame attribute of the network database and
/// therefore a parameter of the descriptor, not a property of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumAlgorithm {
    /// The checksum byte is chosen such that the 8-bit sum of the seed and
    /// all payload bytes (checksum byte included) equals `0xFF`.
    SumComplement,
    /// CRC-8 with the SAE J1850 polynomial `0x1D`, initialized with the
    /// per-frame seed and finalized with `XOR 0xFF`.
    Crc8SaeJ1850,
}

/// Placement and parameters of a frame's checksum field.
///
/// Checksums are supported only as an eight-bit field on a byte boundary;
/// this is a precondition checked at registry build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChecksumSpec {
    /// Byte position of the checksum within the packed payload.
    pub idx_byte: u8,
    /// Per-frame start value mixed into the computation so that two frames
    /// with identical payload bytes still carry different checksums.
    pub start_value: u8,
    /// The algorithm attributed to this frame.
    pub algorithm: ChecksumAlgorithm,
}

/// Placement and cycle of a frame's rolling sequence counter.
///
/// The counter occupies up to eight bits anywhere in the payload. It runs
/// cyclically from `from` to `to`; if `from > to` the counter decrements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SqcSpec {
    /// Absolute bit offset of the counter's least significant bit.
    pub start_bit: u8,
    /// Field width in bits, 1 to 8.
    pub bit_len: u8,
    /// First value of a counter cycle.
    pub from: u8,
    /// Last value of a counter cycle.
    pub to: u8,
}

/// End-to-end protection attributes of a frame. Either part may be absent;
/// a frame without any E2E attributes passes through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct E2eSpec {
    pub checksum: Option<ChecksumSpec>,
    pub sqc: Option<SqcSpec>,
}

impl E2eSpec {
    /// A frame without checksum or sequence counter.
    pub const NONE: Self = Self {
        checksum: None,
        sqc: None,
    };
}

/// Static description of one CAN frame, read-only after registry build.
///
/// One descriptor exists per frame; the handler index doubles as the
/// position of the descriptor in the registry's frame table.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameDescriptor {
    /// Zero-based index of the logical bus the frame lives on.
    pub idx_bus: u8,
    /// Wire identifier, standard or extended.
    pub id: FrameId,
    /// Transmission direction relative to this node.
    pub direction: Direction,
    /// Expected payload length in bytes (Data Length Code), 1 to 8.
    pub dlc: u8,
    /// Timing pattern; meaningful for outbound frames and for the timeout
    /// supervision hook of inbound ones.
    pub send_mode: SendMode,
    /// Nominal cycle time in milliseconds (Regular and Mixed modes).
    pub ti_cycle_ms: u32,
    /// Minimum time between two consecutive sends, in milliseconds.
    pub ti_min_distance_ms: u32,
    /// Dense processing slot of this frame.
    pub handler: HandlerIndex,
    /// End-to-end protection attributes.
    pub e2e: E2eSpec,
}
