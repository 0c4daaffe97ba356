//! End-to-end payload integrity: checksum protection and rolling sequence
//! counter validation, driven entirely by per-frame descriptor attributes.
//!
//! Outbound frames get their counter advanced and their checksum computed
//! in place after packing. Inbound frames are checked in a fixed order:
//! payload length first, then checksum, then sequence. A length or checksum
//! failure makes the payload undecodable, so the sequence check is skipped
//! and the validator resynchronizes on the next intact frame.
use core::sync::atomic::{AtomicU8, Ordering};

use crate::core::{ChecksumAlgorithm, ChecksumSpec, FrameDescriptor, SqcSpec};
use crate::error::{BitWriterError, CodecError};
use crate::infra::codec::bits::{BitReader, BitWriter};
use crate::infra::codec::traits::FrameCodec;

//==================================================================================TRANSMISSION_STATUS

/// Bit set reporting the transmission state of one frame.
///
/// Bit 0 is shared between directions: it reads as "never received" for
/// inbound frames and "send buffer full" for outbound ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmissionStatus(u8);

impl TransmissionStatus {
    /// No error recorded.
    pub const OKAY: Self = Self(0);
    /// Inbound: no intact frame decoded yet since startup.
    pub const NEVER_RECEIVED: Self = Self(0x01);
    /// Outbound: the bus driver refused the frame, send queue saturated.
    pub const SEND_BUFFER_FULL: Self = Self(0x01);
    /// Inbound: the frame did not arrive within its expected cycle.
    pub const TIMEOUT: Self = Self(0x02);
    /// Checksum validation failed, payload contents are untrustworthy.
    pub const CHECKSUM_ERROR: Self = Self(0x04);
    /// Sequence counter not the successor of the previous one.
    pub const SEQUENCE_ERROR: Self = Self(0x08);
    /// Payload length differs from the frame's DLC.
    pub const DLC_ERROR: Self = Self(0x10);

    /// Wrap a raw status byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw status byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// `true` when no error bit is set.
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// `true` when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two status sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set the given bits.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the given bits.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl core::ops::BitOr for TransmissionStatus {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for TransmissionStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Lock-free status cell shared between the dispatch task and application
/// tasks. A plain byte store keeps reads wait-free on any target.
#[derive(Debug)]
pub struct SharedStatus(AtomicU8);

impl SharedStatus {
    /// Cell for an inbound frame. Starts with the never-received marker,
    /// cleared by the first intact reception.
    pub const fn new() -> Self {
        Self(AtomicU8::new(TransmissionStatus::NEVER_RECEIVED.raw()))
    }

    /// Cell for an outbound frame. Starts clean.
    pub const fn new_ok() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Current status snapshot.
    pub fn load(&self) -> TransmissionStatus {
        TransmissionStatus::from_raw(self.0.load(Ordering::Relaxed))
    }

    /// Replace the whole status byte.
    pub fn store(&self, status: TransmissionStatus) {
        self.0.store(status.raw(), Ordering::Relaxed);
    }

    /// Set the given bits, leaving the others untouched.
    pub fn set(&self, bits: TransmissionStatus) {
        self.0.fetch_or(bits.raw(), Ordering::Relaxed);
    }

    /// Clear the given bits, leaving the others untouched.
    pub fn clear(&self, bits: TransmissionStatus) {
        self.0.fetch_and(!bits.raw(), Ordering::Relaxed);
    }
}

//==================================================================================CHECKSUM

/// Compute the checksum of a payload, skipping the checksum byte itself.
///
/// For the sum complement, the result is the byte that makes the 8-bit sum
/// of seed and all payload bytes equal `0xFF`. For the J1850 CRC, the seed
/// initializes the CRC register and the result is finalized with `XOR 0xFF`.
pub fn compute_checksum(spec: &ChecksumSpec, payload: &[u8]) -> u8 {
    match spec.algorithm {
        ChecksumAlgorithm::SumComplement => {
            let mut sum = spec.start_value;
            for (i, byte) in payload.iter().enumerate() {
                if i != spec.idx_byte as usize {
                    sum = sum.wrapping_add(*byte);
                }
            }
            0xFF_u8.wrapping_sub(sum)
        }
        ChecksumAlgorithm::Crc8SaeJ1850 => {
            let mut crc = spec.start_value;
            for (i, byte) in payload.iter().enumerate() {
                if i == spec.idx_byte as usize {
                    continue;
                }
                crc ^= *byte;
                for _ in 0..8 {
                    crc = if crc & 0x80 != 0 {
                        (crc << 1) ^ 0x1D
                    } else {
                        crc << 1
                    };
                }
            }
            crc ^ 0xFF
        }
    }
}

/// Check the checksum carried by a received payload.
pub fn checksum_is_valid(spec: &ChecksumSpec, payload: &[u8]) -> bool {
    match spec.algorithm {
        ChecksumAlgorithm::SumComplement => {
            // The stored byte participates: seed plus the sum of all bytes
            // must come out at 0xFF.
            let mut sum = spec.start_value;
            for byte in payload {
                sum = sum.wrapping_add(*byte);
            }
            sum == 0xFF
        }
        ChecksumAlgorithm::Crc8SaeJ1850 => {
            payload[spec.idx_byte as usize] == compute_checksum(spec, payload)
        }
    }
}

//==================================================================================SEQUENCE_COUNTER

/// Successor of a sequence counter value in its cycle.
///
/// Ascending cycles (`from < to`) increment, descending cycles (`from > to`)
/// decrement, a degenerate cycle (`from == to`) pins the counter. A value
/// beyond the cycle end counts as the end itself, so the only accepted
/// successor of a foreign value is the cycle start.
pub const fn next_sqc(spec: &SqcSpec, current: u8) -> u8 {
    if spec.from <= spec.to {
        if current >= spec.to {
            spec.from
        } else {
            current + 1
        }
    } else if current <= spec.to {
        spec.from
    } else {
        current - 1
    }
}

//==================================================================================E2E_STATE

/// Per-frame mutable validation and protection state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct E2eState {
    /// Last sequence counter value seen on this frame.
    last_sqc: u8,
    /// When set, the next sequence check is skipped and the counter is
    /// resynchronized. Set at startup and after any undecodable frame.
    reinit: bool,
    /// An intact payload has been decoded at least once since startup.
    ever_received: bool,
    /// Counter value written into the last transmitted payload.
    tx_sqc: u8,
}

impl E2eState {
    /// Fresh state for one frame. Validation starts in resynchronization
    /// mode; the transmit counter is placed so the first send carries the
    /// cycle's `from` value.
    pub const fn new(desc: &FrameDescriptor) -> Self {
        let tx_sqc = match &desc.e2e.sqc {
            Some(sqc) => sqc.to,
            None => 0,
        };
        Self {
            last_sqc: 0,
            reinit: true,
            ever_received: false,
            tx_sqc,
        }
    }
}

//==================================================================================PROTECT

/// Apply E2E protection to a packed payload in place: advance and write
/// the sequence counter, then compute and place the checksum over the
/// final bytes. Frames without E2E attributes pass through unchanged.
pub fn protect_in_place(
    desc: &FrameDescriptor,
    state: &mut E2eState,
    payload: &mut [u8],
) -> Result<(), BitWriterError> {
    if let Some(sqc) = &desc.e2e.sqc {
        state.tx_sqc = next_sqc(sqc, state.tx_sqc);
        let mut writer = BitWriter::new_at(payload, sqc.start_bit as usize)?;
        writer.write_u8(state.tx_sqc, sqc.bit_len)?;
    }

    // The checksum covers the payload with the counter already in place.
    if let Some(cks) = &desc.e2e.checksum {
        let idx = cks.idx_byte as usize;
        if idx >= payload.len() {
            return Err(BitWriterError::OutOfBounds {
                asked: (idx + 1) * 8,
                available: payload.len() * 8,
            });
        }
        payload[idx] = compute_checksum(cks, payload);
    }

    Ok(())
}

//==================================================================================VALIDATE

/// Validate a received payload against the frame's E2E attributes and
/// update the per-frame state.
///
/// The checks run in a fixed order. A wrong payload length reports only
/// [`TransmissionStatus::DLC_ERROR`]: nothing else about the bytes can be
/// trusted. A checksum failure suppresses the sequence check for the same
/// reason. The sequence counter is stored on every intact frame, wrong or
/// not, so a single lost frame costs one error instead of a cascade.
pub fn validate_bytes(
    desc: &FrameDescriptor,
    state: &mut E2eState,
    payload: &[u8],
) -> TransmissionStatus {
    let mut status = TransmissionStatus::OKAY;

    if payload.len() != desc.dlc as usize {
        state.reinit = true;
        status.insert(TransmissionStatus::DLC_ERROR);
        if !state.ever_received {
            status.insert(TransmissionStatus::NEVER_RECEIVED);
        }
        return status;
    }

    if let Some(cks) = &desc.e2e.checksum {
        if !checksum_is_valid(cks, payload) {
            state.reinit = true;
            status.insert(TransmissionStatus::CHECKSUM_ERROR);
            if !state.ever_received {
                status.insert(TransmissionStatus::NEVER_RECEIVED);
            }
            return status;
        }
    }

    // Payload is intact from here on.
    if let Some(sqc) = &desc.e2e.sqc {
        if let Some(received) = read_sqc(sqc, payload) {
            if !state.reinit && received != next_sqc(sqc, state.last_sqc) {
                status.insert(TransmissionStatus::SEQUENCE_ERROR);
            }
            state.last_sqc = received;
        }
    }

    state.ever_received = true;
    state.reinit = false;
    status
}

/// Extract the sequence counter field. Field placement was checked at
/// registry build, so a read failure only occurs on foreign descriptors
/// and is treated as an absent counter.
fn read_sqc(spec: &SqcSpec, payload: &[u8]) -> Option<u8> {
    let mut reader = BitReader::new_at(payload, spec.start_bit as usize).ok()?;
    reader.read_u8(spec.bit_len).ok()
}

//==================================================================================TYPED_BOUNDARY

/// Outcome of the typed validation path.
#[derive(Debug)]
pub struct Validated<S> {
    /// Decoded signal set; absent when the payload length was wrong and
    /// decoding was impossible. A checksum or sequence error still yields
    /// the decoded signals so the application can apply its own fallback.
    pub signals: Option<S>,
    /// Transmission status of this reception.
    pub status: TransmissionStatus,
}

/// Pack a signal set and protect the resulting payload.
///
/// Returns the number of payload bytes ready to transmit.
pub fn protect<C: FrameCodec>(
    desc: &FrameDescriptor,
    state: &mut E2eState,
    signals: &C::Signals,
    buffer: &mut [u8],
) -> Result<usize, CodecError> {
    let len = C::pack(signals, buffer)?;
    protect_in_place(desc, state, &mut buffer[..len])?;
    Ok(len)
}

/// Validate a received payload, then decode it when its length allows.
pub fn validate<C: FrameCodec>(
    desc: &FrameDescriptor,
    state: &mut E2eState,
    payload: &[u8],
) -> Result<Validated<C::Signals>, CodecError> {
    let status = validate_bytes(desc, state, payload);
    if status.contains(TransmissionStatus::DLC_ERROR) {
        return Ok(Validated {
            signals: None,
            status,
        });
    }
    let signals = C::unpack(payload)?;
    Ok(Validated {
        signals: Some(signals),
        status,
    })
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
