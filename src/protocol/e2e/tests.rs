//! Checksum, sequence counter, and combined validation behavior.
use super::*;
use crate::core::{Direction, E2eSpec, HandlerIndex, SendMode};
use crate::protocol::transport::can_id::FrameId;

fn desc_with(e2e: E2eSpec, dlc: u8) -> FrameDescriptor {
    FrameDescriptor {
        idx_bus: 0,
        id: FrameId::standard(0x100).unwrap(),
        direction: Direction::Inbound,
        dlc,
        send_mode: SendMode::Regular,
        ti_cycle_ms: 10,
        ti_min_distance_ms: 10,
        handler: HandlerIndex::new(0).unwrap(),
        e2e,
    }
}

fn sum_spec(idx_byte: u8, start_value: u8) -> ChecksumSpec {
    ChecksumSpec {
        idx_byte,
        start_value,
        algorithm: ChecksumAlgorithm::SumComplement,
    }
}

#[test]
/// The sum complement makes seed plus all bytes come out at 0xFF.
fn test_sum_complement_compute() {
    let spec = sum_spec(0, 0x17);
    let mut payload = [0u8, 0x12, 0x34, 0x56];
    payload[0] = compute_checksum(&spec, &payload);

    let mut sum = spec.start_value;
    for byte in &payload {
        sum = sum.wrapping_add(*byte);
    }
    assert_eq!(sum, 0xFF);
    assert!(checksum_is_valid(&spec, &payload));
}

#[test]
/// Different seeds yield different checksums for identical contents.
fn test_seed_separates_frames() {
    let payload = [0u8, 0x12, 0x34, 0x56];
    let a = compute_checksum(&sum_spec(0, 0x17), &payload);
    let b = compute_checksum(&sum_spec(0, 0x18), &payload);
    assert_ne!(a, b);
}

#[test]
/// A corrupted byte is caught by the sum complement.
fn test_sum_complement_detects_corruption() {
    let spec = sum_spec(2, 0x42);
    let mut payload = [0x11u8, 0x22, 0, 0x44];
    payload[2] = compute_checksum(&spec, &payload);
    assert!(checksum_is_valid(&spec, &payload));

    payload[3] ^= 0x01;
    assert!(!checksum_is_valid(&spec, &payload));
}

#[test]
/// The J1850 CRC validates its own output and detects corruption.
fn test_crc8_roundtrip() {
    let spec = ChecksumSpec {
        idx_byte: 7,
        start_value: 0xFF,
        algorithm: ChecksumAlgorithm::Crc8SaeJ1850,
    };
    let mut payload = [0x10u8, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0];
    payload[7] = compute_checksum(&spec, &payload);
    assert!(checksum_is_valid(&spec, &payload));

    payload[0] ^= 0x80;
    assert!(!checksum_is_valid(&spec, &payload));
}

#[test]
/// Counter cycles: ascending wraps up, descending wraps down, degenerate
/// stays pinned.
fn test_sqc_cycles() {
    let up = SqcSpec {
        start_bit: 0,
        bit_len: 4,
        from: 1,
        to: 14,
    };
    assert_eq!(next_sqc(&up, 1), 2);
    assert_eq!(next_sqc(&up, 14), 1);

    let down = SqcSpec {
        start_bit: 0,
        bit_len: 4,
        from: 14,
        to: 1,
    };
    assert_eq!(next_sqc(&down, 14), 13);
    assert_eq!(next_sqc(&down, 1), 14);

    let pinned = SqcSpec {
        start_bit: 0,
        bit_len: 4,
        from: 7,
        to: 7,
    };
    assert_eq!(next_sqc(&pinned, 7), 7);
}

#[test]
/// A stored value beyond the cycle end only admits the cycle start as
/// its successor.
fn test_sqc_out_of_range_value() {
    let up = SqcSpec {
        start_bit: 0,
        bit_len: 4,
        from: 1,
        to: 14,
    };
    assert_eq!(next_sqc(&up, 15), 1);

    let down = SqcSpec {
        start_bit: 0,
        bit_len: 4,
        from: 14,
        to: 1,
    };
    assert_eq!(next_sqc(&down, 0), 14);
}

#[test]
/// An intact frame carrying a counter outside the cycle resynchronizes
/// on the cycle start, not on the foreign value's numeric successor.
fn test_out_of_range_counter_resyncs_at_cycle_start() {
    let e2e = E2eSpec {
        checksum: None,
        sqc: Some(SqcSpec {
            start_bit: 0,
            bit_len: 4,
            from: 1,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 2);
    let mut rx = E2eState::new(&desc);

    // Counter 15 never occurs on the 1..=14 cycle; the startup frame
    // passes unchecked but stores it.
    assert!(validate_bytes(&desc, &mut rx, &[0x0F, 0]).is_ok());
    // Only the cycle start follows a foreign value.
    assert!(validate_bytes(&desc, &mut rx, &[0x01, 0]).is_ok());
    // From there the regular succession applies again.
    assert_eq!(
        validate_bytes(&desc, &mut rx, &[0x05, 0]),
        TransmissionStatus::SEQUENCE_ERROR
    );
}

#[test]
/// Protection writes the counter and a checksum covering it.
fn test_protect_in_place() {
    let e2e = E2eSpec {
        checksum: Some(sum_spec(0, 0x10)),
        sqc: Some(SqcSpec {
            start_bit: 8,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 4);
    let mut state = E2eState::new(&desc);

    let mut payload = [0u8, 0, 0xAB, 0xCD];
    protect_in_place(&desc, &mut state, &mut payload).unwrap();
    // First send carries the cycle's starting value.
    assert_eq!(payload[1] & 0x0F, 0);
    assert!(checksum_is_valid(&sum_spec(0, 0x10), &payload));

    let mut payload2 = [0u8, 0, 0xAB, 0xCD];
    protect_in_place(&desc, &mut state, &mut payload2).unwrap();
    assert_eq!(payload2[1] & 0x0F, 1);
}

#[test]
/// A protected frame validates cleanly on the receiving side, including
/// across the counter wrap.
fn test_protect_validate_sequence() {
    let e2e = E2eSpec {
        checksum: Some(sum_spec(0, 0x33)),
        sqc: Some(SqcSpec {
            start_bit: 8,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 4);
    let mut tx = E2eState::new(&desc);
    let mut rx = E2eState::new(&desc);

    for _ in 0..32 {
        let mut payload = [0u8, 0, 0x55, 0x66];
        protect_in_place(&desc, &mut tx, &mut payload).unwrap();
        assert_eq!(validate_bytes(&desc, &mut rx, &payload), TransmissionStatus::OKAY);
    }
}

#[test]
/// Wrong payload length reports only the DLC error; the first failure also
/// carries the never-received marker.
fn test_dlc_error_short_circuits() {
    let e2e = E2eSpec {
        checksum: Some(sum_spec(0, 0)),
        sqc: Some(SqcSpec {
            start_bit: 8,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 4);
    let mut state = E2eState::new(&desc);

    let status = validate_bytes(&desc, &mut state, &[0u8; 3]);
    assert_eq!(
        status,
        TransmissionStatus::DLC_ERROR | TransmissionStatus::NEVER_RECEIVED
    );
    assert!(!status.contains(TransmissionStatus::CHECKSUM_ERROR));
    assert!(!status.contains(TransmissionStatus::SEQUENCE_ERROR));

    // One byte too many is just as undecodable as one too few.
    let status = validate_bytes(&desc, &mut state, &[0u8; 5]);
    assert_eq!(
        status,
        TransmissionStatus::DLC_ERROR | TransmissionStatus::NEVER_RECEIVED
    );
}

#[test]
/// A checksum failure suppresses the sequence check and forces a
/// resynchronization on the next intact frame.
fn test_checksum_error_suppresses_sqc() {
    let e2e = E2eSpec {
        checksum: Some(sum_spec(0, 0x20)),
        sqc: Some(SqcSpec {
            start_bit: 8,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 4);
    let mut tx = E2eState::new(&desc);
    let mut rx = E2eState::new(&desc);

    let mut good = [0u8, 0, 1, 2];
    protect_in_place(&desc, &mut tx, &mut good).unwrap();
    assert!(validate_bytes(&desc, &mut rx, &good).is_ok());

    // Corrupt the next frame; the wrong counter inside must not surface.
    let mut bad = [0u8, 0, 1, 2];
    protect_in_place(&desc, &mut tx, &mut bad).unwrap();
    bad[2] ^= 0xFF;
    let status = validate_bytes(&desc, &mut rx, &bad);
    assert_eq!(status, TransmissionStatus::CHECKSUM_ERROR);

    // The following intact frame resynchronizes without a sequence error.
    let mut next = [0u8, 0, 1, 2];
    protect_in_place(&desc, &mut tx, &mut next).unwrap();
    assert!(validate_bytes(&desc, &mut rx, &next).is_ok());
}

#[test]
/// One lost frame costs exactly one sequence error, not a cascade.
fn test_lost_frame_single_error() {
    let e2e = E2eSpec {
        checksum: None,
        sqc: Some(SqcSpec {
            start_bit: 0,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 2);
    let mut tx = E2eState::new(&desc);
    let mut rx = E2eState::new(&desc);

    let mut payload = [0u8; 2];
    protect_in_place(&desc, &mut tx, &mut payload).unwrap();
    assert!(validate_bytes(&desc, &mut rx, &payload).is_ok());

    // Drop one frame on the floor.
    let mut lost = [0u8; 2];
    protect_in_place(&desc, &mut tx, &mut lost).unwrap();

    let mut after = [0u8; 2];
    protect_in_place(&desc, &mut tx, &mut after).unwrap();
    assert_eq!(
        validate_bytes(&desc, &mut rx, &after),
        TransmissionStatus::SEQUENCE_ERROR
    );

    // Back in step immediately afterwards.
    let mut resumed = [0u8; 2];
    protect_in_place(&desc, &mut tx, &mut resumed).unwrap();
    assert!(validate_bytes(&desc, &mut rx, &resumed).is_ok());
}

#[test]
/// Frames without E2E attributes validate on length alone.
fn test_plain_frame() {
    let desc = desc_with(E2eSpec::NONE, 5);
    let mut state = E2eState::new(&desc);
    assert!(validate_bytes(&desc, &mut state, &[0u8; 5]).is_ok());
    assert!(validate_bytes(&desc, &mut state, &[0u8; 4])
        .contains(TransmissionStatus::DLC_ERROR));
    assert!(validate_bytes(&desc, &mut state, &[0u8; 6])
        .contains(TransmissionStatus::DLC_ERROR));
}

#[test]
/// Status cells flip bits atomically without touching their neighbours.
fn test_shared_status_bits() {
    let cell = SharedStatus::new();
    assert!(cell.load().contains(TransmissionStatus::NEVER_RECEIVED));

    cell.set(TransmissionStatus::TIMEOUT);
    assert!(cell.load().contains(TransmissionStatus::TIMEOUT));
    assert!(cell.load().contains(TransmissionStatus::NEVER_RECEIVED));

    cell.clear(TransmissionStatus::NEVER_RECEIVED);
    assert!(!cell.load().contains(TransmissionStatus::NEVER_RECEIVED));
    assert!(cell.load().contains(TransmissionStatus::TIMEOUT));

    cell.store(TransmissionStatus::OKAY);
    assert!(cell.load().is_ok());
}

//==================================================================================TYPED_BOUNDARY

/// Two-signal codec used to exercise the typed helpers.
struct SpeedCodec;

#[derive(Debug, PartialEq)]
struct Speed {
    kmh: u16,
    valid: bool,
}

impl FrameCodec for SpeedCodec {
    type Signals = Speed;

    fn pack(signals: &Speed, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < 4 {
            return Err(CodecError::BufferTooSmall);
        }
        let mut writer = BitWriter::new_at(buffer, 16)
            .map_err(CodecError::BitWrite)?;
        writer.write_u16(signals.kmh, 12)?;
        writer.write_u8(signals.valid as u8, 1)?;
        Ok(4)
    }

    fn unpack(payload: &[u8]) -> Result<Speed, CodecError> {
        let mut reader = BitReader::new_at(payload, 16)
            .map_err(CodecError::BitRead)?;
        let kmh = reader.read_u16(12)?;
        let valid = reader.read_u8(1)? != 0;
        Ok(Speed { kmh, valid })
    }
}

#[test]
/// Typed protect then validate round-trips signals and reports okay.
fn test_typed_roundtrip() {
    let e2e = E2eSpec {
        checksum: Some(sum_spec(0, 0x70)),
        sqc: Some(SqcSpec {
            start_bit: 8,
            bit_len: 4,
            from: 0,
            to: 14,
        }),
    };
    let desc = desc_with(e2e, 4);
    let mut tx = E2eState::new(&desc);
    let mut rx = E2eState::new(&desc);

    let signals = Speed {
        kmh: 1234,
        valid: true,
    };
    let mut buffer = [0u8; 8];
    let len = protect::<SpeedCodec>(&desc, &mut tx, &signals, &mut buffer).unwrap();
    assert_eq!(len, 4);

    let validated = validate::<SpeedCodec>(&desc, &mut rx, &buffer[..len]).unwrap();
    assert!(validated.status.is_ok());
    assert_eq!(validated.signals, Some(signals));
}

#[test]
/// A wrong payload length yields a status but no signals.
fn test_typed_dlc_error_no_signals() {
    let desc = desc_with(E2eSpec::NONE, 4);
    let mut rx = E2eState::new(&desc);
    let validated = validate::<SpeedCodec>(&desc, &mut rx, &[0u8; 2]).unwrap();
    assert!(validated.status.contains(TransmissionStatus::DLC_ERROR));
    assert!(validated.signals.is_none());
}
