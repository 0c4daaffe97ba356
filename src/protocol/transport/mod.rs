//! Transport layer: CAN frame representation, identifier handling, and
//! the bus/timer abstraction traits the runtime is generic over.

pub mod can_frame;
pub mod can_id;
pub mod traits;

/// Recommended timeout for sending a single CAN frame (ms).
///
/// Prevents indefinite blocking when the bus is faulty, disconnected, or
/// saturated.
///
/// On a bus @ 500 kbps with CAN arbitration:
/// - Maximum time for one frame (8 bytes): ~0.25 ms (no contention)
/// - With arbitration and retransmissions: ~10-20 ms
///
/// [`CanBus`](traits::can_bus::CanBus) implementations SHOULD enforce a
/// timeout on `send()` to avoid infinite waits.
pub const CAN_SEND_TIMEOUT_MS: u32 = 100;
