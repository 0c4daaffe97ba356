//! In-memory representation of a classic CAN frame.
use crate::protocol::transport::can_id::FrameId;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw frame as exchanged with the CAN bus driver.
pub struct CanFrame {
    /// Identifier together with its standard/extended kind.
    pub id: FrameId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Build a frame from an identifier and a payload slice. Bytes past
    /// `payload.len()` stay zeroed; payloads longer than eight bytes are
    /// truncated.
    pub fn new(id: FrameId, payload: &[u8]) -> Self {
        let len = payload.len().min(8);
        let mut data = [0u8; 8];
        data[..len].copy_from_slice(&payload[..len]);
        Self { id, data, len }
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}
