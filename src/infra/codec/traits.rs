//! Public traits exposed at the codec seam. They decouple generated
//! per-frame signal structures from the integrity layer and provide a
//! uniform API for typed protect/validate helpers.
use crate::error::CodecError;

//==================================================================================FRAME_CODEC
/// Serialization contract implemented by every generated frame codec.
///
/// The integrity layer itself only needs byte access (checksum byte and
/// sequence counter field are addressed through the frame descriptor), so
/// this trait lives purely at the application boundary: it turns a typed
/// signal set into payload bytes before protection, and payload bytes back
/// into signals after validation.
pub trait FrameCodec {
    /// Decoded signal set of the frame.
    type Signals;

    /// Serialize the signal set into the provided buffer.
    ///
    /// Returns the number of bytes written (the frame DLC) on success.
    fn pack(signals: &Self::Signals, buffer: &mut [u8]) -> Result<usize, CodecError>;

    /// Deserialize a received payload into a signal set.
    fn unpack(payload: &[u8]) -> Result<Self::Signals, CodecError>;
}
