//! Creation and comparison of CAN identifiers. Both 11-bit standard and
//! 29-bit extended identifiers are supported, folded into a single
//! ordering key so mixed tables stay binary-searchable.

// A standard and an extended identifier with the same numeric value are
// distinct frames on the wire. The fold keeps them distinct in one u32:
// the value is shifted left by one and the extended flag occupies bit 0.

/// Highest valid 11-bit standard identifier.
pub const STD_ID_MAX: u16 = 0x7FF;
/// Highest valid 29-bit extended identifier.
pub const EXT_ID_MAX: u32 = 0x1FFF_FFFF;

//==================================================================================FRAME_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates a CAN identifier together with its standard/extended kind.
///
/// Internally stored in folded form, `(value << 1) | is_extended`, which
/// doubles as the ordering key of the lookup tables.
pub struct FrameId(u32);

impl FrameId {
    /// Creates a standard (11-bit) identifier. Returns `None` when the
    /// value does not fit in 11 bits.
    pub const fn standard(value: u16) -> Option<Self> {
        if value > STD_ID_MAX {
            return None;
        }
        Some(Self((value as u32) << 1))
    }

    /// Creates an extended (29-bit) identifier. Returns `None` when the
    /// value does not fit in 29 bits.
    pub const fn extended(value: u32) -> Option<Self> {
        if value > EXT_ID_MAX {
            return None;
        }
        Some(Self((value << 1) | 1))
    }

    /// Creates an identifier from a raw value and a kind flag, without
    /// range distinction between the two constructors.
    pub const fn from_parts(value: u32, is_extended: bool) -> Option<Self> {
        if is_extended {
            Self::extended(value)
        } else if value <= STD_ID_MAX as u32 {
            Self::standard(value as u16)
        } else {
            None
        }
    }

    /// Numeric identifier value as seen on the wire.
    pub const fn value(&self) -> u32 {
        self.0 >> 1
    }

    /// `true` for 29-bit extended identifiers.
    pub const fn is_extended(&self) -> bool {
        self.0 & 1 == 1
    }

    /// Folded ordering key. Strictly monotonic in `(value, is_extended)`,
    /// which makes sorted mixed-kind tables binary-searchable.
    pub const fn ordered_key(&self) -> u32 {
        self.0
    }
}

//==================================================================================EMBEDDED_CAN_INTEROP
impl From<embedded_can::Id> for FrameId {
    fn from(id: embedded_can::Id) -> Self {
        match id {
            embedded_can::Id::Standard(std) => Self((std.as_raw() as u32) << 1),
            embedded_can::Id::Extended(ext) => Self((ext.as_raw() << 1) | 1),
        }
    }
}

impl From<FrameId> for embedded_can::Id {
    fn from(id: FrameId) -> Self {
        if id.is_extended() {
            match embedded_can::ExtendedId::new(id.value()) {
                Some(ext) => embedded_can::Id::Extended(ext),
                None => embedded_can::Id::Extended(embedded_can::ExtendedId::ZERO),
            }
        } else {
            match embedded_can::StandardId::new(id.value() as u16) {
                Some(std) => embedded_can::Id::Standard(std),
                None => embedded_can::Id::Standard(embedded_can::StandardId::ZERO),
            }
        }
    }
}
