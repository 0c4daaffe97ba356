//! Identifier lookup tables mapping a received CAN ID to the index of its
//! frame handler. The tables are produced by the code generator from the
//! network database; this module only validates and queries them.
//!
//! Two representations coexist per bus:
//! - a row of `(ordered key, handler)` pairs sorted by key, resolved by
//!   binary search in O(log n)
//! - an optional direct table of 2048 slots for 11-bit identifiers,
//!   resolved in O(1) at the cost of 2 KiB of flash per bus
use crate::core::{Direction, FrameDescriptor, HandlerIndex, STD_ID_SPACE};
use crate::error::RegistryError;
use crate::protocol::transport::can_id::FrameId;

//==================================================================================LOOKUP_TABLES

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One generated lookup pair: folded identifier key to handler index.
pub struct KeyToHandler {
    /// Folded identifier, see [`FrameId::ordered_key`].
    pub key: u32,
    /// Position of the frame in the global descriptor table.
    pub idx: u8,
}

#[derive(Clone, Copy)]
/// Generated lookup material for a single physical bus.
pub struct BusTable<'a> {
    /// Pairs sorted by strictly ascending key.
    pub rows: &'a [KeyToHandler],
    /// Optional direct table for standard identifiers. A slot holds the
    /// handler index plus one; zero marks an unmapped identifier.
    pub direct: Option<&'a [u8; STD_ID_SPACE]>,
}

//==================================================================================REGISTRY

/// Validated view over the generated frame tables of a whole network node.
///
/// Construction runs every consistency check once, so lookups can stay
/// branch-light on the hot path.
pub struct Registry<'a> {
    buses: &'a [BusTable<'a>],
    frames: &'a [FrameDescriptor],
}

impl<'a> Registry<'a> {
    /// Validates the generated tables and builds the registry.
    ///
    /// Checks, in order: the descriptor table is dense and addressable by
    /// an 8-bit handler index, every descriptor is internally coherent
    /// (bus, DLC, integrity field placement), every sorted row is strictly
    /// ascending and points at a frame of its own bus, and each direct
    /// table agrees with its sorted row in both directions.
    pub fn new(
        buses: &'a [BusTable<'a>],
        frames: &'a [FrameDescriptor],
    ) -> Result<Self, RegistryError> {
        if frames.len() > HandlerIndex::MAX as usize + 1 {
            return Err(RegistryError::HandlerIndexOverflow {
                count: frames.len(),
            });
        }

        for (i, desc) in frames.iter().enumerate() {
            let handler = desc.handler.get();
            if handler as usize != i {
                return Err(RegistryError::NonDenseHandler {
                    expected: i as u8,
                    found: handler,
                });
            }
            if desc.idx_bus as usize >= buses.len() {
                return Err(RegistryError::BusOutOfRange {
                    handler,
                    idx_bus: desc.idx_bus,
                });
            }
            if desc.dlc == 0 || desc.dlc > 8 {
                return Err(RegistryError::InvalidDlc {
                    handler,
                    dlc: desc.dlc,
                });
            }
            if let Some(cks) = &desc.e2e.checksum {
                if cks.idx_byte >= desc.dlc {
                    return Err(RegistryError::E2eFieldOutOfRange { handler });
                }
            }
            if let Some(sqc) = &desc.e2e.sqc {
                let end_bit = sqc.start_bit as usize + sqc.bit_len as usize;
                if sqc.bit_len == 0 || sqc.bit_len > 8 || end_bit > desc.dlc as usize * 8 {
                    return Err(RegistryError::E2eFieldOutOfRange { handler });
                }
            }
        }

        for (idx_bus, bus) in buses.iter().enumerate() {
            let idx_bus = idx_bus as u8;
            let mut previous: Option<u32> = None;

            for row in bus.rows {
                if let Some(prev) = previous {
                    if row.key == prev {
                        return Err(RegistryError::DuplicateKey {
                            idx_bus,
                            key: row.key,
                        });
                    }
                    if row.key < prev {
                        return Err(RegistryError::UnsortedRow {
                            idx_bus,
                            key: row.key,
                        });
                    }
                }
                previous = Some(row.key);

                let desc = frames.get(row.idx as usize).ok_or(
                    RegistryError::HandlerOutOfRange {
                        idx_bus,
                        handler: row.idx,
                    },
                )?;
                if desc.idx_bus != idx_bus {
                    return Err(RegistryError::WrongBus {
                        idx_bus,
                        handler: row.idx,
                    });
                }
                if desc.id.ordered_key() != row.key {
                    return Err(RegistryError::KeyMismatch {
                        idx_bus,
                        handler: row.idx,
                    });
                }
            }

            if let Some(direct) = bus.direct {
                Self::check_direct_table(idx_bus, bus.rows, direct, frames.len())?;
            }
        }

        Ok(Self { buses, frames })
    }

    /// Cross-checks a direct table against the sorted row of the same bus.
    /// Every populated slot must have a matching sorted entry and every
    /// standard-ID sorted entry must have a populated slot.
    fn check_direct_table(
        idx_bus: u8,
        rows: &[KeyToHandler],
        direct: &[u8; STD_ID_SPACE],
        frame_count: usize,
    ) -> Result<(), RegistryError> {
        for (value, slot) in direct.iter().enumerate() {
            if *slot == 0 {
                continue;
            }
            let handler = slot - 1;
            if handler as usize >= frame_count {
                return Err(RegistryError::HandlerOutOfRange { idx_bus, handler });
            }
            let key = (value as u32) << 1;
            match rows.binary_search_by_key(&key, |row| row.key) {
                Ok(pos) if rows[pos].idx == handler => {}
                _ => {
                    return Err(RegistryError::DirectTableMismatch {
                        idx_bus,
                        id: value as u16,
                    })
                }
            }
        }

        for row in rows {
            // Extended identifiers never appear in the direct table.
            if row.key & 1 == 1 {
                continue;
            }
            let value = (row.key >> 1) as usize;
            if direct[value] != row.idx + 1 {
                return Err(RegistryError::DirectTableMismatch {
                    idx_bus,
                    id: value as u16,
                });
            }
        }

        Ok(())
    }

    /// Resolves an identifier received on a given bus to its handler index.
    /// Returns `None` for unmapped identifiers or an unknown bus.
    pub fn resolve(&self, idx_bus: u8, id: FrameId) -> Option<HandlerIndex> {
        HandlerIndex::new(self.resolve_raw(idx_bus, id))
    }

    /// Raw variant of [`resolve`](Self::resolve) for dispatch loops that
    /// prefer the sentinel encoding: `u8::MAX` marks an unmapped
    /// identifier.
    pub fn resolve_raw(&self, idx_bus: u8, id: FrameId) -> u8 {
        let Some(bus) = self.buses.get(idx_bus as usize) else {
            return HandlerIndex::NOT_FOUND_RAW;
        };

        if !id.is_extended() {
            if let Some(direct) = bus.direct {
                // Unmapped slots hold zero, which wraps to the sentinel.
                return direct[id.value() as usize].wrapping_sub(1);
            }
        }

        match bus
            .rows
            .binary_search_by_key(&id.ordered_key(), |row| row.key)
        {
            Ok(pos) => bus.rows[pos].idx,
            Err(_) => HandlerIndex::NOT_FOUND_RAW,
        }
    }

    /// Descriptor of the frame behind a handler index.
    pub fn descriptor(&self, handler: HandlerIndex) -> &FrameDescriptor {
        &self.frames[handler.as_usize()]
    }

    /// Full descriptor table, in handler order.
    pub fn frames(&self) -> &[FrameDescriptor] {
        self.frames
    }

    /// Number of physical buses known to the registry.
    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    /// Descriptors of frames received by this node.
    pub fn inbound(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.frames
            .iter()
            .filter(|desc| desc.direction == Direction::Inbound)
    }

    /// Descriptors of frames sent by this node.
    pub fn outbound(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.frames
            .iter()
            .filter(|desc| desc.direction == Direction::Outbound)
    }
}
