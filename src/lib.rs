//! `canif` library: the hand-engineered core of an automotive CAN
//! communication stack for `no_std` ECUs. The crate exposes the frame
//! registry and index resolver (direct table + binary search), the
//! end-to-end payload protection (checksum + rolling sequence counter),
//! the transmission scheduler (regular, event and mixed send modes) and
//! an async runtime tying them to a CAN bus driver. Per-frame pack/unpack
//! code is expected from a code generator and plugs in at the codec seam.
#![no_std]
//==================================================================================
/// Core data types shared by generated registry tables and the protocol engines.
pub mod core;
/// Domain and low-level errors (registry validation, bit access, frame sending).
pub mod error;
/// Bit-level payload access and the codec seam for generated pack/unpack code.
pub mod infra;
/// CAN stack protocol logic: frame lookup, E2E protection, transmission
/// scheduling, transport traits, and the dispatch runtime.
pub mod protocol;
//==================================================================================
