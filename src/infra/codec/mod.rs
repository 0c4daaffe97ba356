//! Bit-level payload access plus the seam where generated pack/unpack code
//! plugs into the stack.
pub mod bits;
pub mod traits;
