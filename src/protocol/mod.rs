//! High-level components of the CAN communication stack: identifier
//! lookup tables, end-to-end payload integrity, transmission timing,
//! the dispatch runtime, and the transport abstraction.
pub mod e2e;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod transport;
