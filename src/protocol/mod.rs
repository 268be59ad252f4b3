//! Wire-level payloads and topics published by the monitor
//!
//! Payloads are flat JSON field maps; the exact bytes are re-derivable from
//! the [`Measurement`](crate::sensor::Measurement) or event they encode.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
