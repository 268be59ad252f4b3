//! Testing utilities and mock implementations
//!
//! Lets the supervisor run end to end without a radio, a broker or a sensor.

pub mod harness;
pub mod mocks;

pub use harness::{MockMachine, MockNode};
pub use mocks::*;
