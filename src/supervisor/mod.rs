//! Connection-health supervisor
//!
//! - [`state`]: connection state, pure transitions, retry counters, stats
//! - [`machine`]: the recovery state machine that runs every tick
//! - [`boot`]: power-on sequence that hands over a ready machine

pub mod boot;
pub mod machine;
pub mod state;

pub use boot::{boot, FIRMWARE_VERSION};
pub use machine::{Collaborators, RecoveryStateMachine};
pub use state::{
    log_state_transition, transition, ConnectionState, Observation, RetryCounter, SupervisorStats,
};
