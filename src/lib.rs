//! envmon - connection-health supervisor for an environmental sensor node
//!
//! The node samples a CO2 / temperature / humidity sensor and publishes the
//! readings to an MQTT broker over a wireless link. Both the link and the
//! broker fail independently; this crate decides which one to recover
//! first, how long to keep trying, and what the single status LED shows
//! while it does.
//!
//! # Overview
//!
//! - [`link`]: initial multi-network connect and single-network recovery
//! - [`broker`]: fresh-session connect and single-attempt publish
//! - [`supervisor`]: the recovery state machine and the boot sequence
//! - [`indicator`] / [`event_log`]: the operator-visible failure surface
//! - [`testing`]: mocks for every collaborator
//!
//! # Quick Start
//!
//! ```rust
//! use envmon::supervisor::{transition, ConnectionState, Observation};
//!
//! // Link loss wins from any state
//! let next = transition(ConnectionState::RecoveringBroker, Observation::LinkDown);
//! assert_eq!(next, ConnectionState::RecoveringLink);
//!
//! // Recovery ends only for the dependency being recovered
//! let next = transition(ConnectionState::RecoveringLink, Observation::BrokerRestored);
//! assert_eq!(next, ConnectionState::RecoveringLink);
//! ```

pub mod broker;
pub mod config;
pub mod error;
pub mod event_log;
pub mod indicator;
pub mod link;
pub mod observability;
pub mod protocol;
pub mod sensor;
pub mod supervisor;
pub mod testing;

pub use config::{KnownNetwork, MonitorConfig, Timing};
pub use error::{ErrorCode, MonitorError, MonitorResult};
pub use supervisor::{ConnectionState, RecoveryStateMachine};
