//! Functional test support for a caching block-device driver.
//!
//! Starts commands on local or remote test targets and reads their output
//! incrementally through [`channel::Channel`]s, including checks of the
//! progress bars printed by long-running cache operations.

pub mod channel;
pub mod config;
pub mod display;
pub mod executor;
pub mod process;
pub mod progress;
pub mod wait;
