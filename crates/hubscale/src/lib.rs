//! hubscale - node registry daemon for a mesh control plane.
//!
//! the registry logic lives in `hubscale-state`; this crate wires it into a
//! long-running process:
//! - [`LifecycleSweeper`] runs the ephemeral and expiry sweeps on a timer
//! - [`StateNotifier`] fans the resulting change notifications out to
//!   whatever distribution layer subscribes
//! - [`cli`] loads configuration and starts everything

pub mod cli;
mod notifier;
mod sweeper;

pub use notifier::StateNotifier;
pub use sweeper::LifecycleSweeper;
