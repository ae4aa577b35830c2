//! Core library for the LibreMesh hardware-in-the-loop test suite
//!
//! This crate provides the harness logic for exercising LibreMesh firmware on
//! lab devices: lab topology resolution, remote shell sessions over SSH,
//! driver-state transitions, virtual-mesh bring-up and the ubus RPC bridge.

pub mod bringup;
pub mod config;
pub mod rpc;
pub mod session;
pub mod state;
pub mod strategy;
pub mod target;
pub mod topology;

// Re-export commonly used types
pub use anyhow::Result;
pub use bringup::BringUp;
pub use config::HarnessConfig;
pub use session::ShellSession;
pub use strategy::{BoardStrategy, DriverState};
pub use target::TargetDescriptor;

#[cfg(test)]
mod tests;
