//! Connection tree and session-state synchronization for remote-desktop
//! clients.

pub mod config;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod tree;
pub mod views;
