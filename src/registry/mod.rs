//! Shared settings registry: owns the tree store, persists it and fans out
//! change and connection-state notifications.

mod observer;
mod settings_registry;

pub use observer::{EventQueue, RegistryObserver, SubscriptionId};
pub use settings_registry::SettingsRegistry;
