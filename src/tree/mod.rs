//! Hierarchical node table and per-client session settings.

mod store;

pub use store::{ClientRecord, SettingsDocument, TreeStore, SETTINGS_DOCUMENT_VERSION};
