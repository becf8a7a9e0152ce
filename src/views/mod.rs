//! View bindings over the settings registry.

pub mod client_form;
mod host;
mod tree_panel;

pub use client_form::ClientForm;
pub use host::HostWindows;
pub use tree_panel::{RowIcon, TreePanel, TreeRow};
