//! Shared types for the connection tree, session settings and the
//! connection-state events exchanged between the registry, session
//! controllers and view bindings. No I/O lives here.

pub mod error;
pub mod events;
pub mod geometry;
pub mod settings;
pub mod types;

pub use error::{ConnectionError, Result, TreeError};
pub use events::{ConnectionIntent, ConnectionStateChanged, ConnectionStatus, RegistryEvent};
pub use geometry::{DisplayTopology, Rect, Screen, Size};
pub use settings::{
    ClientIcon, DesktopSize, GatewayLogonMethod, GatewaySettings, PerformanceFlags, RedirectFlags,
    RemoteApplication, SessionSettings,
};
pub use types::{Node, NodeKind, TreeId};
