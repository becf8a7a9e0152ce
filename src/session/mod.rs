//! Per-window session handling: the connection state machine and the
//! capabilities it drives.

mod controller;
pub mod desktop;
mod directory;
mod params;
mod remote;
mod surface;

pub use controller::{SessionController, SessionOptions};
pub use desktop::{negotiate, DesktopNegotiation, DEFAULT_MAX_DESKTOP_SIZE};
pub use directory::{SessionDirectory, SessionRuntimeState};
pub use params::build_connect_request;
pub use remote::{ConnectOptions, ConnectRequest, Credentials, DisconnectReason, GatewayRequest, RemoteSession};
pub use surface::{SessionSurface, WindowState};

#[cfg(test)]
pub(crate) mod testing;
