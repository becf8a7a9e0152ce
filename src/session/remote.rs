use rdpdeck_core::{
    GatewayLogonMethod, PerformanceFlags, RedirectFlags, RemoteApplication, Size,
};

/// External remote-desktop capability driven by a `SessionController`.
///
/// Completion is reported back through the controller's `on_connected`,
/// `on_disconnected` and `on_request_leave_full_screen` handlers.
pub trait RemoteSession {
    fn connect(&mut self, request: &ConnectRequest);
    fn disconnect(&mut self);
    /// Ask the server to end the session gracefully.
    fn request_close(&mut self);
    /// Older protocol versions can only be disconnected.
    fn supports_request_close(&self) -> bool {
        true
    }
    fn set_desktop_size(&mut self, size: Size);
    fn go_full_screen(&mut self);
    fn leave_full_screen(&mut self);
    fn get_error_description(&self, code: u32) -> String;
    /// Largest desktop the remote side accepts.
    fn max_desktop_size(&self) -> Size {
        super::DEFAULT_MAX_DESKTOP_SIZE
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.domain.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRequest {
    pub hostname: String,
    pub logon_method: GatewayLogonMethod,
    /// Value of the remote's credential-source setting
    pub credentials_source: u32,
    pub share_credentials: bool,
    pub bypass_for_local: bool,
    pub credentials: Credentials,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    pub port: u16,
    /// Initial desktop size
    pub desktop_size: Size,
    pub full_screen: bool,
    pub color_depth: u8,
    pub redirect: RedirectFlags,
    pub performance: PerformanceFlags,
    pub idle_timeout_minutes: u32,
    pub connect_to_console: bool,
    pub gateway: Option<GatewayRequest>,
    pub remote_app: Option<RemoteApplication>,
}

/// Everything the remote session needs to start connecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: String,
    pub credentials: Credentials,
    pub options: ConnectOptions,
}

/// Reason reported by the remote when the session ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisconnectReason {
    pub code: u32,
}

impl DisconnectReason {
    pub const NO_INFO: u32 = 0;
    pub const LOCAL: u32 = 1;
    pub const REMOTE_BY_USER: u32 = 2;
    pub const REMOTE_BY_SERVER: u32 = 3;

    pub fn new(code: u32) -> Self {
        Self { code }
    }

    /// Codes above the normal-close range indicate a failure.
    pub fn is_error(&self) -> bool {
        self.code > Self::REMOTE_BY_SERVER
    }
}
