//! Persisted connection parameters of a Client node.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default RDP listener port
pub const DEFAULT_RDP_PORT: u16 = 3389;
/// Default color depth in bits per pixel
pub const DEFAULT_COLOR_DEPTH: u8 = 32;

bitflags! {
    /// Local resources forwarded into the remote session.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RedirectFlags: u32 {
        const DRIVES = 0x01;
        const PORTS = 0x02;
        const PRINTERS = 0x04;
        const SMART_CARDS = 0x08;
        const CLIPBOARD = 0x10;
        const POINT_OF_SERVICE = 0x20;
        const AUDIO = 0x40;
    }
}

impl Default for RedirectFlags {
    fn default() -> Self {
        RedirectFlags::empty()
    }
}

bitflags! {
    /// Visual features the remote session may drop to save bandwidth.
    /// Values match the remote protocol's performance flag bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PerformanceFlags: u32 {
        const DISABLE_WALLPAPER = 0x01;
        const DISABLE_FULL_WINDOW_DRAG = 0x02;
        const DISABLE_MENU_ANIMATIONS = 0x04;
        const DISABLE_THEMING = 0x08;
        const DISABLE_CURSOR_SHADOW = 0x20;
        const DISABLE_CURSOR_SETTINGS = 0x40;
        const ENABLE_FONT_SMOOTHING = 0x80;
        const ENABLE_DESKTOP_COMPOSITION = 0x100;
    }
}

impl Default for PerformanceFlags {
    fn default() -> Self {
        PerformanceFlags::empty()
    }
}

/// How the remote desktop is sized.
///
/// The legacy text form is `"1"` for full screen, `"0"` for same-as-client
/// and `"<width>x<height>"` for fixed dimensions. Both the legacy text and
/// the tagged form deserialize; serialization always uses the tagged form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "TaggedDesktopSize", try_from = "DesktopSizeRepr")]
pub enum DesktopSize {
    /// Expand over the display(s) of the hosting environment
    FullScreen,
    /// Follow the pixel size of the hosting surface
    #[default]
    SameAsClient,
    Fixed { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesktopSizeParseError {
    #[error("desktop size '{0}' is not in <width>x<height> form")]
    Format(String),
    #[error("invalid width in desktop size '{0}'")]
    Width(String),
    #[error("invalid height in desktop size '{0}'")]
    Height(String),
}

impl DesktopSize {
    pub fn fixed(width: u32, height: u32) -> Self {
        DesktopSize::Fixed { width, height }
    }

    pub fn display_name(&self) -> String {
        match self {
            DesktopSize::FullScreen => "Full screen".to_string(),
            DesktopSize::SameAsClient => "Same as client".to_string(),
            DesktopSize::Fixed { width, height } => format!("{} x {}", width, height),
        }
    }
}

impl fmt::Display for DesktopSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesktopSize::FullScreen => write!(f, "1"),
            DesktopSize::SameAsClient => write!(f, "0"),
            DesktopSize::Fixed { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl FromStr for DesktopSize {
    type Err = DesktopSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "1" => return Ok(DesktopSize::FullScreen),
            "" | "0" => return Ok(DesktopSize::SameAsClient),
            _ => {}
        }

        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| DesktopSizeParseError::Format(s.to_string()))?;
        let width = w
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| DesktopSizeParseError::Width(s.to_string()))?;
        let height = h
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| DesktopSizeParseError::Height(s.to_string()))?;
        Ok(DesktopSize::Fixed { width, height })
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum TaggedDesktopSize {
    FullScreen,
    SameAsClient,
    Fixed { width: u32, height: u32 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DesktopSizeRepr {
    Legacy(String),
    Tagged(TaggedDesktopSize),
}

impl From<DesktopSize> for TaggedDesktopSize {
    fn from(size: DesktopSize) -> Self {
        match size {
            DesktopSize::FullScreen => TaggedDesktopSize::FullScreen,
            DesktopSize::SameAsClient => TaggedDesktopSize::SameAsClient,
            DesktopSize::Fixed { width, height } => TaggedDesktopSize::Fixed { width, height },
        }
    }
}

impl TryFrom<DesktopSizeRepr> for DesktopSize {
    type Error = DesktopSizeParseError;

    fn try_from(repr: DesktopSizeRepr) -> Result<Self, Self::Error> {
        match repr {
            DesktopSizeRepr::Legacy(text) => text.parse(),
            DesktopSizeRepr::Tagged(TaggedDesktopSize::FullScreen) => Ok(DesktopSize::FullScreen),
            DesktopSizeRepr::Tagged(TaggedDesktopSize::SameAsClient) => {
                Ok(DesktopSize::SameAsClient)
            }
            DesktopSizeRepr::Tagged(TaggedDesktopSize::Fixed { width, height }) => {
                if width == 0 {
                    Err(DesktopSizeParseError::Width(format!("{}x{}", width, height)))
                } else if height == 0 {
                    Err(DesktopSizeParseError::Height(format!("{}x{}", width, height)))
                } else {
                    Ok(DesktopSize::Fixed { width, height })
                }
            }
        }
    }
}

/// Where the gateway takes its credentials from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayLogonMethod {
    /// Ask for a password (NTLM)
    Password,
    SmartCard,
    /// Let the gateway pick
    #[default]
    Any,
}

impl GatewayLogonMethod {
    /// Credential source code understood by the remote protocol.
    pub fn credentials_source(&self) -> u32 {
        match self {
            GatewayLogonMethod::Password => 0,
            GatewayLogonMethod::SmartCard => 1,
            GatewayLogonMethod::Any => 4,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub logon_method: GatewayLogonMethod,
    /// Reuse the session credentials for the gateway
    #[serde(default)]
    pub share_credentials: bool,
    /// Skip the gateway for local addresses
    #[serde(default)]
    pub bypass_for_local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Program started in place of the remote shell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteApplication {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub maximize: bool,
}

/// Icon set used for a client's connected / disconnected indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientIcon {
    #[default]
    Classic,
    Modern,
}

/// Connection parameters for one Client node. Replaced wholesale on edit.
///
/// The password is stored verbatim; protecting it at rest is the job of
/// whoever persists the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Target host or address. Empty means "use the node name".
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub redirect: RedirectFlags,
    #[serde(default)]
    pub performance: PerformanceFlags,
    #[serde(default)]
    pub desktop_size: DesktopSize,
    #[serde(default = "default_color_depth")]
    pub color_depth: u8,
    #[serde(default)]
    pub connect_to_console: bool,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub remote_app: RemoteApplication,
    #[serde(default)]
    pub idle_timeout_minutes: u32,
    #[serde(default)]
    pub icon: ClientIcon,
}

fn default_port() -> u16 {
    DEFAULT_RDP_PORT
}

fn default_color_depth() -> u8 {
    DEFAULT_COLOR_DEPTH
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: None,
            password: None,
            domain: None,
            port: DEFAULT_RDP_PORT,
            redirect: RedirectFlags::default(),
            performance: PerformanceFlags::default(),
            desktop_size: DesktopSize::default(),
            color_depth: DEFAULT_COLOR_DEPTH,
            connect_to_console: false,
            gateway: GatewaySettings::default(),
            remote_app: RemoteApplication::default(),
            idle_timeout_minutes: 0,
            icon: ClientIcon::default(),
        }
    }
}

impl SessionSettings {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Host to connect to, falling back to `node_name` when no host is set.
    pub fn target<'a>(&'a self, node_name: &'a str) -> &'a str {
        let host = self.host.trim();
        if host.is_empty() { node_name } else { host }
    }
}
