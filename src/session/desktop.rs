//! Desktop-size negotiation. Pure: no transport, no surface.

use rdpdeck_core::{DesktopSize, DisplayTopology, Size};

/// Cap used when the remote does not report its own limit.
pub const DEFAULT_MAX_DESKTOP_SIZE: Size = Size::new(8192, 8192);

/// Concrete display negotiation derived from a client's desktop-size mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DesktopNegotiation {
    /// Start full screen at the given size.
    FullScreen(Size),
    /// Track the hosting surface; renegotiated on every resize while connected.
    SameAsClient(Size),
    Fixed(Size),
}

impl DesktopNegotiation {
    pub fn initial_size(&self) -> Size {
        match *self {
            DesktopNegotiation::FullScreen(size)
            | DesktopNegotiation::SameAsClient(size)
            | DesktopNegotiation::Fixed(size) => size,
        }
    }

    pub fn is_full_screen(&self) -> bool {
        matches!(self, DesktopNegotiation::FullScreen(_))
    }

    pub fn follows_surface(&self) -> bool {
        matches!(self, DesktopNegotiation::SameAsClient(_))
    }
}

pub fn negotiate(
    mode: &DesktopSize,
    surface_size: Size,
    topology: &DisplayTopology,
    max: Size,
    use_multiple_monitors: bool,
) -> DesktopNegotiation {
    match *mode {
        DesktopSize::FullScreen => DesktopNegotiation::FullScreen(
            full_screen_bounds(topology, max, use_multiple_monitors).unwrap_or(surface_size.min(max)),
        ),
        DesktopSize::SameAsClient => DesktopNegotiation::SameAsClient(surface_size),
        DesktopSize::Fixed { width, height } => DesktopNegotiation::Fixed(Size::new(width, height)),
    }
}

/// Full-screen target size: spans every display (summed width, smallest
/// height) when allowed and available, else the primary working area.
/// `None` when the topology lists no displays.
pub fn full_screen_bounds(
    topology: &DisplayTopology,
    max: Size,
    use_multiple_monitors: bool,
) -> Option<Size> {
    let size = if use_multiple_monitors && topology.screens.len() > 1 {
        let width = topology
            .screens
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.bounds.width));
        let height = topology.screens.iter().map(|s| s.bounds.height).min()?;
        Size::new(width, height)
    } else {
        topology.primary()?.working_area.size()
    };
    Some(size.min(max))
}
