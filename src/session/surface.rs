use rdpdeck_core::{ClientIcon, DisplayTopology, Size};

/// Hosting window state as far as full-screen toggling is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowState {
    #[default]
    Normal,
    Maximized,
}

/// The UI surface (session window) hosting one remote session.
pub trait SessionSurface {
    /// Current client-area size in pixels.
    fn client_size(&self) -> Size;
    fn display_topology(&self) -> DisplayTopology;
    fn focus(&mut self);
    fn set_caption(&mut self, caption: &str);
    /// Update the connected indicator using the client's icon set.
    fn set_connected(&mut self, connected: bool, icon: ClientIcon);
    /// Ask the host to close this surface.
    fn request_close(&mut self);
}

pub(crate) fn caption_for(name: &str) -> String {
    format!("{} - Terminal Client", name)
}
