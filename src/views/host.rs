use rdpdeck_core::TreeId;

/// Window-docking host used by the tree panel.
pub trait HostWindows {
    /// Create a session window for client `tree_id`. The host builds the
    /// window's `SessionController` and connects it.
    fn open_session_window(&mut self, tree_id: TreeId);
}
