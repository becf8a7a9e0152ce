use anyhow::Context;
use rdpdeck::config;
use rdpdeck::persistence::FileBlobStore;
use rdpdeck::registry::SettingsRegistry;
use rdpdeck::session::SessionDirectory;
use rdpdeck::views::{RowIcon, TreePanel};
use rdpdeck_core::TreeId;
use std::rc::Rc;

fn print_rows(panel: &TreePanel, parent: Option<TreeId>, depth: usize) {
    for row in panel.children(parent) {
        let marker = match row.icon {
            RowIcon::Folder => "+",
            RowIcon::Client { connected: true, .. } => "*",
            RowIcon::Client { connected: false, .. } => "-",
        };
        println!("{}{} {} [{}]", "  ".repeat(depth), marker, row.name, row.id);
        print_rows(panel, Some(row.id), depth + 1);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = config::load_app_settings();
    log::debug!("Loaded settings: {:?}", settings);

    // Optional path argument overrides the default connection file
    let store = match std::env::args_os().nth(1) {
        Some(path) => FileBlobStore::new(path),
        None => FileBlobStore::default_location(),
    };
    let path = store.path().to_path_buf();
    let registry = Rc::new(
        SettingsRegistry::open(Box::new(store))
            .with_context(|| format!("Failed to open connection tree {}", path.display()))?,
    );

    let mut panel = TreePanel::open(registry.clone(), SessionDirectory::new());
    panel.wait_listing();

    if panel.is_empty() {
        println!("No connections in {}", path.display());
        return Ok(());
    }
    print_rows(&panel, None, 0);

    let servers = registry.server_list();
    if !servers.is_empty() {
        println!();
        println!("Servers: {}", servers.join(", "));
    }
    Ok(())
}
