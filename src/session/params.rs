use super::desktop::DesktopNegotiation;
use super::remote::{ConnectOptions, ConnectRequest, Credentials, GatewayRequest};

use rdpdeck_core::{Node, SessionSettings};

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Translate a client's stored settings into a connect request.
pub fn build_connect_request(
    node: &Node,
    settings: &SessionSettings,
    negotiation: DesktopNegotiation,
) -> ConnectRequest {
    let credentials = Credentials {
        username: non_empty(&settings.username),
        // Passwords are passed through untouched
        password: settings.password.clone().filter(|p| !p.is_empty()),
        domain: non_empty(&settings.domain),
    };

    let gateway = settings
        .gateway
        .enabled
        .then(|| GatewayRequest {
            hostname: settings.gateway.hostname.trim().to_string(),
            logon_method: settings.gateway.logon_method,
            credentials_source: settings.gateway.logon_method.credentials_source(),
            share_credentials: settings.gateway.share_credentials,
            bypass_for_local: settings.gateway.bypass_for_local,
            credentials: Credentials {
                username: non_empty(&settings.gateway.username),
                password: settings.gateway.password.clone().filter(|p| !p.is_empty()),
                domain: non_empty(&settings.gateway.domain),
            },
        })
        .filter(|g| !g.hostname.is_empty());

    let remote_app = settings
        .remote_app
        .enabled
        .then(|| settings.remote_app.clone())
        .filter(|app| !app.path.trim().is_empty());

    ConnectRequest {
        target: settings.target(&node.name).to_string(),
        credentials,
        options: ConnectOptions {
            port: settings.port,
            desktop_size: negotiation.initial_size(),
            full_screen: negotiation.is_full_screen(),
            color_depth: settings.color_depth,
            redirect: settings.redirect,
            performance: settings.performance,
            idle_timeout_minutes: settings.idle_timeout_minutes,
            connect_to_console: settings.connect_to_console,
            gateway,
            remote_app,
        },
    }
}
