//! Flat editor model for a client's session settings.

use rdpdeck_core::{
    ClientIcon, DesktopSize, GatewayLogonMethod, GatewaySettings, PerformanceFlags,
    RedirectFlags, RemoteApplication, Result, SessionSettings, TreeError,
};

const COLOR_DEPTHS: &[u8] = &[8, 15, 16, 24, 32];

/// What the client-settings dialog edits. Numeric fields and the desktop
/// size are kept as the text the user typed; empty optional text means "not set".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientForm {
    pub host: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub port: String,
    /// `"1"`, `"0"` or `"<width>x<height>"`
    pub desktop_size: String,
    pub color_depth: u8,
    pub connect_to_console: bool,
    pub idle_timeout_minutes: String,
    pub icon: ClientIcon,

    pub redirect_drives: bool,
    pub redirect_ports: bool,
    pub redirect_printers: bool,
    pub redirect_smart_cards: bool,
    pub redirect_clipboard: bool,
    pub redirect_point_of_service: bool,
    pub redirect_audio: bool,

    pub disable_wallpaper: bool,
    pub disable_full_window_drag: bool,
    pub disable_menu_animations: bool,
    pub disable_theming: bool,
    pub disable_cursor_shadow: bool,
    pub disable_cursor_settings: bool,
    pub enable_font_smoothing: bool,
    pub enable_desktop_composition: bool,

    pub gateway_enabled: bool,
    pub gateway_hostname: String,
    pub gateway_logon_method: GatewayLogonMethod,
    pub gateway_share_credentials: bool,
    pub gateway_bypass_for_local: bool,
    pub gateway_username: String,
    pub gateway_domain: String,
    pub gateway_password: String,

    pub remote_app_enabled: bool,
    pub remote_app_path: String,
    pub remote_app_working_dir: String,
    pub remote_app_maximize: bool,
}

fn optional(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn secret(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

impl ClientForm {
    /// Validate the form and build the settings record it describes.
    pub fn to_settings(&self) -> Result<SessionSettings> {
        let port = self
            .port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| TreeError::validation("port must be a number between 1 and 65535"))?;

        let desktop_size = self
            .desktop_size
            .parse::<DesktopSize>()
            .map_err(|e| TreeError::validation(format!("desktop size: {}", e)))?;

        if !COLOR_DEPTHS.contains(&self.color_depth) {
            return Err(TreeError::validation(format!(
                "unsupported color depth {}",
                self.color_depth
            )));
        }

        let idle = self.idle_timeout_minutes.trim();
        let idle_timeout_minutes = if idle.is_empty() {
            0
        } else {
            idle.parse::<u32>()
                .map_err(|_| TreeError::validation("idle timeout must be a whole number of minutes"))?
        };

        if self.gateway_enabled && self.gateway_hostname.trim().is_empty() {
            return Err(TreeError::validation("gateway hostname is required"));
        }
        if self.remote_app_enabled && self.remote_app_path.trim().is_empty() {
            return Err(TreeError::validation("remote application path is required"));
        }

        let mut redirect = RedirectFlags::empty();
        redirect.set(RedirectFlags::DRIVES, self.redirect_drives);
        redirect.set(RedirectFlags::PORTS, self.redirect_ports);
        redirect.set(RedirectFlags::PRINTERS, self.redirect_printers);
        redirect.set(RedirectFlags::SMART_CARDS, self.redirect_smart_cards);
        redirect.set(RedirectFlags::CLIPBOARD, self.redirect_clipboard);
        redirect.set(RedirectFlags::POINT_OF_SERVICE, self.redirect_point_of_service);
        redirect.set(RedirectFlags::AUDIO, self.redirect_audio);

        let mut performance = PerformanceFlags::empty();
        performance.set(PerformanceFlags::DISABLE_WALLPAPER, self.disable_wallpaper);
        performance.set(PerformanceFlags::DISABLE_FULL_WINDOW_DRAG, self.disable_full_window_drag);
        performance.set(PerformanceFlags::DISABLE_MENU_ANIMATIONS, self.disable_menu_animations);
        performance.set(PerformanceFlags::DISABLE_THEMING, self.disable_theming);
        performance.set(PerformanceFlags::DISABLE_CURSOR_SHADOW, self.disable_cursor_shadow);
        performance.set(PerformanceFlags::DISABLE_CURSOR_SETTINGS, self.disable_cursor_settings);
        performance.set(PerformanceFlags::ENABLE_FONT_SMOOTHING, self.enable_font_smoothing);
        performance.set(PerformanceFlags::ENABLE_DESKTOP_COMPOSITION, self.enable_desktop_composition);

        Ok(SessionSettings {
            host: self.host.trim().to_string(),
            username: optional(&self.username),
            password: secret(&self.password),
            domain: optional(&self.domain),
            port,
            redirect,
            performance,
            desktop_size,
            color_depth: self.color_depth,
            connect_to_console: self.connect_to_console,
            gateway: GatewaySettings {
                enabled: self.gateway_enabled,
                hostname: self.gateway_hostname.trim().to_string(),
                logon_method: self.gateway_logon_method,
                share_credentials: self.gateway_share_credentials,
                bypass_for_local: self.gateway_bypass_for_local,
                username: optional(&self.gateway_username),
                domain: optional(&self.gateway_domain),
                password: secret(&self.gateway_password),
            },
            remote_app: RemoteApplication {
                enabled: self.remote_app_enabled,
                path: self.remote_app_path.trim().to_string(),
                working_dir: self.remote_app_working_dir.trim().to_string(),
                maximize: self.remote_app_maximize,
            },
            idle_timeout_minutes,
            icon: self.icon,
        })
    }

    /// Populate the form from a stored record.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        let redirect = settings.redirect;
        let performance = settings.performance;
        Self {
            host: settings.host.clone(),
            username: settings.username.clone().unwrap_or_default(),
            password: settings.password.clone().unwrap_or_default(),
            domain: settings.domain.clone().unwrap_or_default(),
            port: settings.port.to_string(),
            desktop_size: settings.desktop_size.to_string(),
            color_depth: settings.color_depth,
            connect_to_console: settings.connect_to_console,
            idle_timeout_minutes: match settings.idle_timeout_minutes {
                0 => String::new(),
                minutes => minutes.to_string(),
            },
            icon: settings.icon,

            redirect_drives: redirect.contains(RedirectFlags::DRIVES),
            redirect_ports: redirect.contains(RedirectFlags::PORTS),
            redirect_printers: redirect.contains(RedirectFlags::PRINTERS),
            redirect_smart_cards: redirect.contains(RedirectFlags::SMART_CARDS),
            redirect_clipboard: redirect.contains(RedirectFlags::CLIPBOARD),
            redirect_point_of_service: redirect.contains(RedirectFlags::POINT_OF_SERVICE),
            redirect_audio: redirect.contains(RedirectFlags::AUDIO),

            disable_wallpaper: performance.contains(PerformanceFlags::DISABLE_WALLPAPER),
            disable_full_window_drag: performance.contains(PerformanceFlags::DISABLE_FULL_WINDOW_DRAG),
            disable_menu_animations: performance.contains(PerformanceFlags::DISABLE_MENU_ANIMATIONS),
            disable_theming: performance.contains(PerformanceFlags::DISABLE_THEMING),
            disable_cursor_shadow: performance.contains(PerformanceFlags::DISABLE_CURSOR_SHADOW),
            disable_cursor_settings: performance.contains(PerformanceFlags::DISABLE_CURSOR_SETTINGS),
            enable_font_smoothing: performance.contains(PerformanceFlags::ENABLE_FONT_SMOOTHING),
            enable_desktop_composition: performance.contains(PerformanceFlags::ENABLE_DESKTOP_COMPOSITION),

            gateway_enabled: settings.gateway.enabled,
            gateway_hostname: settings.gateway.hostname.clone(),
            gateway_logon_method: settings.gateway.logon_method,
            gateway_share_credentials: settings.gateway.share_credentials,
            gateway_bypass_for_local: settings.gateway.bypass_for_local,
            gateway_username: settings.gateway.username.clone().unwrap_or_default(),
            gateway_domain: settings.gateway.domain.clone().unwrap_or_default(),
            gateway_password: settings.gateway.password.clone().unwrap_or_default(),

            remote_app_enabled: settings.remote_app.enabled,
            remote_app_path: settings.remote_app.path.clone(),
            remote_app_working_dir: settings.remote_app.working_dir.clone(),
            remote_app_maximize: settings.remote_app.maximize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ClientForm {
        ClientForm::from_settings(&SessionSettings::for_host("db1.lan"))
    }

    #[test]
    fn defaults_survive_the_form() {
        let form = valid_form();
        assert_eq!(form.port, "3389");
        assert_eq!(form.desktop_size, "0");
        assert_eq!(form.to_settings().unwrap(), SessionSettings::for_host("db1.lan"));
    }

    #[test]
    fn every_field_is_mapped() {
        let form = ClientForm {
            host: " 10.0.0.5 ".into(),
            username: "admin".into(),
            password: " p@ss ".into(),
            domain: "CORP".into(),
            port: "3390".into(),
            desktop_size: "1280x1024".into(),
            color_depth: 16,
            connect_to_console: true,
            idle_timeout_minutes: "15".into(),
            icon: ClientIcon::Modern,
            redirect_clipboard: true,
            redirect_audio: true,
            disable_wallpaper: true,
            enable_font_smoothing: true,
            gateway_enabled: true,
            gateway_hostname: "gw.corp".into(),
            gateway_logon_method: GatewayLogonMethod::Password,
            gateway_password: "gw".into(),
            remote_app_enabled: true,
            remote_app_path: "excel.exe".into(),
            remote_app_maximize: true,
            ..ClientForm::default()
        };
        let settings = form.to_settings().unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.password.as_deref(), Some(" p@ss "));
        assert_eq!(settings.port, 3390);
        assert_eq!(settings.desktop_size, DesktopSize::fixed(1280, 1024));
        assert_eq!(settings.redirect, RedirectFlags::CLIPBOARD | RedirectFlags::AUDIO);
        assert_eq!(
            settings.performance,
            PerformanceFlags::DISABLE_WALLPAPER | PerformanceFlags::ENABLE_FONT_SMOOTHING
        );
        assert_eq!(settings.idle_timeout_minutes, 15);
        assert!(settings.gateway.enabled);
        assert_eq!(settings.gateway.username, None);
        assert_eq!(settings.gateway.password.as_deref(), Some("gw"));
        assert!(settings.remote_app.maximize);

        // And back again
        let reloaded = ClientForm::from_settings(&settings);
        assert_eq!(reloaded.to_settings().unwrap(), settings);
        assert_eq!(reloaded.host, "10.0.0.5");
    }

    #[test]
    fn invalid_input_is_rejected() {
        let cases: [fn(&mut ClientForm); 9] = [
            |f| f.port = "0".into(),
            |f| f.port = "70000".into(),
            |f| f.port = "rdp".into(),
            |f| f.desktop_size = "0x768".into(),
            |f| f.desktop_size = "wide".into(),
            |f| f.color_depth = 12,
            |f| f.idle_timeout_minutes = "-1".into(),
            |f| f.gateway_enabled = true,
            |f| f.remote_app_enabled = true,
        ];
        for mutate in cases {
            let mut form = valid_form();
            mutate(&mut form);
            assert!(matches!(form.to_settings(), Err(TreeError::Validation(_))));
        }
    }
}
