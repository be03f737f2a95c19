use serde::{Deserialize, Serialize};

/// Currencies the platform can be configured to display.
pub const SUPPORTED_CURRENCIES: &[&str] = &["CLP", "USD", "EUR"];

/// Platform-wide settings managed by the admin.
///
/// The service sends these as a whole record and expects the whole record
/// back on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub system_name: String,
    pub currency: String,
    #[serde(default)]
    pub logo_url: String,
    /// Minutes of inactivity before a session ends
    pub session_timeout: u32,
    pub email_notifications: bool,
    pub app_notifications: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            system_name: "Suscridash".to_string(),
            currency: "CLP".to_string(),
            logo_url: String::new(),
            session_timeout: 30,
            email_notifications: true,
            app_notifications: true,
        }
    }
}

/// Wire wrapper: the settings endpoints answer `{"settings": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsEnvelope {
    pub settings: SystemSettings,
}
