/// Runtime settings loaded from environment variables at startup.
///
/// Every setting has a default, so a bare environment still yields a working
/// configuration that posts to the public ntfy.sh server.
#[derive(Debug, Clone)]
pub struct Config {
    // Notifications
    pub ntfy_base_url: String,
    pub ntfy_prefix: String,

    // Market data
    pub yahoo_base_url: String,

    // Dashboard
    pub dashboard_port: u16,
    /// `None` leaves the dashboard API open.
    pub dashboard_token: Option<String>,
}

impl Config {
    pub const DEFAULT_NTFY_BASE_URL: &'static str = "https://ntfy.sh";
    pub const DEFAULT_NTFY_PREFIX: &'static str = "stotify";
    pub const DEFAULT_YAHOO_BASE_URL: &'static str = "https://query2.finance.yahoo.com";
    pub const DEFAULT_DASHBOARD_PORT: u16 = 8501;

    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            ntfy_base_url: optional_env("NTFY_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_NTFY_BASE_URL.to_string()),
            ntfy_prefix: optional_env("NTFY_PREFIX")
                .unwrap_or_else(|| Self::DEFAULT_NTFY_PREFIX.to_string()),
            yahoo_base_url: optional_env("YAHOO_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_YAHOO_BASE_URL.to_string()),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(Self::DEFAULT_DASHBOARD_PORT),
            dashboard_token: optional_env("DASHBOARD_TOKEN"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ntfy_base_url: Self::DEFAULT_NTFY_BASE_URL.to_string(),
            ntfy_prefix: Self::DEFAULT_NTFY_PREFIX.to_string(),
            yahoo_base_url: Self::DEFAULT_YAHOO_BASE_URL.to_string(),
            dashboard_port: Self::DEFAULT_DASHBOARD_PORT,
            dashboard_token: None,
        }
    }
}

/// Empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
