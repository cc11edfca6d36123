use anyhow::{Context, Result};

/// Secrets and environment-specific values. Everything else lives in the
/// TOML [`FileConfig`](crate::FileConfig).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Warehouse
    pub database_url: String,

    // Sources
    pub fb_access_token: String,
    pub ga4_access_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required_env("DATABASE_URL")?,
            fb_access_token: required_env("FB_ACCESS_TOKEN")?,
            ga4_access_token: std::env::var("GA4_ACCESS_TOKEN")
                .ok()
                .filter(|v| !v.is_empty()),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  FB_ACCESS_TOKEN: {}", describe_secret(Some(&self.fb_access_token)));
        tracing::info!(
            "  GA4_ACCESS_TOKEN: {}",
            describe_secret(self.ga4_access_token.as_deref())
        );
    }
}

/// Whether a secret is set and how long it is. Never any of its characters.
fn describe_secret(val: Option<&str>) -> String {
    match val {
        Some(v) if !v.is_empty() => format!("set ({} chars)", v.chars().count()),
        _ => "<not set>".to_string(),
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} environment variable is required"))
}
