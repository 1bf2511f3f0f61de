use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: String,
    pub browser: BrowserConfig,
    pub proxy: ProxyConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationsConfig,
    pub order_log: OrderLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub accept_language: String,
    /// JS-visible locale (Intl APIs), applied per tab.
    pub locale: String,
    /// IANA timezone id for the emulation override.
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub navigation_timeout_secs: u64,
    pub launch_retry_attempts: usize,
    pub launch_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub enabled: bool,
    /// Path to a proxies.txt file, one `host:port` or `host:port:user:pass`
    /// entry per line. Lines starting with `#` are skipped.
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Fixed worker pool width for one account's monitoring phase.
    pub pool_width: usize,
    /// How long cancelled workers get to finish their current page operation.
    pub grace_period_secs: u64,
    /// Hard-kill window after the grace period expires.
    pub kill_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// General channel webhook; optional, notifications are skipped without it.
    pub webhook_url: Option<String>,
    pub username: String,
    /// Per-account webhooks keyed by account email (lower-cased).
    #[serde(default)]
    pub account_webhooks: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLogConfig {
    pub path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "DROPKICK_"
            .add_source(Environment::with_prefix("DROPKICK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Fall back to the conventional env vars the deployment scripts set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }
        if config.notifications.discord.webhook_url.is_none() {
            config.notifications.discord.webhook_url = env::var("DISCORD_WEBHOOK_URL").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.trim().is_empty() {
            return Err(ConfigError::Message("site must not be empty".into()));
        }

        if self.monitor.pool_width == 0 {
            return Err(ConfigError::Message(
                "monitor.pool_width must be greater than 0".into(),
            ));
        }

        if self.monitor.kill_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "monitor.kill_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.monitor.grace_period_secs > self.monitor.kill_timeout_secs {
            return Err(ConfigError::Message(
                "monitor.grace_period_secs must not exceed monitor.kill_timeout_secs".into(),
            ));
        }

        if self.browser.navigation_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "browser.navigation_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            validate_webhook_url(webhook)?;
        }
        for (account, webhook) in &self.notifications.discord.account_webhooks {
            validate_webhook_url(webhook).map_err(|_| {
                ConfigError::Message(format!("Invalid webhook URL for account {}", account))
            })?;
        }

        if self.order_log.path.trim().is_empty() {
            return Err(ConfigError::Message("order_log.path must not be empty".into()));
        }

        Ok(())
    }
}

fn validate_webhook_url(webhook: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(webhook)
        .map_err(|_| ConfigError::Message(format!("Invalid webhook URL: {}", webhook)))?;
    if parsed.scheme() != "https" {
        return Err(ConfigError::Message(
            "Webhook URLs must use https".into(),
        ));
    }
    Ok(())
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "ja-JP,ja;q=0.9".to_string(),
            locale: "ja-JP".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            latitude: 35.6814,
            longitude: 139.7670,
            navigation_timeout_secs: 60,
            launch_retry_attempts: 3,
            launch_retry_delay_ms: 500,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pool_width: 4,
            grace_period_secs: 5,
            kill_timeout_secs: 10,
        }
    }
}
