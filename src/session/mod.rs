pub mod proxy;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, ProxyConfig};
use crate::utils::error::{AppError, Result};
use proxy::{Proxy, ProxyPool};

const GEO_ACCURACY_METERS: f64 = 100.0;

/// Init script run against every fresh page before site code sees it.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => false });
    window.navigator.chrome = { runtime: {} };
"#;

/// One isolated page belonging to a session. Detached pages (no live tab
/// behind them) come from `Session::detached` and exist so the orchestration
/// layers can be exercised without a running Chrome.
#[derive(Clone)]
pub struct Page {
    tab: Option<Arc<Tab>>,
}

impl Page {
    fn live(tab: Arc<Tab>) -> Self {
        Self { tab: Some(tab) }
    }

    fn detached() -> Self {
        Self { tab: None }
    }

    pub fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| AppError::Browser("page has no live tab".to_string()))
    }

    /// Closes the underlying tab. Failures are swallowed: by the time a
    /// worker closes its page the browser may already be gone.
    pub fn close(&self) {
        if let Some(tab) = &self.tab {
            let _ = tab.close(true);
        }
    }
}

/// An isolated browsing context owned by exactly one account's processing
/// cycle. Holds the browser plus the primary tab used for login and
/// batch-level checkout; monitoring workers open their own pages.
pub struct Session {
    browser: Mutex<Option<Browser>>,
    primary: Page,
    profile: BrowserConfig,
    proxy: Option<Proxy>,
    released: AtomicBool,
}

impl Session {
    /// A session with no live browser behind it. Page operations against it
    /// fail with a browser error; useful wherever the orchestration path is
    /// driven with mock adapters.
    pub fn detached() -> Self {
        Self {
            browser: Mutex::new(None),
            primary: Page::detached(),
            profile: BrowserConfig::default(),
            proxy: None,
            released: AtomicBool::new(false),
        }
    }

    pub fn primary_page(&self) -> Page {
        self.primary.clone()
    }

    pub fn proxy_server(&self) -> Option<&str> {
        self.proxy.as_ref().map(|p| p.server.as_str())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Opens a fresh page scoped to this session, with the same timeout,
    /// user agent and stealth setup as the primary page. Fails once the
    /// session has been released. Detached sessions hand out detached pages.
    pub fn open_page(&self) -> Result<Page> {
        if self.is_released() {
            return Err(AppError::Browser("session already released".to_string()));
        }

        let guard = self
            .browser
            .lock()
            .map_err(|_| AppError::Fatal("session browser lock poisoned".to_string()))?;
        let browser = match guard.as_ref() {
            Some(browser) => browser,
            None => return Ok(Page::detached()),
        };

        let tab = browser.new_tab().map_err(AppError::browser)?;
        prepare_tab(&tab, &self.profile, self.proxy.as_ref())?;
        Ok(Page::live(tab))
    }

    /// Tears the browser down. Idempotent; the first call wins, later calls
    /// are no-ops. Dropping the Browser ends the Chrome process, so nothing
    /// native survives this even when the acquire path only got partway.
    pub fn teardown(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!("Session already released, skipping teardown");
            return;
        }

        self.primary.close();
        match self.browser.lock() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!("Browser handed back for teardown");
                }
            }
            Err(_) => warn!("Session browser lock poisoned during teardown"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Backstop for paths that never reached an explicit release.
        self.teardown();
    }
}

/// Acquire/release seam between the orchestrator and the browser
/// infrastructure, kept narrow so the account lifecycle can be tested
/// against a stub provider.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Session>;
    async fn release(&self, session: &Session);
}

/// Owns browser lifecycle, proxy assignment and fingerprint setup.
pub struct ResourceManager {
    browser_config: BrowserConfig,
    proxies: ProxyPool,
}

impl ResourceManager {
    pub fn new(browser_config: BrowserConfig, proxy_config: &ProxyConfig) -> Result<Self> {
        let proxies = match (&proxy_config.enabled, &proxy_config.file) {
            (true, Some(path)) => {
                let pool = ProxyPool::load(path)?;
                info!(count = pool.len(), "Loaded proxy pool");
                pool
            }
            (true, None) => {
                warn!("Proxy use enabled but no proxy file configured, continuing without");
                ProxyPool::default()
            }
            _ => ProxyPool::default(),
        };

        Ok(Self {
            browser_config,
            proxies,
        })
    }

    fn launch_browser(&self, proxy_server: Option<&str>) -> Result<Browser> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.browser_config.headless)
            .sandbox(false)
            .args(vec![
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--disable-web-security"),
                std::ffi::OsStr::new("--disable-site-isolation-trials"),
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-background-timer-throttling"),
            ])
            .build()
            .map_err(|e| AppError::Resource(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.browser_config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }
        launch_options.proxy_server = proxy_server;

        Browser::new(launch_options)
            .map_err(|e| AppError::Resource(format!("Failed to launch browser: {}", e)))
    }
}

#[async_trait]
impl SessionProvider for ResourceManager {
    /// Launches a browser with a randomly assigned proxy and a prepared
    /// primary page. Chrome startup occasionally flakes under load, so the
    /// launch itself is retried on a fixed interval.
    async fn acquire(&self) -> Result<Session> {
        let proxy = self.proxies.pick().cloned();
        if let Some(proxy) = &proxy {
            debug!(proxy = %proxy.server, authenticated = proxy.username.is_some(), "Assigned proxy for session");
        }
        let proxy_server = proxy.as_ref().map(|p| p.server.clone());

        let retry_strategy = FixedInterval::from_millis(self.browser_config.launch_retry_delay_ms)
            .take(self.browser_config.launch_retry_attempts);
        let browser = Retry::spawn(retry_strategy, || async {
            self.launch_browser(proxy_server.as_deref())
        })
        .await?;

        let tab = browser.new_tab().map_err(AppError::browser)?;
        prepare_tab(&tab, &self.browser_config, proxy.as_ref())?;

        info!("Browser session acquired");
        Ok(Session {
            browser: Mutex::new(Some(browser)),
            primary: Page::live(tab),
            profile: self.browser_config.clone(),
            proxy,
            released: AtomicBool::new(false),
        })
    }

    /// Idempotent and safe to call even when acquire partially failed.
    async fn release(&self, session: &Session) {
        session.teardown();
        info!("Browser session released");
    }
}

/// Timeout, proxy credentials, regional fingerprint (user agent, language
/// header, locale, timezone, geolocation) and automation-signal masking for a
/// newly opened tab.
fn prepare_tab(tab: &Arc<Tab>, profile: &BrowserConfig, proxy: Option<&Proxy>) -> Result<()> {
    tab.set_default_timeout(Duration::from_secs(profile.navigation_timeout_secs));

    // Chrome's --proxy-server flag carries no credentials; authenticated
    // proxies answer their challenge through the CDP auth handler per tab.
    if let Some(proxy) = proxy {
        if proxy.username.is_some() {
            tab.authenticate(proxy.username.clone(), proxy.password.clone())
                .map_err(AppError::browser)?;
        }
    }

    if !profile.user_agent.is_empty() {
        tab.set_user_agent(&profile.user_agent, Some(&profile.accept_language), None)
            .map_err(AppError::browser)?;
    }

    tab.call_method(Emulation::SetLocaleOverride {
        locale: Some(profile.locale.clone()),
    })
    .map_err(AppError::browser)?;
    tab.call_method(Emulation::SetTimezoneOverride {
        timezone_id: profile.timezone.clone(),
    })
    .map_err(AppError::browser)?;
    tab.call_method(Emulation::SetGeolocationOverride {
        latitude: Some(profile.latitude),
        longitude: Some(profile.longitude),
        accuracy: Some(GEO_ACCURACY_METERS),
        altitude: None,
        altitude_accuracy: None,
        heading: None,
        speed: None,
    })
    .map_err(AppError::browser)?;

    tab.evaluate(STEALTH_SCRIPT, false)
        .map_err(AppError::browser)?;
    Ok(())
}
