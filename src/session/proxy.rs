use rand::seq::SliceRandom;
use std::fs;
use std::path::Path;

use crate::utils::error::Result;

/// One upstream proxy entry from proxies.txt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Proxy pool loaded once at startup. Selection is uniform random per
/// session acquisition, matching the one-proxy-per-browser-launch model.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<Proxy>,
}

impl ProxyPool {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(Self::from_lines(&data))
    }

    pub fn from_lines(data: &str) -> Self {
        let proxies = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_proxy)
            .collect();
        Self { proxies }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Uniformly random pick, or None when no proxies are configured.
    pub fn pick(&self) -> Option<&Proxy> {
        self.proxies.choose(&mut rand::thread_rng())
    }
}

/// Accepts `host:port` and `host:port:user:pass`; anything else is dropped.
fn parse_proxy(line: &str) -> Option<Proxy> {
    let parts: Vec<&str> = line.split(':').collect();
    match parts.len() {
        2 => Some(Proxy {
            server: format!("http://{}:{}", parts[0], parts[1]),
            username: None,
            password: None,
        }),
        4 => Some(Proxy {
            server: format!("http://{}:{}", parts[0], parts[1]),
            username: Some(parts[2].to_string()),
            password: Some(parts[3].to_string()),
        }),
        _ => None,
    }
}
