/// Configuration for the live-update server
///
/// Every field is optional with a default. Values are layered:
/// defaults, then an optional JSON file (`zephra.hmr.json` in the working
/// directory, or the path in `ZEPHRA_HMR_CONFIG`), then `ZEPHRA_HMR_*`
/// environment overrides, then CLI flags.
use crate::error::{HmrError, HmrResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "zephra.hmr.json";

/// Live-update server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HmrConfig {
    /// Listen port for the websocket and asset endpoints
    pub port: u16,
    /// Listen address
    pub host: IpAddr,
    /// Websocket endpoint path
    pub ws_path: String,
    /// Root directory to watch
    pub watch_dir: PathBuf,
    /// Path serving the client reconciler script
    pub client_path: String,
    /// Path serving the JSON statistics
    pub stats_path: String,
    /// Substring/prefix patterns excluded from watching
    pub exclude_patterns: Vec<String>,
    /// Per-path debounce window in milliseconds
    pub debounce_ms: u64,
    /// Whether component files may be updated in place at all
    pub fast_refresh: bool,
    /// Whether class components count as fast-refresh eligible
    pub class_components_fast_refresh: bool,
}

impl Default for HmrConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ws_path: "/hmr".to_string(),
            watch_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            client_path: "/hmr-client.js".to_string(),
            stats_path: "/hmr/stats".to_string(),
            exclude_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
                ".zephra".to_string(),
                "target".to_string(),
            ],
            debounce_ms: 100,
            fast_refresh: true,
            class_components_fast_refresh: true,
        }
    }
}

impl HmrConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> HmrResult<Self> {
        if !path.exists() {
            log::debug!("[hmr:config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: HmrConfig = serde_json::from_str(&content).map_err(|e| {
            HmrError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Resolve the config file path.
    ///
    /// Respects `ZEPHRA_HMR_CONFIG`, falling back to `./zephra.hmr.json`.
    pub fn default_path() -> PathBuf {
        match std::env::var("ZEPHRA_HMR_CONFIG") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    /// Apply `ZEPHRA_HMR_PORT`, `ZEPHRA_HMR_WATCH_DIR` and
    /// `ZEPHRA_HMR_DEBOUNCE_MS` overrides.
    pub fn with_env_overrides(mut self) -> HmrResult<Self> {
        if let Ok(port) = std::env::var("ZEPHRA_HMR_PORT") {
            self.port = port
                .parse()
                .map_err(|_| HmrError::Config(format!("ZEPHRA_HMR_PORT is not a port: {}", port)))?;
        }
        if let Ok(dir) = std::env::var("ZEPHRA_HMR_WATCH_DIR") {
            if !dir.is_empty() {
                self.watch_dir = PathBuf::from(dir);
            }
        }
        if let Ok(ms) = std::env::var("ZEPHRA_HMR_DEBOUNCE_MS") {
            self.debounce_ms = ms.parse().map_err(|_| {
                HmrError::Config(format!("ZEPHRA_HMR_DEBOUNCE_MS is not a number: {}", ms))
            })?;
        }
        Ok(self)
    }

    /// Check endpoint paths and the debounce window.
    pub fn validate(&self) -> HmrResult<()> {
        let paths = [
            ("wsPath", &self.ws_path),
            ("clientPath", &self.client_path),
            ("statsPath", &self.stats_path),
        ];

        for (name, path) in &paths {
            if !path.starts_with('/') || path.len() < 2 {
                return Err(HmrError::Config(format!(
                    "{} must start with '/' and name a route, got '{}'",
                    name, path
                )));
            }
        }

        for (i, (name_a, a)) in paths.iter().enumerate() {
            for (name_b, b) in paths.iter().skip(i + 1) {
                if a == b {
                    return Err(HmrError::Config(format!(
                        "{} and {} must differ (both '{}')",
                        name_a, name_b, a
                    )));
                }
            }
        }

        if self.debounce_ms == 0 {
            return Err(HmrError::Config(
                "debounceMs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Public websocket URL, e.g. `ws://localhost:3001/hmr`.
    pub fn ws_url(&self) -> String {
        format!("ws://localhost:{}{}", self.port, self.ws_path)
    }

    /// Public client script URL, e.g. `http://localhost:3001/hmr-client.js`.
    pub fn client_url(&self) -> String {
        format!("http://localhost:{}{}", self.port, self.client_path)
    }
}
