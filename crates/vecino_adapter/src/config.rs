#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;
use vecino_engines::directory::{DEFAULT_DIRECTORY_PAGE_SIZE, MAX_DIRECTORY_PAGE_SIZE};
use vecino_kernel_contracts::loyalty::DEFAULT_TIER_BAND_WIDTH;

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_STORE_PATH: &str = ".vecino/adapter_store.jsonl";
const MAX_TIER_BAND_WIDTH: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub tier_band_width: u64,
    pub store_path: PathBuf,
    pub journal_enabled: bool,
    pub directory_page_size: usize,
    /// Unset disables the operator routes.
    pub operator_token: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tier_band_width: DEFAULT_TIER_BAND_WIDTH,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            journal_enabled: true,
            directory_page_size: DEFAULT_DIRECTORY_PAGE_SIZE,
            operator_token: None,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl AdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads every setting through `lookup`. Invalid values fall back to the
    /// default with a warning.
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = match get("VECINO_HTTP_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(
                    value = %raw,
                    default = DEFAULT_HTTP_BIND,
                    "invalid VECINO_HTTP_BIND, using default"
                );
                defaults.bind
            }),
            None => defaults.bind,
        };

        let tier_band_width = match get("VECINO_TIER_BAND_WIDTH") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|v| (1..=MAX_TIER_BAND_WIDTH).contains(v))
                .unwrap_or_else(|| {
                    warn!(
                        value = %raw,
                        default = defaults.tier_band_width,
                        "invalid VECINO_TIER_BAND_WIDTH, using default"
                    );
                    defaults.tier_band_width
                }),
            None => defaults.tier_band_width,
        };

        let store_path = get("VECINO_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let journal_enabled = match get("VECINO_JOURNAL_ENABLED") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    warn!(value = %raw, "invalid VECINO_JOURNAL_ENABLED, keeping the journal on");
                    true
                }
            },
            None => defaults.journal_enabled,
        };

        let directory_page_size = match get("VECINO_DIRECTORY_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|v| (1..=MAX_DIRECTORY_PAGE_SIZE).contains(v))
                .unwrap_or_else(|| {
                    warn!(
                        value = %raw,
                        default = defaults.directory_page_size,
                        "invalid VECINO_DIRECTORY_PAGE_SIZE, using default"
                    );
                    defaults.directory_page_size
                }),
            None => defaults.directory_page_size,
        };

        Self {
            bind,
            tier_band_width,
            store_path,
            journal_enabled,
            directory_page_size,
            operator_token: get("VECINO_OPERATOR_TOKEN"),
        }
    }
}
