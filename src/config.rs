//! Configuration for the exchange-rate exporter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::export::BusinessWindow;
use crate::retry::RetryConfig;

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_root() -> String {
    "/mnt/synonas/exchange".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Blind waits, in milliseconds. The target pages give no completion
/// signal, so each step waits a fixed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// After the first navigation
    #[serde(default = "default_page_load_wait_ms")]
    pub page_load_wait_ms: u64,
    /// After selecting a round, before checking content
    #[serde(default = "default_post_selection_wait_ms")]
    pub post_selection_wait_ms: u64,
    /// Between two rounds of the same bank
    #[serde(default = "default_inter_round_wait_ms")]
    pub inter_round_wait_ms: u64,
    /// After a reload + re-selection in the retry loop
    #[serde(default = "default_refresh_wait_ms")]
    pub refresh_wait_ms: u64,
    /// After injecting styles or content, before printing
    #[serde(default = "default_render_settle_wait_ms")]
    pub render_settle_wait_ms: u64,
    /// For native downloads to land on disk
    #[serde(default = "default_download_wait_ms")]
    pub download_wait_ms: u64,
}

fn default_page_load_wait_ms() -> u64 {
    10_000
}

fn default_post_selection_wait_ms() -> u64 {
    10_000
}

fn default_inter_round_wait_ms() -> u64 {
    5_000
}

fn default_refresh_wait_ms() -> u64 {
    15_000
}

fn default_render_settle_wait_ms() -> u64 {
    2_000
}

fn default_download_wait_ms() -> u64 {
    15_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_wait_ms: default_page_load_wait_ms(),
            post_selection_wait_ms: default_post_selection_wait_ms(),
            inter_round_wait_ms: default_inter_round_wait_ms(),
            refresh_wait_ms: default_refresh_wait_ms(),
            render_settle_wait_ms: default_render_settle_wait_ms(),
            download_wait_ms: default_download_wait_ms(),
        }
    }
}

impl TimingConfig {
    /// All waits zero, for tests
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            page_load_wait_ms: 0,
            post_selection_wait_ms: 0,
            inter_round_wait_ms: 0,
            refresh_wait_ms: 0,
            render_settle_wait_ms: 0,
            download_wait_ms: 0,
        }
    }

    pub fn page_load_wait(&self) -> Duration {
        Duration::from_millis(self.page_load_wait_ms)
    }

    pub fn post_selection_wait(&self) -> Duration {
        Duration::from_millis(self.post_selection_wait_ms)
    }

    pub fn inter_round_wait(&self) -> Duration {
        Duration::from_millis(self.inter_round_wait_ms)
    }

    pub fn refresh_wait(&self) -> Duration {
        Duration::from_millis(self.refresh_wait_ms)
    }

    pub fn render_settle_wait(&self) -> Duration {
        Duration::from_millis(self.render_settle_wait_ms)
    }

    pub fn download_wait(&self) -> Duration {
        Duration::from_millis(self.download_wait_ms)
    }
}

/// Retry limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Whole-round attempts (select + load + checks)
    #[serde(default = "default_max_round_attempts")]
    pub max_round_attempts: u32,
    /// Content checks per whole-round attempt
    #[serde(default = "default_max_data_checks")]
    pub max_data_checks: u32,
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,
    #[serde(default = "default_navigation_initial_delay_ms")]
    pub navigation_initial_delay_ms: u64,
    #[serde(default = "default_navigation_max_delay_ms")]
    pub navigation_max_delay_ms: u64,
}

fn default_max_round_attempts() -> u32 {
    5
}

fn default_max_data_checks() -> u32 {
    3
}

fn default_navigation_retries() -> u32 {
    2
}

fn default_navigation_initial_delay_ms() -> u64 {
    1_000
}

fn default_navigation_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_round_attempts: default_max_round_attempts(),
            max_data_checks: default_max_data_checks(),
            navigation_retries: default_navigation_retries(),
            navigation_initial_delay_ms: default_navigation_initial_delay_ms(),
            navigation_max_delay_ms: default_navigation_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    /// Backoff used around page navigation
    pub fn navigation(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.navigation_retries,
            initial_delay: Duration::from_millis(self.navigation_initial_delay_ms),
            max_delay: Duration::from_millis(self.navigation_max_delay_ms),
            multiplier: 2.0,
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Chrome executable; platform default when unset
    #[serde(default)]
    pub chrome_executable: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agent: default_user_agent(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub window: BusinessWindow,
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl AppConfig {
    /// Load configuration from defaults, an optional `fx-export` config file
    /// and `FXEXPORT__*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("fx-export").required(false))
            // Override with environment variables (FXEXPORT__OUTPUT__ROOT, etc.)
            .add_source(
                config::Environment::with_prefix("FXEXPORT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Defaults with zero waits, rooted at `root`
    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            output: OutputConfig {
                root: root.to_string_lossy().into_owned(),
            },
            timing: TimingConfig::instant(),
            ..Default::default()
        }
    }
}
