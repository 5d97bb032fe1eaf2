use crate::WidgetLoaderResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_cleanup_interval_ms() -> u64 {
    500
}

fn default_widget_release_delay_ms() -> u64 {
    500
}

fn default_worker_thread_count() -> usize {
    2
}

fn default_reclaimed_request_capacity() -> u32 {
    1024
}

/// On-disk form of `WidgetLoaderConfig`. Every field is optional in the file.
#[derive(Serialize, Deserialize, Debug)]
pub struct WidgetLoaderConfigJson {
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    #[serde(default = "default_widget_release_delay_ms")]
    pub widget_release_delay_ms: u64,
    #[serde(default = "default_worker_thread_count")]
    pub worker_thread_count: usize,
    #[serde(default)]
    pub default_max_pool_size: Option<usize>,
    #[serde(default = "default_reclaimed_request_capacity")]
    pub reclaimed_request_capacity: u32,
}

impl Default for WidgetLoaderConfigJson {
    fn default() -> Self {
        WidgetLoaderConfigJson {
            cleanup_interval_ms: default_cleanup_interval_ms(),
            widget_release_delay_ms: default_widget_release_delay_ms(),
            worker_thread_count: default_worker_thread_count(),
            default_max_pool_size: None,
            reclaimed_request_capacity: default_reclaimed_request_capacity(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetLoaderConfig {
    // How often update() runs the cleanup sweep over pending requests and delayed releases
    pub cleanup_interval: Duration,

    // How long a non-immediate release waits before the widget goes back into its pool
    pub widget_release_delay: Duration,

    // Only used by ThreadedClassLoader
    pub worker_thread_count: usize,

    // Applied to every pool when it is created, None means pools grow without limit
    pub default_max_pool_size: Option<usize>,

    // How many cancelled/reaped request ids are remembered so their status reads NotStarted
    pub reclaimed_request_capacity: u32,
}

impl Default for WidgetLoaderConfig {
    fn default() -> Self {
        WidgetLoaderConfigJson::default().into()
    }
}

impl From<WidgetLoaderConfigJson> for WidgetLoaderConfig {
    fn from(json: WidgetLoaderConfigJson) -> Self {
        WidgetLoaderConfig {
            cleanup_interval: Duration::from_millis(json.cleanup_interval_ms),
            widget_release_delay: Duration::from_millis(json.widget_release_delay_ms),
            worker_thread_count: json.worker_thread_count.max(1),
            default_max_pool_size: json.default_max_pool_size,
            // LruCache needs room for at least three entries
            reclaimed_request_capacity: json.reclaimed_request_capacity.max(3),
        }
    }
}

impl WidgetLoaderConfig {
    pub fn from_json_str(json: &str) -> WidgetLoaderResult<Self> {
        let config: WidgetLoaderConfigJson = serde_json::from_str(json)?;
        Ok(config.into())
    }

    pub fn read_from_path(path: &Path) -> WidgetLoaderResult<Self> {
        log::info!("Reading widget loader config from {:?}", path);
        let file_contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&file_contents)
    }

    pub fn to_json(&self) -> WidgetLoaderConfigJson {
        WidgetLoaderConfigJson {
            cleanup_interval_ms: self.cleanup_interval.as_millis() as u64,
            widget_release_delay_ms: self.widget_release_delay.as_millis() as u64,
            worker_thread_count: self.worker_thread_count,
            default_max_pool_size: self.default_max_pool_size,
            reclaimed_request_capacity: self.reclaimed_request_capacity,
        }
    }
}
