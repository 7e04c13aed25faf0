use std::sync::OnceLock;

use parking_lot::Mutex;

/// Default rolling window for stage metrics (samples).
pub const DEFAULT_METRICS_WINDOW: usize = 120;
/// Default name of the pipeline worker thread.
pub const DEFAULT_THREAD_NAME: &str = "essence-worker";
/// Default number of idle scratch buffers a processor pool retains.
pub const DEFAULT_POOL_MAX_FREE: usize = 2;
/// Environment variable overriding the metrics window at first use.
pub const METRICS_WINDOW_ENV: &str = "ESSENCE_METRICS_WINDOW";

/// Process-wide pipeline tunables.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let current = pipeline_tunables();
/// assert!(current.metrics_window >= 1);
/// let tuned = PipelineTunables {
///     metrics_window: 30,
///     ..current
/// };
/// assert_eq!(tuned.metrics_window, 30);
/// // set_pipeline_tunables(tuned) would install it for later sessions.
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineTunables {
    pub metrics_window: usize,
    pub thread_name: String,
    pub pool_max_free: usize,
}

impl Default for PipelineTunables {
    fn default() -> Self {
        Self {
            metrics_window: DEFAULT_METRICS_WINDOW,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            pool_max_free: DEFAULT_POOL_MAX_FREE,
        }
    }
}

impl PipelineTunables {
    fn from_env() -> Self {
        let mut tunables = Self::default();
        if let Some(window) = std::env::var(METRICS_WINDOW_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            tunables.metrics_window = window;
        }
        tunables.sanitized()
    }

    fn sanitized(self) -> Self {
        let thread_name = if self.thread_name.trim().is_empty() {
            DEFAULT_THREAD_NAME.to_string()
        } else {
            self.thread_name
        };
        Self {
            metrics_window: self.metrics_window.max(1),
            thread_name,
            pool_max_free: self.pool_max_free,
        }
    }
}

static PIPELINE_TUNABLES: OnceLock<Mutex<PipelineTunables>> = OnceLock::new();

fn tunables_lock() -> &'static Mutex<PipelineTunables> {
    PIPELINE_TUNABLES.get_or_init(|| Mutex::new(PipelineTunables::from_env()))
}

/// Override pipeline tunables process-wide; affects sessions created afterwards.
pub fn set_pipeline_tunables(tunables: PipelineTunables) {
    *tunables_lock().lock() = tunables.sanitized();
}

/// Snapshot of the current tunables.
pub fn pipeline_tunables() -> PipelineTunables {
    tunables_lock().lock().clone()
}

pub(crate) fn metrics_window() -> usize {
    tunables_lock().lock().metrics_window
}

pub(crate) fn pool_max_free() -> usize {
    tunables_lock().lock().pool_max_free
}

/// Builder for process-wide essence tunables.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let config = EssenceConfig::new()
///     .metrics_window(60)
///     .thread_name("playout")
///     .pool_max_free(4);
/// assert_eq!(config.tunables().thread_name, "playout");
/// assert_eq!(config.tunables().metrics_window, 60);
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EssenceConfig {
    pipeline: PipelineTunables,
}

impl EssenceConfig {
    /// Start from the current process-wide values.
    pub fn new() -> Self {
        Self {
            pipeline: pipeline_tunables(),
        }
    }

    /// Override the rolling metrics window.
    pub fn metrics_window(mut self, window: usize) -> Self {
        self.pipeline.metrics_window = window;
        self
    }

    /// Override the worker thread name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline.thread_name = name.into();
        self
    }

    /// Override how many idle scratch buffers each pool keeps.
    pub fn pool_max_free(mut self, max_free: usize) -> Self {
        self.pipeline.pool_max_free = max_free;
        self
    }

    /// Values [`apply`](Self::apply) would install.
    pub fn tunables(&self) -> &PipelineTunables {
        &self.pipeline
    }

    /// Apply the configuration to global tunables.
    pub fn apply(self) {
        set_pipeline_tunables(self.pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_restores_minimums() {
        let t = PipelineTunables {
            metrics_window: 0,
            thread_name: "  ".into(),
            pool_max_free: 0,
        }
        .sanitized();
        assert_eq!(t.metrics_window, 1);
        assert_eq!(t.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn config_starts_from_current_values() {
        let current = pipeline_tunables();
        let config = EssenceConfig::new().pool_max_free(7);
        assert_eq!(config.tunables().metrics_window, current.metrics_window);
        assert_eq!(config.tunables().pool_max_free, 7);
    }
}
