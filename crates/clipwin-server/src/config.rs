#![forbid(unsafe_code)]

//! Server and ingestion configuration.

use std::env;
use std::time::Duration;

use clipwin_core::geometry::Rect;
use tracing::warn;

/// One fiftieth of a second, the retry and sampling tick.
pub const TICK: Duration = Duration::from_millis(20);

/// Configuration for the window server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Screen extent. Window regions are clipped to it.
    pub screen: Rect,
    /// Window registry capacity.
    pub max_windows: usize,
    /// Bound of the server's inbound queue.
    pub inbound_capacity: usize,
    /// Sleep between attempts to forward into a full client mailbox.
    pub forward_retry_interval: Duration,
    /// Attempts before a forward is dropped.
    pub forward_retry_limit: u32,
    /// Sleep between attempts to post into a full server queue.
    pub post_retry_interval: Duration,
    /// Attempts before a post fails with `Busy`.
    pub post_retry_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            screen: Rect::from_size(800, 480),
            max_windows: 32,
            inbound_capacity: 256,
            forward_retry_interval: TICK,
            forward_retry_limit: 50,
            post_retry_interval: TICK,
            post_retry_limit: 50,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `CLIPWIN_SCREEN_WIDTH`, `CLIPWIN_SCREEN_HEIGHT`,
    /// `CLIPWIN_MAX_WINDOWS` and `CLIPWIN_INBOUND_CAPACITY`. Unparsable values
    /// are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(width) = env_number::<u16>("CLIPWIN_SCREEN_WIDTH") {
            config.screen.x2 = config.screen.x1 + i32::from(width);
        }
        if let Some(height) = env_number::<u16>("CLIPWIN_SCREEN_HEIGHT") {
            config.screen.y2 = config.screen.y1 + i32::from(height);
        }
        if let Some(max) = env_number::<usize>("CLIPWIN_MAX_WINDOWS") {
            config.max_windows = max;
        }
        if let Some(capacity) = env_number::<usize>("CLIPWIN_INBOUND_CAPACITY") {
            config.inbound_capacity = capacity.max(1);
        }
        config
    }

    #[must_use]
    pub fn with_screen(mut self, screen: Rect) -> Self {
        self.screen = screen;
        self
    }

    #[must_use]
    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.max_windows = max_windows;
        self
    }

    #[must_use]
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_forward_retry(mut self, interval: Duration, limit: u32) -> Self {
        self.forward_retry_interval = interval;
        self.forward_retry_limit = limit;
        self
    }

    #[must_use]
    pub fn with_post_retry(mut self, interval: Duration, limit: u32) -> Self {
        self.post_retry_interval = interval;
        self.post_retry_limit = limit;
        self
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

/// Configuration for an input ingestion worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Sleep after each drained sample (soft rate cap).
    pub sample_interval: Duration,
    /// How long a wait on the interrupt semaphore lasts before the worker
    /// checks for a stop request.
    pub wait_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_interval: TICK,
            wait_timeout: Duration::from_millis(10),
        }
    }
}

impl IngestConfig {
    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}
