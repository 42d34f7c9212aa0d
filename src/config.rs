//! Engine and dispatcher configuration.
//!
//! Defaults mirror the stock bar: a 1 ms tick, Arial at -14 and a surface
//! covering the right half of the host container. Environment variables and
//! JSON documents overlay the defaults field by field.

use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use crate::command::FontSpec;
use crate::error::{BarError, Result};
use crate::logging::{FileSink, LogLevel, Logger, StderrSink};
use crate::metrics::EngineMetrics;

const DEFAULT_LOG_BYTES: u64 = 1024 * 1024;

/// How many queued block events the dispatcher hands out per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// At most one event per dispatcher tick across all blocks.
    #[default]
    OnePerTick,
    /// Every queued event is dispatched on each tick.
    All,
}

#[derive(Clone, Debug)]
pub struct BarConfig {
    /// Upper bound on the UI thread's wait between ticks.
    pub tick_interval: Duration,
    /// Font created when the surface opens.
    pub default_font: FontSpec,
    /// Fraction of the container width the surface occupies, right-anchored.
    pub width_fraction: f32,
    /// How long `RenderEngine::start` waits for the UI thread's startup report.
    pub startup_timeout: Duration,
    /// How long shutdown waits for the UI thread to exit.
    pub shutdown_timeout: Duration,
    pub event_drain: DrainPolicy,
    /// Interval between dispatcher ticks.
    pub dispatch_interval: Duration,
    pub logger: Option<Logger>,
    pub metrics: Option<Arc<Mutex<EngineMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    pub metrics_target: String,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1),
            default_font: FontSpec::default(),
            width_fraction: 0.5,
            startup_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            event_drain: DrainPolicy::OnePerTick,
            dispatch_interval: Duration::from_millis(10),
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(30),
            metrics_target: "winbar::engine.metrics".to_string(),
        }
    }
}

/// Optional overrides accepted from JSON documents and the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub tick_ms: Option<u64>,
    pub font: Option<String>,
    pub font_size: Option<i32>,
    pub width_fraction: Option<f32>,
    pub startup_ms: Option<u64>,
    pub shutdown_ms: Option<u64>,
    pub dispatch_ms: Option<u64>,
    pub event_drain: Option<DrainPolicy>,
    pub metrics_ms: Option<u64>,
    pub log_file: Option<String>,
    pub log_level: Option<String>,
}

impl BarConfig {
    /// Defaults overlaid with `WINBAR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply(ConfigOverrides::from_env()?)?;
        Ok(config)
    }

    /// Overlay a JSON document such as `{"tick_ms": 5, "font": "Consolas"}`.
    pub fn apply_json(&mut self, json: &str) -> Result<()> {
        let overrides: ConfigOverrides = serde_json::from_str(json)?;
        self.apply(overrides)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(ms) = overrides.tick_ms {
            self.tick_interval = Duration::from_millis(ms);
        }
        if let Some(name) = overrides.font {
            if name.trim().is_empty() {
                return Err(BarError::Config("font name is empty".to_string()));
            }
            self.default_font.name = name;
        }
        if let Some(size) = overrides.font_size {
            self.default_font.size = size;
        }
        if let Some(fraction) = overrides.width_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(BarError::Config(format!(
                    "width_fraction must be in (0, 1], got {fraction}"
                )));
            }
            self.width_fraction = fraction;
        }
        if let Some(ms) = overrides.startup_ms {
            self.startup_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.shutdown_ms {
            self.shutdown_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.dispatch_ms {
            self.dispatch_interval = Duration::from_millis(ms);
        }
        if let Some(policy) = overrides.event_drain {
            self.event_drain = policy;
        }
        if let Some(ms) = overrides.metrics_ms {
            self.metrics_interval = Duration::from_millis(ms);
        }
        let level = match overrides.log_level.as_deref() {
            Some(raw) => Some(parse_level(raw)?),
            None => None,
        };
        if let Some(path) = overrides.log_file {
            let sink = FileSink::new(&path, DEFAULT_LOG_BYTES)
                .map_err(|err| BarError::Config(format!("log file `{path}`: {err}")))?;
            self.logger = Some(Logger::new(sink));
        }
        if let (Some(level), Some(logger)) = (level, self.logger.take()) {
            self.logger = Some(logger.with_min_level(level));
        }
        Ok(())
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(EngineMetrics::new())));
        }
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<EngineMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Log to stderr at `level` and above unless a logger is already set.
    pub fn or_stderr_logger(mut self, level: LogLevel) -> Self {
        if self.logger.is_none() {
            self.logger = Some(Logger::new(StderrSink).with_min_level(level));
        }
        self
    }
}

impl ConfigOverrides {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tick_ms: env_parse("WINBAR_TICK_MS")?,
            font: env_string_opt("WINBAR_FONT"),
            font_size: env_parse("WINBAR_FONT_SIZE")?,
            width_fraction: env_parse("WINBAR_WIDTH_FRACTION")?,
            startup_ms: env_parse("WINBAR_STARTUP_MS")?,
            shutdown_ms: env_parse("WINBAR_SHUTDOWN_MS")?,
            dispatch_ms: env_parse("WINBAR_DISPATCH_MS")?,
            event_drain: env_flag("WINBAR_DRAIN_ALL").then_some(DrainPolicy::All),
            metrics_ms: env_parse("WINBAR_METRICS_MS")?,
            log_file: env_string_opt("WINBAR_LOG"),
            log_level: env_string_opt("WINBAR_LOG_LEVEL"),
        })
    }
}

fn parse_level(raw: &str) -> Result<LogLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" | "warning" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(BarError::Config(format!("unknown log level `{other}`"))),
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| BarError::Config(format!("{key}={raw}: {err}"))),
        None => Ok(None),
    }
}
