use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    ticks: u64,
    paints: u64,
    font_changes: u64,
    events_pushed: u64,
    events_discarded: u64,
    blocks_painted: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn record_paint(&mut self, visible_blocks: usize) {
        self.paints = self.paints.saturating_add(1);
        self.blocks_painted = self.blocks_painted.saturating_add(visible_blocks as u64);
    }

    pub fn record_font_change(&mut self) {
        self.font_changes = self.font_changes.saturating_add(1);
    }

    pub fn record_pointer(&mut self, queued: bool) {
        if queued {
            self.events_pushed = self.events_pushed.saturating_add(1);
        } else {
            self.events_discarded = self.events_discarded.saturating_add(1);
        }
    }

    pub fn paints(&self) -> u64 {
        self.paints
    }

    pub fn font_changes(&self) -> u64 {
        self.font_changes
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            ticks: self.ticks,
            paints: self.paints,
            font_changes: self.font_changes,
            events_pushed: self.events_pushed,
            events_discarded: self.events_discarded,
            blocks_painted: self.blocks_painted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub ticks: u64,
    pub paints: u64,
    pub font_changes: u64,
    pub events_pushed: u64,
    pub events_discarded: u64,
    pub blocks_painted: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "engine_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("ticks".to_string(), json!(self.ticks));
        map.insert("paints".to_string(), json!(self.paints));
        map.insert("font_changes".to_string(), json!(self.font_changes));
        map.insert("events_pushed".to_string(), json!(self.events_pushed));
        map.insert("events_discarded".to_string(), json!(self.events_discarded));
        map.insert("blocks_painted".to_string(), json!(self.blocks_painted));
        map
    }
}
