use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::block::BlockEvent;
use crate::command::CommandQueue;
use crate::config::BarConfig;
use crate::error::Result;
use crate::geometry::Size;
use crate::layout::layout_right_to_left;
use crate::logging::{LogLevel, emit, json_kv};
use crate::metrics::EngineMetrics;
use crate::store::{BlockStore, PointerOutcome};
use crate::surface::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};

use super::ENGINE_TARGET;
use super::core::EngineStatus;

/// Everything the UI thread owns. Moved onto the thread at spawn time; the
/// surface it opens never leaves it.
pub(super) struct UiLoop {
    config: BarConfig,
    store: Arc<BlockStore>,
    commands: Arc<CommandQueue>,
    status: Arc<EngineStatus>,
    size: Size,
    start_instant: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl UiLoop {
    pub(super) fn new(
        config: BarConfig,
        store: Arc<BlockStore>,
        commands: Arc<CommandQueue>,
        status: Arc<EngineStatus>,
    ) -> Self {
        Self {
            config,
            store,
            commands,
            status,
            size: Size::default(),
            start_instant: None,
            last_metrics_emit: None,
        }
    }

    pub(super) fn run(mut self, factory: Box<dyn SurfaceFactory>, ready: Sender<Result<Size>>) {
        let options = SurfaceOptions {
            font: self.config.default_font.clone(),
            width_fraction: self.config.width_fraction,
        };
        self.log(
            LogLevel::Info,
            "engine_starting",
            [
                json_kv("font", json!(options.font.name)),
                json_kv("font_size", json!(options.font.size)),
            ],
        );

        let mut surface = match factory.open(&options) {
            Ok(surface) => surface,
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "startup_failed",
                    [json_kv("error", json!(err.to_string()))],
                );
                let _ = ready.send(Err(err));
                return;
            }
        };

        self.size = surface.size();
        self.status.set_size(self.size);
        self.status.set_running(true);
        let now = Instant::now();
        self.start_instant = Some(now);
        self.last_metrics_emit = Some(now);
        self.log(
            LogLevel::Info,
            "surface_created",
            [
                json_kv("width", json!(self.size.width)),
                json_kv("height", json!(self.size.height)),
            ],
        );
        if ready.send(Ok(self.size)).is_err() {
            surface.release();
            self.status.set_running(false);
            return;
        }

        self.paint(surface.as_mut());

        while !self.commands.stop_requested() {
            if !self.tick(surface.as_mut()) {
                break;
            }
            self.commands.wait_timeout(self.config.tick_interval);
        }

        self.log(LogLevel::Info, "engine_stopping", std::iter::empty());
        surface.release();
        self.status.set_running(false);
        let uptime_ms = self
            .start_instant
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.log(
            LogLevel::Info,
            "engine_stopped",
            [json_kv("uptime_ms", json!(uptime_ms))],
        );
    }

    /// One loop iteration. Returns `false` once the surface has closed.
    fn tick(&mut self, surface: &mut dyn Surface) -> bool {
        let mut needs_paint = false;
        let mut open = true;

        let events = match surface.pump() {
            Ok(events) => events,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "pump_failed",
                    [json_kv("error", json!(err.to_string()))],
                );
                Vec::new()
            }
        };

        for event in events {
            match event {
                SurfaceEvent::PointerDown { x } => self.route_pointer(x, BlockEvent::MouseDown),
                SurfaceEvent::PointerUp { x } => self.route_pointer(x, BlockEvent::MouseUp),
                SurfaceEvent::Expose => needs_paint = true,
                SurfaceEvent::Resized(size) => {
                    self.size = size;
                    self.status.set_size(size);
                    needs_paint = true;
                }
                SurfaceEvent::Closed => open = false,
            }
        }

        if !open {
            return false;
        }

        if let Some(font) = self.commands.take_font_change() {
            match surface.set_font(&font) {
                Ok(()) => {
                    self.with_metrics(|metrics| metrics.record_font_change());
                    self.log(
                        LogLevel::Info,
                        "font_changed",
                        [
                            json_kv("font", json!(font.name)),
                            json_kv("font_size", json!(font.size)),
                        ],
                    );
                }
                Err(err) => self.log(
                    LogLevel::Error,
                    "font_change_failed",
                    [json_kv("error", json!(err.to_string()))],
                ),
            }
        }

        if self.commands.take_redraw() || needs_paint {
            self.paint(surface);
        }

        self.with_metrics(|metrics| metrics.record_tick());
        self.maybe_emit_metrics();
        true
    }

    /// Repaint the whole surface. The store lock is held from the first
    /// measurement to the end of the frame.
    fn paint(&mut self, surface: &mut dyn Surface) {
        let surface_width = self.size.width;
        let mut draw_error = None;

        let placed = {
            let mut state = self.store.lock();
            if let Err(err) = surface.begin_frame() {
                draw_error = Some(err);
            }
            let placements = layout_right_to_left(state.blocks_mut(), surface_width, |block, right| {
                let width = surface.measure(block.text());
                if let Err(err) = surface.draw_text_right(block.text(), block.color(), right) {
                    draw_error.get_or_insert(err);
                }
                width
            });
            if let Err(err) = surface.end_frame() {
                draw_error.get_or_insert(err);
            }
            placements.len()
        };

        self.with_metrics(|metrics| metrics.record_paint(placed));
        match draw_error {
            Some(err) => self.log(
                LogLevel::Warn,
                "paint_failed",
                [json_kv("error", json!(err.to_string()))],
            ),
            None => self.log(
                LogLevel::Debug,
                "paint_completed",
                [
                    json_kv("blocks", json!(placed)),
                    json_kv("width", json!(surface_width)),
                ],
            ),
        }
    }

    fn route_pointer(&mut self, x: i32, event: BlockEvent) {
        let outcome = self
            .store
            .lock()
            .route_pointer(self.size.width, x, event);

        self.with_metrics(|metrics| metrics.record_pointer(matches!(outcome, PointerOutcome::Queued(_))));
        let (message, block) = match outcome {
            PointerOutcome::Queued(id) => ("pointer_event", Some(id.as_raw())),
            PointerOutcome::Unbound(id) => ("pointer_unbound", Some(id.as_raw())),
            PointerOutcome::Missed => ("pointer_discarded", None),
        };
        self.log(
            LogLevel::Debug,
            message,
            [
                json_kv("x", json!(x)),
                json_kv("code", json!(event.code())),
                json_kv("block", json!(block)),
            ],
        );
    }

    fn with_metrics(&self, f: impl FnOnce(&mut EngineMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                f(&mut guard);
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics_interval == Duration::from_millis(0) {
            return;
        }
        let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        else {
            return;
        };

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.config.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }

        let uptime = self
            .start_instant
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        if let Ok(guard) = metrics.lock() {
            let event = guard
                .snapshot(uptime)
                .to_log_event(self.config.metrics_target.as_str());
            let _ = logger.log_event(event);
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        emit(self.config.logger.as_ref(), level, ENGINE_TARGET, message, fields);
    }
}
