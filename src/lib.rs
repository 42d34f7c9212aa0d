//! A taskbar block renderer.
//!
//! Blocks are small text cells laid out right to left on a bar surface. A
//! dedicated UI thread owns the surface and paints the shared [`BlockStore`];
//! the control thread mutates blocks through an [`AppContext`] and drains
//! click events into handlers with a [`Dispatcher`].
//!
//! The modules follow a `mod.rs` orchestrator over private `core` files so the
//! public surface stays in this re-export list.

pub mod block;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod store;
pub mod surface;
pub mod width;

pub use block::{Block, BlockEvent, BlockId, Color, HandlerToken};
pub use command::{CommandQueue, FontSpec, PendingCommands};
pub use config::{BarConfig, ConfigOverrides, DrainPolicy};
pub use dispatch::{AppContext, Dispatcher, Handler, TickReport, TimerCallback, TimerId, TimerQueue};
pub use engine::{EngineStatus, RenderEngine};
pub use error::{BarError, Result};
pub use geometry::{Size, Span};
pub use layout::{Placement, hit_test, layout_right_to_left};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, StderrSink,
};
pub use metrics::{EngineMetrics, MetricSnapshot};
pub use store::{BlockStore, PointerOutcome, StoreGuard, StoreState};
pub use surface::{
    HeadlessProbe, HeadlessSurface, Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions,
    TerminalSurface,
};
pub use width::display_width;
