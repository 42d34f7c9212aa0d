//! Render engine orchestrator.
//!
//! [`RenderEngine`] owns the UI thread. The thread opens the surface, then
//! ticks: pump platform messages, apply pending commands, paint when asked,
//! wait for the next command or tick boundary.

mod core;
mod ui;

pub use core::{EngineStatus, RenderEngine};

pub(crate) const ENGINE_TARGET: &str = "winbar::engine";
