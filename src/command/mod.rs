//! Deferred cross-thread commands for the render engine.
//!
//! Control-thread calls only flip flags here; the UI thread consumes them once
//! per tick. The queue has its own lock, separate from the block store, so a
//! redraw request never waits on an in-progress paint.

mod core;

pub use core::{CommandQueue, FontSpec, PendingCommands};
