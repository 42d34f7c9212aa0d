//! Control-thread side of the bar.
//!
//! [`AppContext`] is the one explicit context every handler and timer callback
//! receives. [`Dispatcher`] drains block event queues into bound handlers and
//! fires due timers, once per tick.

mod context;
mod core;
mod timer;

pub use context::AppContext;
pub use core::{Dispatcher, Handler, TickReport};
pub use timer::{TimerCallback, TimerId, TimerQueue};

pub(crate) const DISPATCH_TARGET: &str = "winbar::dispatch";
