use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Font face plus height. Heights follow the Win32 convention: negative
/// values request character height, positive values cell height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub name: String,
    pub size: i32,
}

impl FontSpec {
    pub fn new(name: impl Into<String>, size: i32) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new("Arial", -14)
    }
}

#[derive(Debug, Default)]
struct CommandState {
    redraw_pending: bool,
    pending_font: Option<FontSpec>,
    stop_requested: bool,
    redraw_requests: u64,
}

impl CommandState {
    fn has_work(&self) -> bool {
        self.redraw_pending || self.pending_font.is_some() || self.stop_requested
    }
}

/// Snapshot of the queue flags, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingCommands {
    pub redraw_pending: bool,
    pub font_change_pending: bool,
    pub pending_font: Option<FontSpec>,
    pub stop_requested: bool,
    pub redraw_requests: u64,
}

/// Coalescing command flags plus a condition variable the UI thread waits on
/// between ticks.
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<CommandState>,
    wake: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CommandState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask for a repaint. Any number of calls before the next tick coalesce
    /// into a single paint.
    pub fn request_redraw(&self) {
        let mut state = self.lock();
        state.redraw_pending = true;
        state.redraw_requests = state.redraw_requests.saturating_add(1);
        self.wake.notify_one();
    }

    /// Ask for a font replacement. The last font submitted before the next
    /// tick wins.
    pub fn request_font_change(&self, font: FontSpec) {
        let mut state = self.lock();
        state.pending_font = Some(font);
        self.wake.notify_one();
    }

    pub fn request_stop(&self) {
        let mut state = self.lock();
        state.stop_requested = true;
        self.wake.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Take the pending font change, if any. Taking one also marks a redraw
    /// pending so the new font is painted on the same tick.
    pub fn take_font_change(&self) -> Option<FontSpec> {
        let mut state = self.lock();
        let font = state.pending_font.take();
        if font.is_some() {
            state.redraw_pending = true;
        }
        font
    }

    /// Consume the redraw flag.
    pub fn take_redraw(&self) -> bool {
        let mut state = self.lock();
        std::mem::take(&mut state.redraw_pending)
    }

    /// Block until a command is pending or `timeout` elapses. Returns `true` if
    /// work is pending on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !state.has_work() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
        true
    }

    pub fn pending(&self) -> PendingCommands {
        let state = self.lock();
        PendingCommands {
            redraw_pending: state.redraw_pending,
            font_change_pending: state.pending_font.is_some(),
            pending_font: state.pending_font.clone(),
            stop_requested: state.stop_requested,
            redraw_requests: state.redraw_requests,
        }
    }
}
