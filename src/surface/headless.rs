//! Deterministic in-memory surface.
//!
//! Text is measured from a per-character advance (or explicit per-string
//! widths), both expressed at the reference height of 14 and scaled by the
//! current font height. A cloneable [`HeadlessProbe`] lets other threads
//! inject platform events and observe what the UI thread drew.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::block::Color;
use crate::command::FontSpec;
use crate::error::{BarError, Result};
use crate::geometry::Size;

use super::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};

const REFERENCE_HEIGHT: i32 = 14;

/// One `draw_text_right` call in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub text: String,
    pub color: Color,
    pub right_edge: i32,
    pub width: i32,
}

#[derive(Debug, Default)]
struct ProbeState {
    inbox: VecDeque<SurfaceEvent>,
    opened: bool,
    released: bool,
    pumps: u64,
    paints: u64,
    fonts: Vec<FontSpec>,
    last_frame: Vec<DrawCall>,
    fail_font: bool,
    paused: bool,
    parked: bool,
}

/// Shared view of a [`HeadlessSurface`] usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct HeadlessProbe {
    inner: Arc<(Mutex<ProbeState>, Condvar)>,
}

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut ProbeState)) {
        let mut state = self.lock();
        f(&mut state);
        self.inner.1.notify_all();
    }

    pub fn push(&self, event: SurfaceEvent) {
        self.update(|state| state.inbox.push_back(event));
    }

    pub fn click(&self, x: i32) {
        self.update(|state| {
            state.inbox.push_back(SurfaceEvent::PointerDown { x });
            state.inbox.push_back(SurfaceEvent::PointerUp { x });
        });
    }

    pub fn close(&self) {
        self.push(SurfaceEvent::Closed);
    }

    /// Make the next font creation fail.
    pub fn fail_next_font(&self) {
        self.update(|state| state.fail_font = true);
    }

    /// Hold the UI thread at the start of its next pump until [`resume`].
    ///
    /// [`resume`]: HeadlessProbe::resume
    pub fn pause(&self) {
        self.update(|state| state.paused = true);
    }

    pub fn resume(&self) {
        self.update(|state| state.paused = false);
    }

    /// Pause and wait until the UI thread is actually parked.
    pub fn pause_and_wait(&self, timeout: Duration) -> bool {
        self.pause();
        self.wait_until(timeout, |stats| stats.parked)
    }

    fn park_while_paused(&self) {
        let mut state = self.lock();
        while state.paused {
            state.parked = true;
            self.inner.1.notify_all();
            state = self
                .inner
                .1
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.parked = false;
    }

    pub fn is_opened(&self) -> bool {
        self.lock().opened
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    pub fn pumps(&self) -> u64 {
        self.lock().pumps
    }

    pub fn paints(&self) -> u64 {
        self.lock().paints
    }

    /// Fonts created so far, the initial one included.
    pub fn fonts(&self) -> Vec<FontSpec> {
        self.lock().fonts.clone()
    }

    pub fn last_frame(&self) -> Vec<DrawCall> {
        self.lock().last_frame.clone()
    }

    pub fn inbox_len(&self) -> usize {
        self.lock().inbox.len()
    }

    /// Wait until `predicate` holds for the probe state or `timeout` expires.
    pub fn wait_until<F>(&self, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut(&HeadlessStats) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if predicate(&HeadlessStats::from(&*state)) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .1
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
    }

    /// Wait until the UI thread has pumped the inbox empty at least once more.
    pub fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = self.pumps();
        self.wait_until(timeout, |stats| stats.inbox_len == 0 && stats.pumps > start)
    }
}

/// Counters exposed to [`HeadlessProbe::wait_until`] predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    pub pumps: u64,
    pub paints: u64,
    pub fonts: usize,
    pub inbox_len: usize,
    pub released: bool,
    pub parked: bool,
}

impl From<&ProbeState> for HeadlessStats {
    fn from(state: &ProbeState) -> Self {
        Self {
            pumps: state.pumps,
            paints: state.paints,
            fonts: state.fonts.len(),
            inbox_len: state.inbox.len(),
            released: state.released,
            parked: state.parked,
        }
    }
}

/// Surface that draws into memory. Doubles as its own factory.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: Size,
    advance: i32,
    widths: HashMap<String, i32>,
    font: FontSpec,
    frame: Vec<DrawCall>,
    probe: HeadlessProbe,
    in_frame: bool,
}

impl HeadlessSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            advance: 10,
            widths: HashMap::new(),
            font: FontSpec::default(),
            frame: Vec::new(),
            probe: HeadlessProbe::default(),
            in_frame: false,
        }
    }

    /// Per-character advance at the reference height.
    pub fn with_advance(mut self, advance: i32) -> Self {
        self.advance = advance;
        self
    }

    /// Exact width of `text` at the reference height.
    pub fn with_width(mut self, text: impl Into<String>, width: i32) -> Self {
        self.widths.insert(text.into(), width);
        self
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }

    fn scale(&self, width: i32) -> i32 {
        let height = self.font.size.abs().max(1);
        width * height / REFERENCE_HEIGHT
    }
}

impl SurfaceFactory for HeadlessSurface {
    fn open(mut self: Box<Self>, options: &SurfaceOptions) -> Result<Box<dyn Surface>> {
        self.set_font(&options.font)?;
        self.probe.update(|state| state.opened = true);
        Ok(self)
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn pump(&mut self) -> Result<Vec<SurfaceEvent>> {
        let mut events = Vec::new();
        let mut resized = None;
        self.probe.park_while_paused();
        self.probe.update(|state| {
            state.pumps += 1;
            events.extend(state.inbox.drain(..));
        });
        for event in &events {
            if let SurfaceEvent::Resized(size) = event {
                resized = Some(*size);
            }
        }
        if let Some(size) = resized {
            self.size = size;
        }
        Ok(events)
    }

    fn set_font(&mut self, font: &FontSpec) -> Result<()> {
        let mut failed = false;
        self.probe.update(|state| {
            failed = std::mem::take(&mut state.fail_font);
            if !failed {
                state.fonts.push(font.clone());
            }
        });
        if failed {
            return Err(BarError::Font(format!("cannot create `{}`", font.name)));
        }
        self.font = font.clone();
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.frame.clear();
        self.in_frame = true;
        Ok(())
    }

    fn measure(&mut self, text: &str) -> i32 {
        let base = match self.widths.get(text) {
            Some(width) => *width,
            None => text.chars().count() as i32 * self.advance,
        };
        self.scale(base)
    }

    fn draw_text_right(&mut self, text: &str, color: Color, right_edge: i32) -> Result<()> {
        if !self.in_frame {
            return Err(BarError::Backend("draw outside of a frame".to_string()));
        }
        let width = self.measure(text);
        self.frame.push(DrawCall {
            text: text.to_string(),
            color,
            right_edge,
            width,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.in_frame = false;
        let frame = std::mem::take(&mut self.frame);
        self.probe.update(|state| {
            state.paints += 1;
            state.last_frame = frame;
        });
        Ok(())
    }

    fn release(&mut self) {
        self.probe.update(|state| state.released = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SurfaceOptions {
        SurfaceOptions {
            font: FontSpec::default(),
            width_fraction: 0.5,
        }
    }

    #[test]
    fn explicit_widths_apply_at_reference_height() {
        let surface = HeadlessSurface::new(Size::new(200, 30)).with_width("CPU: 5%", 80);
        let mut surface = Box::new(surface).open(&options()).unwrap();
        assert_eq!(surface.measure("CPU: 5%"), 80);
        assert_eq!(surface.measure("abc"), 30);
    }

    #[test]
    fn font_height_scales_measurements() {
        let surface = HeadlessSurface::new(Size::new(200, 30)).with_width("CPU: 5%", 70);
        let probe = surface.probe();
        let mut surface = Box::new(surface).open(&options()).unwrap();
        surface.set_font(&FontSpec::new("Mono", -28)).unwrap();
        assert_eq!(surface.measure("CPU: 5%"), 140);
        assert_eq!(probe.fonts().len(), 2);
    }

    #[test]
    fn frames_are_published_on_end() {
        let surface = HeadlessSurface::new(Size::new(200, 30));
        let probe = surface.probe();
        let mut surface = Box::new(surface).open(&options()).unwrap();
        surface.begin_frame().unwrap();
        surface.draw_text_right("hi", Color::WHITE, 200).unwrap();
        assert!(probe.last_frame().is_empty());
        surface.end_frame().unwrap();
        assert_eq!(probe.paints(), 1);
        assert_eq!(probe.last_frame()[0].right_edge, 200);
        assert!(surface.draw_text_right("late", Color::WHITE, 10).is_err());
    }

    #[test]
    fn pump_drains_injected_events_and_tracks_resize() {
        let surface = HeadlessSurface::new(Size::new(200, 30));
        let probe = surface.probe();
        let mut surface = Box::new(surface).open(&options()).unwrap();
        probe.click(42);
        probe.push(SurfaceEvent::Resized(Size::new(300, 30)));
        let events = surface.pump().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], SurfaceEvent::PointerDown { x: 42 });
        assert_eq!(surface.size(), Size::new(300, 30));
        assert_eq!(probe.inbox_len(), 0);
    }

    #[test]
    fn paused_pump_parks_until_resumed() {
        let surface = HeadlessSurface::new(Size::new(200, 30));
        let probe = surface.probe();
        let mut surface = Box::new(surface).open(&options()).unwrap();

        let waiter = probe.clone();
        let handle = std::thread::spawn(move || {
            assert!(waiter.pause_and_wait(Duration::from_secs(5)));
            waiter.push(SurfaceEvent::Expose);
            waiter.resume();
        });
        while !probe.lock().paused {
            std::thread::yield_now();
        }
        let events = surface.pump().unwrap();
        handle.join().unwrap();
        assert_eq!(events, vec![SurfaceEvent::Expose]);
        assert!(!probe.wait_until(Duration::ZERO, |stats| stats.parked));
    }

    #[test]
    fn injected_font_failure_is_reported_once() {
        let surface = HeadlessSurface::new(Size::new(200, 30));
        let probe = surface.probe();
        let mut surface = Box::new(surface).open(&options()).unwrap();
        probe.fail_next_font();
        assert!(matches!(
            surface.set_font(&FontSpec::new("Missing", -14)),
            Err(BarError::Font(_))
        ));
        assert!(surface.set_font(&FontSpec::new("Mono", -14)).is_ok());
    }
}
