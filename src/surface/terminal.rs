//! Terminal-hosted surface.
//!
//! The terminal window plays the host container: the bar occupies the right
//! `width_fraction` of its bottom row and measures text in cells. Left mouse
//! button presses on that row become pointer events; `q`, `Esc` or `Ctrl-C`
//! close the surface. Font changes are accepted but cannot alter cell size.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::{Color as TermColor, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use unicode_width::UnicodeWidthChar;

use crate::block::Color;
use crate::command::FontSpec;
use crate::error::{BarError, Result};
use crate::geometry::Size;
use crate::width::{display_width, printable};

use super::{Surface, SurfaceEvent, SurfaceOptions, docked_geometry};

pub struct TerminalSurface {
    out: Stdout,
    width_fraction: f32,
    origin_x: i32,
    row: u16,
    size: Size,
    font: FontSpec,
    entered: bool,
}

impl TerminalSurface {
    /// Factory that opens the surface on the calling (UI) thread.
    pub fn factory() -> impl super::SurfaceFactory {
        |options: &SurfaceOptions| -> Result<Box<dyn Surface>> {
            Ok(Box::new(TerminalSurface::open(options)?))
        }
    }

    pub fn open(options: &SurfaceOptions) -> Result<Self> {
        let (columns, rows) = terminal::size()
            .map_err(|err| BarError::ContainerNotFound(format!("terminal size unavailable: {err}")))?;
        if columns == 0 || rows == 0 {
            return Err(BarError::ContainerNotFound("terminal has no cells".to_string()));
        }

        let mut surface = Self {
            out: io::stdout(),
            width_fraction: options.width_fraction,
            origin_x: 0,
            row: 0,
            size: Size::default(),
            font: options.font.clone(),
            entered: false,
        };
        surface.relayout(Size::new(columns as i32, rows as i32));
        surface.enter()?;
        Ok(surface)
    }

    /// Font last requested. Cell size is fixed by the terminal.
    pub fn font(&self) -> &FontSpec {
        &self.font
    }

    fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()
            .map_err(|err| BarError::SurfaceCreation(format!("raw mode: {err}")))?;
        self.entered = true;
        execute!(
            self.out,
            EnterAlternateScreen,
            EnableMouseCapture,
            Hide,
            Clear(ClearType::All)
        )
        .map_err(|err| BarError::SurfaceCreation(err.to_string()))?;
        Ok(())
    }

    fn relayout(&mut self, container: Size) {
        let (left, size) = docked_geometry(Size::new(container.width, 1), self.width_fraction);
        self.origin_x = left;
        self.size = size;
        self.row = container.height.saturating_sub(1).clamp(0, u16::MAX as i32) as u16;
    }

    fn translate(&self, event: Event) -> Option<SurfaceEvent> {
        match event {
            Event::Mouse(MouseEvent {
                kind, column, row, ..
            }) if row == self.row => {
                let x = column as i32 - self.origin_x;
                match kind {
                    MouseEventKind::Down(MouseButton::Left) => Some(SurfaceEvent::PointerDown { x }),
                    MouseEventKind::Up(MouseButton::Left) => Some(SurfaceEvent::PointerUp { x }),
                    _ => None,
                }
            }
            Event::Key(key) if is_quit(&key) => Some(SurfaceEvent::Closed),
            Event::Resize(_, _) => Some(SurfaceEvent::Expose),
            Event::FocusGained => Some(SurfaceEvent::Expose),
            _ => None,
        }
    }

    fn absolute_column(&self, x: i32) -> u16 {
        screen_column(self.origin_x, x)
    }
}

/// Terminal column for surface-relative `x`, clamped to the addressable range.
fn screen_column(origin_x: i32, x: i32) -> u16 {
    origin_x.saturating_add(x).clamp(0, u16::MAX as i32) as u16
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Keep the trailing part of `text` that fits in `cells` columns.
fn clip_left(text: &str, cells: i32) -> String {
    let mut kept = Vec::new();
    let mut used = 0;
    for ch in text.chars().rev() {
        let width = ch.width().unwrap_or(0) as i32;
        if used + width > cells {
            break;
        }
        used += width;
        kept.push(ch);
    }
    kept.into_iter().rev().collect()
}

impl Surface for TerminalSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn pump(&mut self) -> Result<Vec<SurfaceEvent>> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            let raw = event::read()?;
            if let Event::Resize(columns, rows) = raw {
                self.relayout(Size::new(columns as i32, rows as i32));
                execute!(self.out, Clear(ClearType::All))?;
                events.push(SurfaceEvent::Resized(self.size));
            }
            if let Some(event) = self.translate(raw) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn set_font(&mut self, font: &FontSpec) -> Result<()> {
        self.font = font.clone();
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        let blank = " ".repeat(self.size.width.max(0) as usize);
        let (column, row) = (self.absolute_column(0), self.row);
        queue!(
            self.out,
            MoveTo(column, row),
            ResetColor,
            Print(blank)
        )?;
        Ok(())
    }

    fn measure(&mut self, text: &str) -> i32 {
        display_width(text) as i32
    }

    fn draw_text_right(&mut self, text: &str, color: Color, right_edge: i32) -> Result<()> {
        let clean = printable(text);
        let cells = display_width(&clean) as i32;
        let left = right_edge - cells;
        let (start, visible) = if left < 0 {
            (0, clip_left(&clean, right_edge))
        } else {
            (left, clean)
        };
        if visible.is_empty() {
            return Ok(());
        }
        let (column, row) = (self.absolute_column(start), self.row);
        queue!(
            self.out,
            MoveTo(column, row),
            SetForegroundColor(TermColor::Rgb {
                r: color.r(),
                g: color.g(),
                b: color.b(),
            }),
            Print(visible),
            ResetColor
        )?;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn release(&mut self) {
        if !self.entered {
            return;
        }
        self.entered = false;
        execute!(self.out, Show, DisableMouseCapture, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_the_right_end() {
        assert_eq!(clip_left("CPU: 5%", 3), " 5%");
        assert_eq!(clip_left("abc", 10), "abc");
        assert_eq!(clip_left("abc", 0), "");
    }

    #[test]
    fn clip_respects_wide_characters() {
        assert_eq!(clip_left("a漢字", 3), "字");
        assert_eq!(clip_left("a漢字", 5), "a漢字");
    }

    #[test]
    fn columns_are_offset_by_origin_and_clamped() {
        assert_eq!(screen_column(40, 0), 40);
        assert_eq!(screen_column(40, 39), 79);
        assert_eq!(screen_column(0, -5), 0);
        assert_eq!(screen_column(i32::MAX, 10), u16::MAX);
    }

    #[test]
    fn quit_keys() {
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(is_quit(&q));
        assert!(is_quit(&ctrl_c));
        assert!(!is_quit(&c));
    }
}
