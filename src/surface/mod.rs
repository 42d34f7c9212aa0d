//! Platform seam for the render engine.
//!
//! A [`SurfaceFactory`] is moved onto the UI thread and opened there, so
//! every platform handle it creates (window, font, cursor) is owned by that
//! thread for its whole life. The engine only talks to the resulting
//! [`Surface`].

pub mod headless;
pub mod terminal;
#[cfg(windows)]
pub mod win32;

use crate::block::Color;
use crate::command::FontSpec;
use crate::error::Result;
use crate::geometry::Size;

pub use headless::{DrawCall, HeadlessProbe, HeadlessStats, HeadlessSurface};
pub use terminal::TerminalSurface;
#[cfg(windows)]
pub use win32::{Win32Factory, Win32Surface};

/// Input and lifecycle notifications drained from the platform queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    PointerDown { x: i32 },
    PointerUp { x: i32 },
    /// The platform asked for (part of) the surface to be repainted.
    Expose,
    Resized(Size),
    /// The surface went away or the user asked to quit.
    Closed,
}

/// Parameters handed to a factory when the UI thread opens its surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceOptions {
    pub font: FontSpec,
    pub width_fraction: f32,
}

/// A drawable, input-producing surface. Never leaves the UI thread.
pub trait Surface {
    fn size(&self) -> Size;

    /// Drain pending platform messages without blocking.
    fn pump(&mut self) -> Result<Vec<SurfaceEvent>>;

    /// Release the current font and create one from `font`.
    fn set_font(&mut self, font: &FontSpec) -> Result<()>;

    /// Start a frame by clearing the whole surface to the background.
    fn begin_frame(&mut self) -> Result<()>;

    /// Width of `text` at the current font.
    fn measure(&mut self, text: &str) -> i32;

    /// Draw `text` so it ends at `right_edge`, vertically centred.
    fn draw_text_right(&mut self, text: &str, color: Color, right_edge: i32) -> Result<()>;

    fn end_frame(&mut self) -> Result<()>;

    /// Free font, cursor and window resources. Called once, on the UI thread.
    fn release(&mut self);
}

/// Creates the surface on the UI thread, performing the platform's startup
/// sequence (locate container, register, create, reparent, size).
pub trait SurfaceFactory: Send + 'static {
    fn open(self: Box<Self>, options: &SurfaceOptions) -> Result<Box<dyn Surface>>;
}

impl<F> SurfaceFactory for F
where
    F: FnOnce(&SurfaceOptions) -> Result<Box<dyn Surface>> + Send + 'static,
{
    fn open(self: Box<Self>, options: &SurfaceOptions) -> Result<Box<dyn Surface>> {
        (*self)(options)
    }
}

/// Geometry of a surface docked into a container: `width_fraction` of its
/// width, full height, flush with the right edge. Returns `(left, size)`.
pub fn docked_geometry(container: Size, width_fraction: f32) -> (i32, Size) {
    let fraction = width_fraction.clamp(0.0, 1.0);
    let width = (container.width as f32 * fraction) as i32;
    let width = width.clamp(0, container.width.max(0));
    (container.width - width, Size::new(width, container.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docks_to_right_half_of_container() {
        let (left, size) = docked_geometry(Size::new(1920, 40), 0.5);
        assert_eq!(left, 960);
        assert_eq!(size, Size::new(960, 40));
    }

    #[test]
    fn odd_widths_round_down_like_integer_division() {
        let (left, size) = docked_geometry(Size::new(1001, 30), 0.5);
        assert_eq!(size.width, 500);
        assert_eq!(left, 501);
    }

    #[test]
    fn fraction_is_clamped() {
        let (left, size) = docked_geometry(Size::new(100, 10), 3.0);
        assert_eq!(left, 0);
        assert_eq!(size.width, 100);
    }

    #[test]
    fn closures_act_as_factories() {
        let factory: Box<dyn SurfaceFactory> = Box::new(|_: &SurfaceOptions| -> Result<Box<dyn Surface>> {
            Err(crate::error::BarError::ContainerNotFound("test".into()))
        });
        let options = SurfaceOptions {
            font: FontSpec::default(),
            width_fraction: 0.5,
        };
        assert!(factory.open(&options).is_err());
    }
}
