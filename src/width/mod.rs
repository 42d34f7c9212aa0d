//! Display width helpers for cell-based surfaces.

mod utils;

pub use utils::{display_width, printable};
