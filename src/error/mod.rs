//! Error types shared by every layer of the bar.

mod types;

pub use types::{BarError, Result};
