//! Block module orchestrator.
//!
//! A block is one independently addressable text cell of the bar. The types
//! live in the private `core` module; the store owns every live instance.

mod core;

pub use core::{Block, BlockEvent, BlockId, Color, HandlerToken};
