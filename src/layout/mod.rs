//! Layout module orchestrator.
//!
//! The right-to-left placement and hit-test walks live in the private `core`
//! module so both the paint path and the pointer path share one definition of
//! "where a block is".

mod core;

pub use core::{Placement, hit_test, layout_right_to_left};
