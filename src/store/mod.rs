//! Block store orchestrator.
//!
//! The store is the only owner of live [`Block`](crate::block::Block)s. It is
//! shared between the control thread and the UI thread behind one mutex.

mod core;

pub use core::{BlockStore, PointerOutcome, StoreGuard, StoreState};
