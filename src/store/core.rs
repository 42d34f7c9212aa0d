use std::sync::{Mutex, MutexGuard};

use crate::block::{Block, BlockEvent, BlockId, Color, HandlerToken};
use crate::error::{BarError, Result};
use crate::layout::hit_test;

pub type StoreGuard<'a> = MutexGuard<'a, StoreState>;

/// What happened to a pointer event routed through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// The event was appended to the block's queue.
    Queued(BlockId),
    /// A block was hit but nothing is bound to it, so the event was dropped.
    Unbound(BlockId),
    /// No visible block spans the coordinate.
    Missed,
}

/// Lock-protected contents of the store. Every method runs with the lock held.
#[derive(Debug)]
pub struct StoreState {
    blocks: Vec<Block>,
    next_id: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn create(&mut self) -> BlockId {
        let id = BlockId::from_raw(self.next_id);
        self.next_id += 1;
        self.blocks.push(Block::new(id));
        id
    }

    pub fn delete(&mut self, id: BlockId) -> Result<Block> {
        let index = self
            .blocks
            .iter()
            .position(|block| block.id() == id)
            .ok_or(BarError::BlockNotFound(id))?;
        Ok(self.blocks.remove(index))
    }

    pub fn clear_all(&mut self) -> usize {
        let removed = self.blocks.len();
        self.blocks.clear();
        removed
    }

    pub fn get(&self, id: BlockId) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|block| block.id() == id)
            .ok_or(BarError::BlockNotFound(id))
    }

    pub fn get_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks
            .iter_mut()
            .find(|block| block.id() == id)
            .ok_or(BarError::BlockNotFound(id))
    }

    pub fn set_text(&mut self, id: BlockId, text: &str) -> Result<bool> {
        Ok(self.get_mut(id)?.update_text(text))
    }

    pub fn set_color(&mut self, id: BlockId, color: Color) -> Result<bool> {
        Ok(self.get_mut(id)?.update_color(color))
    }

    pub fn set_hidden(&mut self, id: BlockId, hidden: bool) -> Result<bool> {
        Ok(self.get_mut(id)?.update_hidden(hidden))
    }

    pub fn set_handler(&mut self, id: BlockId, handler: Option<HandlerToken>) -> Result<bool> {
        Ok(self.get_mut(id)?.replace_handler(handler))
    }

    /// All blocks in creation order, hidden ones included.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Mutable access in creation order, used by the paint pass.
    pub fn blocks_mut(&mut self) -> std::slice::IterMut<'_, Block> {
        self.blocks.iter_mut()
    }

    /// Visible blocks in creation order, for diagnostics and tests. The paint
    /// pass walks [`StoreState::blocks_mut`] instead so it can record
    /// placements in the same sweep.
    pub fn snapshot_for_paint(&self) -> Vec<&Block> {
        self.blocks.iter().filter(|block| !block.is_hidden()).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hit-test `x` against the last painted layout and queue `event` on the
    /// matched block when a handler is bound to it.
    pub fn route_pointer(&mut self, surface_width: i32, x: i32, event: BlockEvent) -> PointerOutcome {
        let Some(id) = hit_test(self.blocks.iter(), surface_width, x) else {
            return PointerOutcome::Missed;
        };
        match self.get_mut(id) {
            Ok(block) if block.has_handler() => {
                block.push_event(event);
                PointerOutcome::Queued(id)
            }
            Ok(_) => PointerOutcome::Unbound(id),
            Err(_) => PointerOutcome::Missed,
        }
    }

    pub fn pop_event(&mut self, id: BlockId) -> Result<Option<BlockEvent>> {
        Ok(self.get_mut(id)?.pop_event())
    }
}

/// Ordered, mutex-guarded collection of blocks shared across threads.
///
/// Each convenience method below holds the lock for the whole operation. The
/// render engine takes [`BlockStore::lock`] directly so a paint or hit-test
/// observes one consistent state from start to finish.
#[derive(Debug)]
pub struct BlockStore {
    inner: Mutex<StoreState>,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreState::new()),
        }
    }

    pub fn lock(&self) -> StoreGuard<'_> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self) -> BlockId {
        self.lock().create()
    }

    pub fn delete(&self, id: BlockId) -> Result<()> {
        self.lock().delete(id).map(|_| ())
    }

    pub fn set_text(&self, id: BlockId, text: &str) -> Result<bool> {
        self.lock().set_text(id, text)
    }

    pub fn set_color(&self, id: BlockId, color: Color) -> Result<bool> {
        self.lock().set_color(id, color)
    }

    pub fn set_hidden(&self, id: BlockId, hidden: bool) -> Result<bool> {
        self.lock().set_hidden(id, hidden)
    }

    pub fn set_handler(&self, id: BlockId, handler: Option<HandlerToken>) -> Result<bool> {
        self.lock().set_handler(id, handler)
    }

    pub fn clear_all(&self) -> usize {
        self.lock().clear_all()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of a block's current state, for diagnostics.
    pub fn inspect(&self, id: BlockId) -> Result<Block> {
        self.lock().get(id).cloned()
    }
}
