use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::block::{Block, BlockId, Color, HandlerToken};
use crate::command::{CommandQueue, FontSpec};
use crate::engine::RenderEngine;
use crate::error::{BarError, Result};
use crate::logging::Logger;
use crate::store::BlockStore;

use super::Handler;
use super::timer::{TimerId, TimerQueue};

/// The application context handed to every handler and timer callback.
///
/// Cloning is cheap; every clone talks to the same store, command queue and
/// timer queue. Mutations request a redraw only when they change what is on
/// screen.
#[derive(Clone)]
pub struct AppContext {
    store: Arc<BlockStore>,
    commands: Arc<CommandQueue>,
    timers: Arc<Mutex<TimerQueue>>,
    logger: Option<Logger>,
}

impl AppContext {
    pub fn new(store: Arc<BlockStore>, commands: Arc<CommandQueue>) -> Self {
        Self {
            store,
            commands,
            timers: Arc::new(Mutex::new(TimerQueue::new())),
            logger: None,
        }
    }

    /// Context bound to a running engine's store and command queue.
    pub fn for_engine(engine: &RenderEngine) -> Self {
        Self::new(engine.store(), engine.commands())
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }

    pub fn commands(&self) -> &Arc<CommandQueue> {
        &self.commands
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// New blocks start empty and visible, so they occupy no width until
    /// their first text update.
    pub fn create_block(&self) -> BlockId {
        self.store.create()
    }

    pub fn set_text(&self, id: BlockId, text: &str) -> Result<()> {
        let visible_change = {
            let mut state = self.store.lock();
            let changed = state.set_text(id, text)?;
            changed && !state.get(id)?.is_hidden()
        };
        self.redraw_if(visible_change);
        Ok(())
    }

    pub fn set_color(&self, id: BlockId, r: u8, g: u8, b: u8) -> Result<()> {
        let visible_change = {
            let mut state = self.store.lock();
            let changed = state.set_color(id, Color::from_rgb(r, g, b))?;
            changed && !state.get(id)?.is_hidden()
        };
        self.redraw_if(visible_change);
        Ok(())
    }

    /// Like [`AppContext::set_color`] for loosely typed callers; every
    /// component must lie in `0..=255`.
    pub fn set_color_checked(&self, id: BlockId, r: i64, g: i64, b: i64) -> Result<()> {
        let r = color_component("r", r)?;
        let g = color_component("g", g)?;
        let b = color_component("b", b)?;
        self.set_color(id, r, g, b)
    }

    /// Bind `handler` to the block, replacing (and releasing) any previous one.
    pub fn set_handler<H>(&self, id: BlockId, handler: H) -> Result<HandlerToken>
    where
        H: Handler + 'static,
    {
        let token = HandlerToken::new(handler);
        self.set_handler_token(id, token.clone())?;
        Ok(token)
    }

    /// Bind an existing token, e.g. one handler shared by several blocks.
    pub fn set_handler_token(&self, id: BlockId, token: HandlerToken) -> Result<()> {
        self.store.set_handler(id, Some(token)).map(|_| ())
    }

    pub fn clear_handler(&self, id: BlockId) -> Result<()> {
        self.store.set_handler(id, None).map(|_| ())
    }

    pub fn show(&self, id: BlockId) -> Result<()> {
        let changed = self.store.set_hidden(id, false)?;
        self.redraw_if(changed);
        Ok(())
    }

    pub fn hide(&self, id: BlockId) -> Result<()> {
        let changed = self.store.set_hidden(id, true)?;
        self.redraw_if(changed);
        Ok(())
    }

    pub fn delete(&self, id: BlockId) -> Result<()> {
        let removed = self.store.lock().delete(id)?;
        self.redraw_if(!removed.is_hidden());
        Ok(())
    }

    /// Remove every block. Ids held anywhere become invalid.
    pub fn clear_blocks(&self) -> usize {
        let removed = self.store.clear_all();
        self.redraw_if(removed > 0);
        removed
    }

    /// Replace the bar's font. The UI thread repaints once it has switched.
    pub fn set_font(&self, name: impl Into<String>, size: i32) {
        self.commands.request_font_change(FontSpec::new(name, size));
    }

    pub fn request_redraw(&self) {
        self.commands.request_redraw();
    }

    pub fn inspect(&self, id: BlockId) -> Result<Block> {
        self.store.inspect(id)
    }

    /// Run `callback` once on the dispatcher thread after `delay`.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce(&AppContext) + Send + 'static,
    {
        self.timers()
            .schedule(Instant::now(), delay, Box::new(callback))
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.timers().cancel(id)
    }

    fn redraw_if(&self, changed: bool) {
        if changed {
            self.commands.request_redraw();
        }
    }

    pub(crate) fn timers(&self) -> MutexGuard<'_, TimerQueue> {
        self.timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn color_component(component: &'static str, value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| BarError::InvalidColor { component, value })
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("blocks", &self.store.len())
            .field("commands", &self.commands.pending())
            .field("timers", &self.timers().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockEvent;

    fn context() -> AppContext {
        AppContext::new(Arc::new(BlockStore::new()), Arc::new(CommandQueue::new()))
    }

    #[test]
    fn text_change_requests_one_redraw() {
        let ctx = context();
        let id = ctx.create_block();
        assert!(!ctx.commands().pending().redraw_pending);

        ctx.set_text(id, "CPU: 5%").unwrap();
        assert!(ctx.commands().take_redraw());

        ctx.set_text(id, "CPU: 5%").unwrap();
        assert!(!ctx.commands().take_redraw());
    }

    #[test]
    fn hidden_blocks_update_silently() {
        let ctx = context();
        let id = ctx.create_block();
        ctx.hide(id).unwrap();
        assert!(ctx.commands().take_redraw());

        ctx.set_text(id, "offscreen").unwrap();
        ctx.set_color(id, 1, 2, 3).unwrap();
        assert!(!ctx.commands().take_redraw());
        assert_eq!(ctx.inspect(id).unwrap().text(), "offscreen");

        ctx.hide(id).unwrap();
        assert!(!ctx.commands().take_redraw());
        ctx.show(id).unwrap();
        assert!(ctx.commands().take_redraw());
    }

    #[test]
    fn checked_color_rejects_out_of_range_components() {
        let ctx = context();
        let id = ctx.create_block();
        let err = ctx.set_color_checked(id, 10, 256, 0).unwrap_err();
        assert!(matches!(
            err,
            BarError::InvalidColor {
                component: "g",
                value: 256
            }
        ));
        let err = ctx.set_color_checked(id, -1, 0, 0).unwrap_err();
        assert!(matches!(err, BarError::InvalidColor { component: "r", .. }));

        ctx.set_color_checked(id, 255, 128, 0).unwrap();
        assert_eq!(ctx.inspect(id).unwrap().color(), Color::from_rgb(255, 128, 0));
    }

    #[test]
    fn unknown_ids_are_argument_errors() {
        let ctx = context();
        let id = ctx.create_block();
        ctx.clear_blocks();

        assert!(matches!(ctx.delete(id), Err(BarError::BlockNotFound(missing)) if missing == id));
        assert!(matches!(ctx.set_text(id, "x"), Err(BarError::BlockNotFound(_))));
        assert!(matches!(ctx.show(id), Err(BarError::BlockNotFound(_))));
        assert!(matches!(
            ctx.set_handler(id, |_: &AppContext, _: BlockId, _: BlockEvent| {}),
            Err(BarError::BlockNotFound(_))
        ));
    }

    #[test]
    fn deleting_a_hidden_block_needs_no_redraw() {
        let ctx = context();
        let id = ctx.create_block();
        ctx.hide(id).unwrap();
        ctx.commands().take_redraw();

        ctx.delete(id).unwrap();
        assert!(!ctx.commands().take_redraw());
        assert_eq!(ctx.clear_blocks(), 0);
        assert!(!ctx.commands().take_redraw());
    }

    #[test]
    fn set_font_is_forwarded_to_the_engine_queue() {
        let ctx = context();
        ctx.set_font("Mono", -16);
        assert_eq!(ctx.commands().take_font_change(), Some(FontSpec::new("Mono", -16)));
        assert!(ctx.commands().take_redraw());
    }

    #[test]
    fn rebinding_releases_the_previous_handler() {
        let ctx = context();
        let id = ctx.create_block();
        let first = ctx
            .set_handler(id, |_: &AppContext, _: BlockId, _: BlockEvent| {})
            .unwrap();
        ctx.set_handler(id, |_: &AppContext, _: BlockId, _: BlockEvent| {})
            .unwrap();

        let block = ctx.inspect(id).unwrap();
        assert!(!block.handler().unwrap().same_as(&first));
        drop(block);
        ctx.clear_handler(id).unwrap();
        assert!(!ctx.inspect(id).unwrap().has_handler());
    }
}
