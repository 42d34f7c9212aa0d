use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use blake3::Hash;

use crate::dispatch::{AppContext, Handler};
use crate::geometry::Span;

/// Identity of a block. Issued by the store from a monotonically increasing
/// counter and never reused, even after the block is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u64);

impl BlockId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pointer events pushed into a block's queue by the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockEvent {
    MouseDown,
    MouseUp,
}

impl BlockEvent {
    /// Integer code handed to scripts.
    pub const fn code(self) -> i32 {
        match self {
            BlockEvent::MouseDown => 1,
            BlockEvent::MouseUp => 2,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(BlockEvent::MouseDown),
            2 => Some(BlockEvent::MouseUp),
            _ => None,
        }
    }
}

/// Packed `0xRRGGBB` text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const WHITE: Color = Color(0x00ff_ffff);
    pub const BLACK: Color = Color(0);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn from_packed(packed: u32) -> Self {
        Self(packed & 0x00ff_ffff)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Win32 `COLORREF` layout (`0x00BBGGRR`).
    pub const fn to_bgr(self) -> u32 {
        ((self.b() as u32) << 16) | ((self.g() as u32) << 8) | self.r() as u32
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Capability handed out by the dispatcher when a handler is bound to a block.
///
/// The render engine only asks whether one is present; invoking it is the
/// dispatcher's job and always happens without the store lock held.
#[derive(Clone)]
pub struct HandlerToken(Arc<Mutex<dyn Handler>>);

impl HandlerToken {
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self(Arc::new(Mutex::new(handler)))
    }

    pub fn invoke(&self, ctx: &AppContext, block: BlockId, event: BlockEvent) {
        let mut guard = self
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.call(ctx, block, event);
    }

    pub fn same_as(&self, other: &HandlerToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerToken")
            .field("refs", &Arc::strong_count(&self.0))
            .finish()
    }
}

/// One renderable cell of the bar.
///
/// Fields are read through accessors; writes go through the store so change
/// detection stays in step with the content. `right_edge` and `width` are
/// written by the engine during paint and are only valid as of the most
/// recent paint.
///
/// ```compile_fail
/// let store = winbar::BlockStore::new();
/// let id = store.create();
/// store.lock().get_mut(id).unwrap().text = String::from("B");
/// ```
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    text: String,
    color: Color,
    right_edge: i32,
    width: i32,
    hidden: bool,
    handler: Option<HandlerToken>,
    events: VecDeque<BlockEvent>,
    text_hash: Hash,
}

impl Block {
    pub(crate) fn new(id: BlockId) -> Self {
        Self {
            id,
            text: String::new(),
            color: Color::default(),
            right_edge: 0,
            width: 0,
            hidden: false,
            handler: None,
            events: VecDeque::new(),
            text_hash: blake3::hash(b""),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn right_edge(&self) -> i32 {
        self.right_edge
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn span(&self) -> Span {
        Span::from_right(self.right_edge, self.width)
    }

    pub(crate) fn record_placement(&mut self, right_edge: i32, width: i32) {
        self.right_edge = right_edge;
        self.width = width;
    }

    pub(crate) fn update_color(&mut self, color: Color) -> bool {
        if self.color == color {
            return false;
        }
        self.color = color;
        true
    }

    pub(crate) fn update_hidden(&mut self, hidden: bool) -> bool {
        if self.hidden == hidden {
            return false;
        }
        self.hidden = hidden;
        true
    }

    /// Replace the text, reporting whether the content actually changed.
    pub(crate) fn update_text(&mut self, text: &str) -> bool {
        let new_hash = blake3::hash(text.as_bytes());
        if new_hash == self.text_hash {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        self.text_hash = new_hash;
        true
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn handler(&self) -> Option<&HandlerToken> {
        self.handler.as_ref()
    }

    /// Bind a new handler (or unbind with `None`). The previous token is
    /// dropped, releasing this block's claim on it.
    pub(crate) fn replace_handler(&mut self, handler: Option<HandlerToken>) -> bool {
        let changed = match (&self.handler, &handler) {
            (Some(old), Some(new)) => !old.same_as(new),
            (None, None) => false,
            _ => true,
        };
        self.handler = handler;
        changed
    }

    pub(crate) fn push_event(&mut self, event: BlockEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn pop_event(&mut self) -> Option<BlockEvent> {
        self.events.pop_front()
    }

    pub(crate) fn clear_events(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        dropped
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_match_script_contract() {
        assert_eq!(BlockEvent::MouseDown.code(), 1);
        assert_eq!(BlockEvent::MouseUp.code(), 2);
        assert_eq!(BlockEvent::from_code(2), Some(BlockEvent::MouseUp));
        assert_eq!(BlockEvent::from_code(3), None);
    }

    #[test]
    fn color_packs_rgb() {
        let color = Color::from_rgb(0x12, 0x34, 0x56);
        assert_eq!(color.packed(), 0x123456);
        assert_eq!((color.r(), color.g(), color.b()), (0x12, 0x34, 0x56));
        assert_eq!(color.to_bgr(), 0x563412);
        assert_eq!(Color::default(), Color::WHITE);
    }

    #[test]
    fn update_text_detects_changes() {
        let mut block = Block::new(BlockId::from_raw(1));
        assert!(!block.update_text(""));
        assert!(block.update_text("CPU: 5%"));
        assert!(!block.update_text("CPU: 5%"));
        assert_eq!(block.text(), "CPU: 5%");
    }

    #[test]
    fn events_are_fifo() {
        let mut block = Block::new(BlockId::from_raw(1));
        block.push_event(BlockEvent::MouseDown);
        block.push_event(BlockEvent::MouseUp);
        block.push_event(BlockEvent::MouseDown);
        assert_eq!(block.pop_event(), Some(BlockEvent::MouseDown));
        assert_eq!(block.pop_event(), Some(BlockEvent::MouseUp));
        assert_eq!(block.pop_event(), Some(BlockEvent::MouseDown));
        assert_eq!(block.pop_event(), None);
    }

    #[test]
    fn rebinding_same_token_is_not_a_change() {
        let mut block = Block::new(BlockId::from_raw(1));
        let token = HandlerToken::new(|_: &AppContext, _: BlockId, _: BlockEvent| {});
        assert!(block.replace_handler(Some(token.clone())));
        assert!(!block.replace_handler(Some(token.clone())));
        assert!(block.replace_handler(None));
        assert!(!block.has_handler());
    }
}
