//! winbar
//!
//! Starts the bar with two demo blocks: an uptime counter refreshed by a
//! timer, and a click counter. On Windows the bar docks into the taskbar; on
//! other platforms it occupies the bottom row of the terminal (`q` exits).
//!
//! ```bash
//! WINBAR_LOG=/tmp/winbar.log WINBAR_LOG_LEVEL=debug cargo run --bin winbar
//! ```
//!
//! Without `WINBAR_LOG`, warnings and errors go to stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;
use winbar::logging::{emit, json_kv};
use winbar::{
    AppContext, BarConfig, BlockEvent, BlockId, BlockStore, Dispatcher, LogLevel, RenderEngine,
    Result,
};

const UPTIME_REFRESH: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let mut config = BarConfig::from_env()?.or_stderr_logger(LogLevel::Warn);
    config.enable_metrics();

    let store = Arc::new(BlockStore::new());
    let engine = start_engine(config.clone(), Arc::clone(&store))?;

    let mut ctx = AppContext::for_engine(&engine);
    if let Some(logger) = config.logger.clone() {
        ctx = ctx.with_logger(logger);
    }

    let clicks = ctx.create_block();
    ctx.set_text(clicks, "clicks: 0")?;
    ctx.set_color(clicks, 0x9c, 0xdc, 0xfe)?;
    let count = Arc::new(AtomicU64::new(0));
    ctx.set_handler(clicks, {
        let count = Arc::clone(&count);
        move |ctx: &AppContext, block: BlockId, event: BlockEvent| {
            if event != BlockEvent::MouseUp {
                return;
            }
            let total = count.fetch_add(1, Ordering::Relaxed) + 1;
            if let Err(err) = ctx.set_text(block, &format!("clicks: {total}")) {
                emit(
                    ctx.logger(),
                    LogLevel::Warn,
                    "winbar::demo",
                    "click_update_failed",
                    [json_kv("error", json!(err.to_string()))],
                );
            }
        }
    })?;

    let uptime = ctx.create_block();
    ctx.set_color(uptime, 0xd7, 0xba, 0x7d)?;
    refresh_uptime(&ctx, uptime, Instant::now());

    let mut dispatcher = Dispatcher::from_config(ctx, &config);
    let status = engine.status();
    dispatcher.run_until(|| !status.is_running());

    engine.shutdown()
}

fn refresh_uptime(ctx: &AppContext, block: BlockId, started: Instant) {
    let secs = started.elapsed().as_secs();
    let text = format!("up {:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    if ctx.set_text(block, &text).is_err() {
        return;
    }
    ctx.schedule(UPTIME_REFRESH, move |ctx: &AppContext| {
        refresh_uptime(ctx, block, started)
    });
}

#[cfg(windows)]
fn start_engine(config: BarConfig, store: Arc<BlockStore>) -> Result<RenderEngine> {
    RenderEngine::start(config, store, winbar::surface::Win32Surface::factory())
}

#[cfg(not(windows))]
fn start_engine(config: BarConfig, store: Arc<BlockStore>) -> Result<RenderEngine> {
    RenderEngine::start(config, store, winbar::TerminalSurface::factory())
}
