use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::json;

use crate::command::{CommandQueue, FontSpec};
use crate::config::BarConfig;
use crate::error::{BarError, Result};
use crate::geometry::Size;
use crate::logging::{LogLevel, Logger, emit, json_kv};
use crate::store::BlockStore;
use crate::surface::SurfaceFactory;

use super::ENGINE_TARGET;
use super::ui::UiLoop;

/// State the UI thread publishes for other threads to read.
#[derive(Debug, Default)]
pub struct EngineStatus {
    running: AtomicBool,
    width: AtomicI32,
    height: AtomicI32,
}

impl EngineStatus {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn surface_size(&self) -> Size {
        Size::new(
            self.width.load(Ordering::Acquire),
            self.height.load(Ordering::Acquire),
        )
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn set_size(&self, size: Size) {
        self.width.store(size.width, Ordering::Release);
        self.height.store(size.height, Ordering::Release);
    }
}

/// Handle to the bar's UI thread.
///
/// Commands are safe to issue from any thread. Dropping the handle stops the
/// thread with the configured bounded wait; call [`RenderEngine::shutdown`]
/// to observe the outcome.
pub struct RenderEngine {
    commands: Arc<CommandQueue>,
    store: Arc<BlockStore>,
    status: Arc<EngineStatus>,
    thread: Option<JoinHandle<()>>,
    exited: Receiver<()>,
    shutdown_timeout: Duration,
    logger: Option<Logger>,
}

impl RenderEngine {
    /// Spawn the UI thread and wait for it to open its surface.
    ///
    /// Startup failures (container missing, registration or creation failing)
    /// are returned here; no thread is left running in that case.
    pub fn start<F>(config: BarConfig, store: Arc<BlockStore>, factory: F) -> Result<Self>
    where
        F: SurfaceFactory,
    {
        let commands = Arc::new(CommandQueue::new());
        let status = Arc::new(EngineStatus::default());
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Size>>();
        let (exit_tx, exit_rx) = mpsc::channel::<()>();

        let startup_timeout = config.startup_timeout;
        let shutdown_timeout = config.shutdown_timeout;
        let logger = config.logger.clone();

        let ui = UiLoop::new(
            config,
            Arc::clone(&store),
            Arc::clone(&commands),
            Arc::clone(&status),
        );
        let factory: Box<dyn SurfaceFactory> = Box::new(factory);
        let thread = thread::Builder::new()
            .name("winbar-ui".to_string())
            .spawn(move || {
                ui.run(factory, ready_tx);
                let _ = exit_tx.send(());
            })
            .map_err(BarError::ThreadSpawn)?;

        let mut engine = Self {
            commands,
            store,
            status,
            thread: Some(thread),
            exited: exit_rx,
            shutdown_timeout,
            logger,
        };

        match ready_rx.recv_timeout(startup_timeout) {
            Ok(Ok(_size)) => Ok(engine),
            Ok(Err(err)) => {
                let _ = engine.stop_and_join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = engine.stop_and_join();
                Err(BarError::StartupTimeout(startup_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = engine.stop_and_join();
                Err(BarError::EnginePanicked)
            }
        }
    }

    pub fn request_redraw(&self) {
        self.commands.request_redraw();
    }

    pub fn request_font_change(&self, name: impl Into<String>, size: i32) {
        self.commands.request_font_change(FontSpec::new(name, size));
    }

    /// Ask the UI thread to stop at its next tick without waiting for it.
    pub fn request_stop(&self) {
        self.commands.request_stop();
    }

    pub fn commands(&self) -> Arc<CommandQueue> {
        Arc::clone(&self.commands)
    }

    pub fn store(&self) -> Arc<BlockStore> {
        Arc::clone(&self.store)
    }

    pub fn status(&self) -> Arc<EngineStatus> {
        Arc::clone(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn surface_size(&self) -> Size {
        self.status.surface_size()
    }

    /// Stop the UI thread and wait for it, bounded by the shutdown timeout.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.commands.request_stop();

        match self.exited.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                emit(
                    self.logger.as_ref(),
                    LogLevel::Error,
                    ENGINE_TARGET,
                    "shutdown_timeout",
                    [json_kv(
                        "timeout_ms",
                        json!(self.shutdown_timeout.as_millis() as u64),
                    )],
                );
                // The thread is detached; it still exits once its tick observes the stop flag.
                return Err(BarError::ShutdownTimeout(self.shutdown_timeout));
            }
        }

        thread.join().map_err(|_| BarError::EnginePanicked)
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("status", &self.status)
            .field("commands", &self.commands.pending())
            .finish_non_exhaustive()
    }
}
