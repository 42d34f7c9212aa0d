use std::time::Duration;

use thiserror::Error;

use crate::block::BlockId;

/// Unified result type for the winbar crate.
pub type Result<T> = std::result::Result<T, BarError>;

/// Errors surfaced by the block store, the render engine and the dispatcher.
#[derive(Debug, Error)]
pub enum BarError {
    #[error("block `{0}` not found")]
    BlockNotFound(BlockId),
    #[error("color component `{component}` out of range: {value}")]
    InvalidColor { component: &'static str, value: i64 },
    #[error("host container not found: {0}")]
    ContainerNotFound(String),
    #[error("failed to register window class: {0}")]
    ClassRegistration(String),
    #[error("failed to create surface: {0}")]
    SurfaceCreation(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("surface backend error: {0}")]
    Backend(String),
    #[error("failed to spawn ui thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("ui thread did not report startup within {0:?}")]
    StartupTimeout(Duration),
    #[error("ui thread did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("ui thread panicked")]
    EnginePanicked,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BarError {
    /// True for failures that prevent the engine from ever creating its surface.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            BarError::ContainerNotFound(_)
                | BarError::ClassRegistration(_)
                | BarError::SurfaceCreation(_)
                | BarError::StartupTimeout(_)
        )
    }
}
