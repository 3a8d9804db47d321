//! Compositor backends.
//!
//! A backend reports windows that start demanding attention and knows how to
//! focus a window it reported.

mod hyprland;
mod x11;

use std::env;

use async_trait::async_trait;
pub use hyprland::HyprlandSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
pub use x11::X11Source;

use crate::window::Window;

/// Trait for attention event sources.
#[async_trait]
pub trait AttentionSource: Send {
    /// Short backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Wait for the next window that demands attention.
    ///
    /// Must be cancellation safe; the daemon polls it inside `select!`.
    async fn next_event(&mut self) -> Result<Window, BackendError>;

    /// Raise and focus `window`.
    async fn activate(&mut self, window: &Window) -> Result<(), BackendError>;
}

#[async_trait]
impl<T: AttentionSource + ?Sized> AttentionSource for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn next_event(&mut self) -> Result<Window, BackendError> {
        (**self).next_event().await
    }

    async fn activate(&mut self, window: &Window) -> Result<(), BackendError> {
        (**self).activate(window).await
    }
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pick from the environment.
    #[default]
    Auto,
    /// Hyprland IPC sockets.
    Hyprland,
    /// X11 with EWMH hints.
    X11,
}

impl BackendKind {
    /// Resolve `Auto` from the environment. Explicit kinds are returned as is.
    pub fn resolve(self) -> Result<Self, BackendError> {
        match self {
            Self::Auto => {
                if env_is_set("HYPRLAND_INSTANCE_SIGNATURE") {
                    Ok(Self::Hyprland)
                } else if env_is_set("DISPLAY") {
                    Ok(Self::X11)
                } else {
                    Err(BackendError::NoBackend)
                }
            }
            kind => Ok(kind),
        }
    }
}

fn env_is_set(name: &str) -> bool {
    env::var_os(name).is_some_and(|v| !v.is_empty())
}

/// Connect to the backend selected by `kind`.
pub async fn connect(kind: BackendKind) -> Result<Box<dyn AttentionSource>, BackendError> {
    let source: Box<dyn AttentionSource> = match kind.resolve()? {
        BackendKind::Hyprland => Box::new(HyprlandSource::connect().await?),
        BackendKind::X11 | BackendKind::Auto => Box::new(X11Source::connect()?),
    };
    info!("Using {} backend", source.name());
    Ok(source)
}

/// Describe the environment variables backends depend on.
pub fn get_diagnostics() -> Vec<String> {
    let mut diags = Vec::new();

    for name in ["XDG_RUNTIME_DIR", "HYPRLAND_INSTANCE_SIGNATURE", "DISPLAY", "WAYLAND_DISPLAY"] {
        match env::var(name) {
            Ok(v) => diags.push(format!("{name}={v}")),
            Err(_) => diags.push(format!("{name}: NOT SET")),
        }
    }

    diags.extend(HyprlandSource::get_diagnostics());
    diags
}

/// Errors that can occur in a backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No supported compositor detected (need HYPRLAND_INSTANCE_SIGNATURE or DISPLAY)")]
    NoBackend,

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Socket path not found: {0}")]
    SocketNotFound(String),

    #[error("Socket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compositor rejected command {command:?}: {reply}")]
    Command { command: String, reply: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("X11 error: {0}")]
    X11(String),

    #[error("Event source disconnected")]
    Disconnected,
}
