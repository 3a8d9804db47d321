//! Hyprland IPC backend.
//!
//! Reads `urgent` events from socket2, resolves titles through the command
//! socket with `j/clients`, and focuses with `dispatch focuswindow`.

use super::{AttentionSource, BackendError};
use crate::window::{Window, WindowId};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tracing::{debug, info, trace, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Hyprland attention source.
pub struct HyprlandSource {
    command_socket: PathBuf,
    event_socket: PathBuf,
    lines: Option<Lines<BufReader<UnixStream>>>,
    /// Urgent address read from socket2 whose title lookup has not finished.
    pending: Option<String>,
    backoff: Duration,
}

impl HyprlandSource {
    /// Connect using the sockets of the running Hyprland instance.
    pub async fn connect() -> Result<Self, BackendError> {
        let dir = get_instance_dir()?;
        Self::with_sockets(dir.join(".socket.sock"), dir.join(".socket2.sock")).await
    }

    /// Connect to explicit command and event socket paths.
    pub async fn with_sockets(
        command_socket: PathBuf,
        event_socket: PathBuf,
    ) -> Result<Self, BackendError> {
        info!("Connecting to Hyprland socket2: {}", event_socket.display());
        let lines = open_event_stream(&event_socket).await?;
        info!("Connected to Hyprland socket2");

        Ok(Self {
            command_socket,
            event_socket,
            lines: Some(lines),
            pending: None,
            backoff: INITIAL_BACKOFF,
        })
    }

    /// Get diagnostic information about the Hyprland sockets.
    pub fn get_diagnostics() -> Vec<String> {
        match get_instance_dir() {
            Ok(dir) => vec![format!("Hyprland sockets: {} (exists)", dir.display())],
            Err(e) => vec![format!("Hyprland sockets: {e}")],
        }
    }

    /// Reconnect to the event socket, retrying until it succeeds.
    ///
    /// The backoff lives in `self`, so a cancelled call resumes with the
    /// same delay.
    async fn reconnect(&mut self) {
        loop {
            warn!(
                "Socket2 connection lost. Retrying in {:?}...",
                self.backoff
            );

            tokio::time::sleep(self.backoff).await;

            // Exponential backoff with cap
            self.backoff = std::cmp::min(self.backoff * 2, MAX_BACKOFF);

            match open_event_stream(&self.event_socket).await {
                Ok(lines) => {
                    info!("Reconnected to Hyprland socket2");
                    self.lines = Some(lines);
                    self.backoff = INITIAL_BACKOFF; // Reset backoff on success
                    return;
                }
                Err(e) => debug!("Reconnect failed: {}", e),
            }
        }
    }

    /// Send a command on the command socket and return the reply.
    async fn request(&self, command: &str) -> Result<String, BackendError> {
        let mut stream = UnixStream::connect(&self.command_socket)
            .await
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        stream.write_all(command.as_bytes()).await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        trace!("Reply to {:?}: {} bytes", command, reply.len());
        Ok(reply)
    }

    /// Look up a window by address in `j/clients`.
    async fn resolve_window(&self, address: &str) -> Result<Option<Window>, BackendError> {
        let reply = self.request("j/clients").await?;
        let clients = parse_clients(&reply)?;

        Ok(clients
            .into_iter()
            .find(|c| normalize_address(&c.address) == address)
            .map(|c| {
                Window::new(
                    WindowId::Hyprland(address.to_string()),
                    Some(c.title),
                )
            }))
    }
}

#[async_trait]
impl AttentionSource for HyprlandSource {
    fn name(&self) -> &'static str {
        "hyprland-ipc"
    }

    async fn next_event(&mut self) -> Result<Window, BackendError> {
        loop {
            // Finish a lookup interrupted by cancellation before reading more
            if let Some(address) = self.pending.clone() {
                let resolved = self.resolve_window(&address).await;
                self.pending = None;

                match resolved {
                    Ok(Some(window)) => {
                        debug!(
                            "Window {} demands attention: {:?}",
                            window.id,
                            window.display_title()
                        );
                        return Ok(window);
                    }
                    Ok(None) => {
                        debug!("Urgent window 0x{} is no longer mapped", address);
                    }
                    Err(e) => {
                        warn!("Failed to resolve urgent window 0x{}: {}", address, e);
                    }
                }
                continue;
            }

            let Some(lines) = &mut self.lines else {
                self.reconnect().await;
                continue;
            };

            match lines.next_line().await {
                Ok(None) => {
                    // EOF - socket closed
                    warn!("Socket2 stream ended (EOF)");
                    self.lines = None;
                }
                Ok(Some(line)) => {
                    trace!("Received line: {}", line);
                    if let HyprlandEvent::Urgent { address } = parse_event_line(&line) {
                        self.pending = Some(address);
                    }
                }
                Err(e) => {
                    warn!("Read error: {}", e);
                    self.lines = None;
                }
            }
        }
    }

    async fn activate(&mut self, window: &Window) -> Result<(), BackendError> {
        let WindowId::Hyprland(address) = &window.id else {
            return Err(BackendError::Protocol(format!(
                "Hyprland cannot focus foreign window {}",
                window.id
            )));
        };

        // Reply is "ok" on success, an error message otherwise
        let command = format!("dispatch focuswindow address:0x{address}");
        let reply = self.request(&command).await?;

        if reply.trim() == "ok" {
            debug!("Focused window 0x{}", address);
            Ok(())
        } else {
            Err(BackendError::Command {
                command,
                reply: reply.trim().to_string(),
            })
        }
    }
}

async fn open_event_stream(path: &Path) -> Result<Lines<BufReader<UnixStream>>, BackendError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;
    Ok(BufReader::new(stream).lines())
}

/// Get the directory holding the running instance's sockets.
fn get_instance_dir() -> Result<PathBuf, BackendError> {
    let xdg_runtime_dir = env::var("XDG_RUNTIME_DIR")
        .map_err(|_| BackendError::EnvVarNotSet("XDG_RUNTIME_DIR".to_string()))?;

    let hyprland_sig = env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| BackendError::EnvVarNotSet("HYPRLAND_INSTANCE_SIGNATURE".to_string()))?;

    let dir = PathBuf::from(&xdg_runtime_dir).join("hypr").join(&hyprland_sig);

    if !dir.join(".socket2.sock").exists() {
        return Err(BackendError::SocketNotFound(format!("{}", dir.display())));
    }

    Ok(dir)
}

/// Parsed IPC event from socket2.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HyprlandEvent {
    /// urgent>>WINDOWADDRESS
    Urgent { address: String },
    /// Other events we don't care about.
    Other,
}

/// Parse a single line from the socket2 stream.
///
/// Format: EVENT>>DATA
fn parse_event_line(line: &str) -> HyprlandEvent {
    let line = line.trim_end();

    // Split on first ">>" to get event name and data
    let Some((event_name, data)) = line.split_once(">>") else {
        trace!("Ignoring malformed line (no >>): {}", line);
        return HyprlandEvent::Other;
    };

    match event_name {
        "urgent" => {
            // Data format: WINDOWADDRESS (hex, usually without 0x)
            let address = normalize_address(data);
            if address.is_empty() {
                trace!("Ignoring urgent event without address");
                HyprlandEvent::Other
            } else {
                HyprlandEvent::Urgent {
                    address: address.to_string(),
                }
            }
        }
        _ => HyprlandEvent::Other,
    }
}

/// Strip whitespace and an optional `0x` prefix.
fn normalize_address(address: &str) -> &str {
    let address = address.trim();
    address.strip_prefix("0x").unwrap_or(address)
}

/// Entry of the `j/clients` reply. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct Client {
    address: String,
    #[serde(default)]
    title: String,
}

fn parse_clients(reply: &str) -> Result<Vec<Client>, BackendError> {
    serde_json::from_str(reply)
        .map_err(|e| BackendError::Protocol(format!("Invalid j/clients reply: {e}")))
}
