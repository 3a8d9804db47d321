//! Daemon event loop: feeds backend events into the display and performs
//! the activations the attention handler queues.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info, warn};

use crate::backend::{AttentionSource, BackendError};
use crate::blocklist::Blocklist;
use crate::display::Display;
use crate::handler::AttentionHandler;
use crate::window::Window;

/// Delay before reconnecting after the event source fails.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Runtime switches for the daemon loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonOptions {
    /// Log activations instead of performing them.
    pub dry_run: bool,
    /// Print attention events to stdout.
    pub print_events: bool,
}

/// Owns the display, the attention handler and the activation queue.
pub struct Daemon {
    display: Rc<Display>,
    handler: AttentionHandler<Display>,
    activations: UnboundedReceiver<Window>,
    options: DaemonOptions,
}

impl Daemon {
    pub fn new(blocklist: Blocklist, options: DaemonOptions) -> Self {
        let (activation_tx, activations) = mpsc::unbounded_channel();
        let display = Rc::new(Display::new(activation_tx));
        let handler = AttentionHandler::new(Rc::clone(&display), blocklist);

        Self {
            display,
            handler,
            activations,
            options,
        }
    }

    /// Whether the attention handler is currently subscribed.
    pub fn is_enabled(&self) -> bool {
        self.handler.is_enabled()
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Run until `shutdown` resolves or connecting to the compositor fails.
    ///
    /// `connect` is called for the first source and again after a source
    /// reports an error. The handler is enabled for the duration of the call
    /// and disabled before returning.
    pub async fn run<C, Fut, S, F>(&mut self, mut connect: C, shutdown: F) -> Result<()>
    where
        C: FnMut() -> Fut,
        Fut: Future<Output = Result<S, BackendError>>,
        S: AttentionSource,
        F: Future<Output = Result<()>>,
    {
        tokio::pin!(shutdown);

        self.handler.enable();
        info!("Daemon started, waiting for windows demanding attention...");

        let result = 'daemon: loop {
            let mut source = match connect().await {
                Ok(source) => source,
                Err(e) => {
                    break Err(anyhow::Error::new(e).context("Failed to connect to compositor"));
                }
            };

            loop {
                tokio::select! {
                    res = &mut shutdown => {
                        info!("Shutting down");
                        break 'daemon res;
                    }

                    event = source.next_event() => {
                        match event {
                            Ok(window) => {
                                if self.options.print_events {
                                    println!(
                                        "[ATTENTION] | window_id={} title={:?}",
                                        window.id, window.title
                                    );
                                }
                                self.display.emit_window_demands_attention(&window);
                            }
                            Err(e) => {
                                error!("Attention event error: {}", e);
                                break; // Reconnect
                            }
                        }
                    }

                    Some(window) = self.activations.recv() => {
                        activate(&mut source, &window, self.options.dry_run).await;
                    }
                }
            }

            // Wait before reconnecting, but stay responsive to shutdown
            tokio::select! {
                res = &mut shutdown => {
                    info!("Shutting down");
                    break 'daemon res;
                }
                () = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        };

        self.handler.disable();
        result
    }
}

/// Ask the backend to focus `window`.
async fn activate<S: AttentionSource + ?Sized>(source: &mut S, window: &Window, dry_run: bool) {
    if dry_run {
        info!(
            "[dry-run] Would focus {} ({:?})",
            window.id,
            window.display_title()
        );
        return;
    }

    match source.activate(window).await {
        Ok(()) => info!("Focused {} ({:?})", window.id, window.display_title()),
        Err(BackendError::Command { reply, .. }) => {
            warn!("Compositor refused to focus {}: {}", window.id, reply);
        }
        Err(e) => warn!("Failed to focus {}: {}", window.id, e),
    }
}
