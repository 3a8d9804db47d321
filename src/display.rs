//! Host windowing interface and the in-process display that implements it.
//!
//! The attention handler only talks to [`WindowHost`]. The daemon owns a
//! [`Display`], feeds it events from a compositor backend, and drains the
//! activation requests it queues.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::window::Window;

/// Name of the only signal the display emits.
pub const WINDOW_DEMANDS_ATTENTION: &str = "window-demands-attention";

/// Callback connected to the `window-demands-attention` signal.
///
/// Receives the emitting host and the window asking for attention.
pub type AttentionCallback<H> = Rc<dyn Fn(&H, &Window)>;

/// Opaque handle identifying a connected signal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandlerId(u64);

impl SignalHandlerId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SignalHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capabilities the attention handler needs from the windowing host.
pub trait WindowHost: Sized {
    /// Connect a callback to the `window-demands-attention` signal.
    fn connect_window_demands_attention(
        &self,
        callback: AttentionCallback<Self>,
    ) -> SignalHandlerId;

    /// Disconnect a previously connected handler.
    fn disconnect(&self, id: SignalHandlerId);

    /// Raise and focus `window`.
    fn activate_window(&self, window: &Window);
}

/// Single-threaded signal hub standing in for the desktop shell's display.
///
/// Activation requests are forwarded over an unbounded channel so that
/// callbacks never block on the compositor.
pub struct Display {
    handlers: RefCell<Vec<(SignalHandlerId, AttentionCallback<Self>)>>,
    next_id: Cell<u64>,
    activations: UnboundedSender<Window>,
}

impl Display {
    /// Create a display that queues activations on `activations`.
    pub fn new(activations: UnboundedSender<Window>) -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            activations,
        }
    }

    /// Emit `window-demands-attention` to every connected handler.
    ///
    /// Handlers run in connection order. The handler list is snapshotted
    /// first, so a handler may connect or disconnect while being called.
    pub fn emit_window_demands_attention(&self, window: &Window) {
        let callbacks: Vec<AttentionCallback<Self>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        trace!(
            "Emitting {} for {} to {} handler(s)",
            WINDOW_DEMANDS_ATTENTION,
            window.id,
            callbacks.len()
        );

        for callback in callbacks {
            callback(self, window);
        }
    }

    /// Number of connected handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl WindowHost for Display {
    fn connect_window_demands_attention(
        &self,
        callback: AttentionCallback<Self>,
    ) -> SignalHandlerId {
        let id = SignalHandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, callback));
        debug!("Connected {} handler {}", WINDOW_DEMANDS_ATTENTION, id);
        id
    }

    fn disconnect(&self, id: SignalHandlerId) {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);

        if handlers.len() == before {
            warn!("No handler with id {} was connected", id);
        } else {
            debug!("Disconnected {} handler {}", WINDOW_DEMANDS_ATTENTION, id);
        }
    }

    fn activate_window(&self, window: &Window) {
        if self.activations.send(window.clone()).is_err() {
            warn!(
                "Activation queue closed, dropping activation of {}",
                window.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowId;
    use tokio::sync::mpsc;

    fn window(title: &str) -> Window {
        Window::new(WindowId::X11(7), Some(title.to_string()))
    }

    #[test]
    fn test_connect_assigns_distinct_ids() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);

        let a = display.connect_window_demands_attention(Rc::new(|_: &Display, _: &Window| {}));
        let b = display.connect_window_demands_attention(Rc::new(|_: &Display, _: &Window| {}));

        assert_ne!(a, b);
        assert_eq!(display.handler_count(), 2);
    }

    #[test]
    fn test_emit_calls_handlers_in_order() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            display.connect_window_demands_attention(Rc::new(move |_: &Display, w: &Window| {
                seen.borrow_mut()
                    .push(format!("{tag}:{}", w.display_title()));
            }));
        }

        display.emit_window_demands_attention(&window("Terminal"));

        assert_eq!(
            *seen.borrow(),
            vec!["first:Terminal".to_string(), "second:Terminal".to_string()]
        );
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let id = display.connect_window_demands_attention(Rc::new(move |_: &Display, _: &Window| {
            counter.set(counter.get() + 1);
        }));

        display.emit_window_demands_attention(&window("a"));
        display.disconnect(id);
        display.emit_window_demands_attention(&window("b"));

        assert_eq!(calls.get(), 1);
        assert_eq!(display.handler_count(), 0);
    }

    #[test]
    fn test_disconnect_unknown_id_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);
        display.connect_window_demands_attention(Rc::new(|_: &Display, _: &Window| {}));

        display.disconnect(SignalHandlerId::from_raw(99));
        assert_eq!(display.handler_count(), 1);
    }

    #[test]
    fn test_handler_may_disconnect_during_emit() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);
        let own_id: Rc<Cell<Option<SignalHandlerId>>> = Rc::new(Cell::new(None));

        let slot = Rc::clone(&own_id);
        let id = display.connect_window_demands_attention(Rc::new(move |d: &Display, _: &Window| {
            if let Some(id) = slot.take() {
                d.disconnect(id);
            }
        }));
        own_id.set(Some(id));

        display.emit_window_demands_attention(&window("a"));
        assert_eq!(display.handler_count(), 0);
    }

    #[test]
    fn test_activate_window_queues_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let display = Display::new(tx);

        display.activate_window(&window("Terminal"));

        assert_eq!(rx.try_recv().unwrap(), window("Terminal"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_activate_window_with_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let display = Display::new(tx);

        // Must not panic.
        display.activate_window(&window("Terminal"));
    }
}
