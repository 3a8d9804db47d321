//! Attention handler: focus windows that demand attention unless blocklisted.

use std::rc::Rc;

use tracing::{debug, info};

use crate::blocklist::Blocklist;
use crate::display::{AttentionCallback, SignalHandlerId, WindowHost};
use crate::window::Window;

/// Bridges the host's `window-demands-attention` signal to its focus action.
///
/// Starts disabled. [`enable`](Self::enable) connects to the host and
/// [`disable`](Self::disable) disconnects; both are idempotent.
pub struct AttentionHandler<H: WindowHost> {
    host: Rc<H>,
    blocklist: Rc<Blocklist>,
    /// Built once so every `enable` connects the same callback.
    callback: AttentionCallback<H>,
    subscription: Option<SignalHandlerId>,
}

impl<H: WindowHost + 'static> AttentionHandler<H> {
    /// Create a disabled handler for `host` filtering with `blocklist`.
    pub fn new(host: Rc<H>, blocklist: Blocklist) -> Self {
        let blocklist = Rc::new(blocklist);
        let filter = Rc::clone(&blocklist);
        let callback: AttentionCallback<H> = Rc::new(move |display: &H, window: &Window| {
            on_window_demands_attention(&filter, display, window);
        });

        Self {
            host,
            blocklist,
            callback,
            subscription: None,
        }
    }

    /// Connect to the host's `window-demands-attention` signal.
    ///
    /// Calling this while already enabled does nothing.
    pub fn enable(&mut self) {
        if let Some(id) = self.subscription {
            debug!("Attention handler already enabled (handler {})", id);
            return;
        }

        let id = self
            .host
            .connect_window_demands_attention(Rc::clone(&self.callback));
        info!(
            "Attention handler enabled (handler {}, {} blocklist entries)",
            id,
            self.blocklist.len()
        );
        self.subscription = Some(id);
    }

    /// Disconnect from the host. Does nothing when not enabled.
    pub fn disable(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };

        info!("Removing attention handler {}", id);
        self.host.disconnect(id);
    }
}

impl<H: WindowHost> AttentionHandler<H> {
    /// Returns true while connected to the host.
    pub fn is_enabled(&self) -> bool {
        self.subscription.is_some()
    }

    /// The live subscription handle, if any.
    pub fn subscription(&self) -> Option<SignalHandlerId> {
        self.subscription
    }

    /// Returns true if focusing `window` should be skipped.
    pub fn is_blocklisted(&self, window: &Window) -> bool {
        is_blocklisted(&self.blocklist, window)
    }
}

fn on_window_demands_attention<H: WindowHost>(blocklist: &Blocklist, display: &H, window: &Window) {
    if is_blocklisted(blocklist, window) {
        debug!("Skip focusing {:?}", window.display_title());
        return;
    }

    debug!("Focusing {:?}", window.display_title());
    display.activate_window(window);
}

/// Untitled windows are never blocklisted.
fn is_blocklisted(blocklist: &Blocklist, window: &Window) -> bool {
    window
        .title
        .as_deref()
        .is_some_and(|title| blocklist.matches(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Display;
    use crate::window::WindowId;
    use std::cell::RefCell;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn setup(entries: &[&str]) -> (Rc<Display>, AttentionHandler<Display>, UnboundedReceiver<Window>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let display = Rc::new(Display::new(tx));
        let handler = AttentionHandler::new(Rc::clone(&display), Blocklist::new(entries));
        (display, handler, rx)
    }

    fn window(id: u32, title: &str) -> Window {
        Window::new(WindowId::X11(id), Some(title.to_string()))
    }

    fn drain(rx: &mut UnboundedReceiver<Window>) -> Vec<Window> {
        let mut out = Vec::new();
        while let Ok(w) = rx.try_recv() {
            out.push(w);
        }
        out
    }

    /// Host that records every call instead of dispatching.
    #[derive(Default)]
    struct RecordingHost {
        next_id: RefCell<u64>,
        connected: RefCell<Vec<SignalHandlerId>>,
        disconnected: RefCell<Vec<SignalHandlerId>>,
        activated: RefCell<Vec<Window>>,
        callbacks: RefCell<Vec<AttentionCallback<Self>>>,
    }

    impl WindowHost for RecordingHost {
        fn connect_window_demands_attention(
            &self,
            callback: AttentionCallback<Self>,
        ) -> SignalHandlerId {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            let id = SignalHandlerId::from_raw(*next);
            self.connected.borrow_mut().push(id);
            self.callbacks.borrow_mut().push(callback);
            id
        }

        fn disconnect(&self, id: SignalHandlerId) {
            self.disconnected.borrow_mut().push(id);
        }

        fn activate_window(&self, window: &Window) {
            self.activated.borrow_mut().push(window.clone());
        }
    }

    #[test]
    fn test_starts_disabled() {
        let (display, handler, _rx) = setup(&[]);
        assert!(!handler.is_enabled());
        assert_eq!(handler.subscription(), None);
        assert_eq!(display.handler_count(), 0);
    }

    #[test]
    fn test_spotify_scenario() {
        let (display, mut handler, mut rx) = setup(&["spotify"]);
        handler.enable();

        display.emit_window_demands_attention(&window(1, "Spotify Premium"));
        assert!(drain(&mut rx).is_empty());

        let terminal = window(2, "Terminal");
        display.emit_window_demands_attention(&terminal);
        assert_eq!(drain(&mut rx), vec![terminal]);
    }

    #[test]
    fn test_case_insensitive_blocklist() {
        let (display, mut handler, mut rx) = setup(&["Zoom"]);
        handler.enable();

        display.emit_window_demands_attention(&window(1, "zoom — meeting"));
        display.emit_window_demands_attention(&window(2, "ZOOM CALL"));

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_empty_blocklist_focuses_everything() {
        let (display, mut handler, mut rx) = setup(&[]);
        handler.enable();

        let windows = vec![window(1, "Spotify"), window(2, "Terminal"), window(3, "")];
        for w in &windows {
            display.emit_window_demands_attention(w);
        }

        assert_eq!(drain(&mut rx), windows);
    }

    #[test]
    fn test_untitled_window_is_focused() {
        let (display, mut handler, mut rx) = setup(&["spotify"]);
        handler.enable();

        let untitled = Window::new(WindowId::Hyprland("abc".to_string()), None);
        assert!(!handler.is_blocklisted(&untitled));

        display.emit_window_demands_attention(&untitled);
        assert_eq!(drain(&mut rx), vec![untitled]);
    }

    #[test]
    fn test_disabled_handler_ignores_events() {
        let (display, mut handler, mut rx) = setup(&[]);
        handler.enable();
        handler.disable();

        display.emit_window_demands_attention(&window(1, "Terminal"));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_enable_disable_resets_subscription() {
        let (display, mut handler, _rx) = setup(&[]);

        handler.enable();
        assert!(handler.is_enabled());
        assert_eq!(display.handler_count(), 1);

        handler.disable();
        assert_eq!(handler.subscription(), None);
        assert_eq!(display.handler_count(), 0);
    }

    #[test]
    fn test_disable_twice_is_idempotent() {
        let host = Rc::new(RecordingHost::default());
        let mut handler = AttentionHandler::new(Rc::clone(&host), Blocklist::default());

        handler.enable();
        handler.disable();
        handler.disable();

        assert_eq!(handler.subscription(), None);
        assert_eq!(host.disconnected.borrow().len(), 1);
    }

    #[test]
    fn test_disable_without_enable_touches_nothing() {
        let host = Rc::new(RecordingHost::default());
        let mut handler = AttentionHandler::new(Rc::clone(&host), Blocklist::default());

        handler.disable();

        assert!(host.connected.borrow().is_empty());
        assert!(host.disconnected.borrow().is_empty());
    }

    #[test]
    fn test_double_enable_keeps_single_subscription() {
        let (display, mut handler, mut rx) = setup(&[]);

        handler.enable();
        let first = handler.subscription();
        handler.enable();

        assert_eq!(handler.subscription(), first);
        assert_eq!(display.handler_count(), 1);

        display.emit_window_demands_attention(&window(1, "Terminal"));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_reenable_reuses_callback() {
        let host = Rc::new(RecordingHost::default());
        let mut handler = AttentionHandler::new(Rc::clone(&host), Blocklist::default());

        handler.enable();
        handler.disable();
        handler.enable();

        let callbacks = host.callbacks.borrow();
        assert_eq!(callbacks.len(), 2);
        assert!(Rc::ptr_eq(&callbacks[0], &callbacks[1]));
        assert_eq!(host.disconnected.borrow().as_slice(), &host.connected.borrow()[..1]);
    }

    #[test]
    fn test_callback_activates_through_passed_display() {
        let host = Rc::new(RecordingHost::default());
        let mut handler = AttentionHandler::new(Rc::clone(&host), Blocklist::new(["mail"]));
        handler.enable();

        let callback = Rc::clone(&host.callbacks.borrow()[0]);
        callback(&*host, &window(1, "Inbox - Mail"));
        callback(&*host, &window(2, "Editor"));

        assert_eq!(host.activated.borrow().as_slice(), &[window(2, "Editor")]);
    }
}
