//! X11 backend using EWMH hints.
//!
//! A watcher thread follows `_NET_CLIENT_LIST` and reports clients whose
//! `_NET_WM_STATE` gains `_NET_WM_STATE_DEMANDS_ATTENTION` or whose
//! `WM_HINTS` gain the urgency flag. Focusing sends a `_NET_ACTIVE_WINDOW`
//! client message to the root window.

use super::{AttentionSource, BackendError};
use crate::window::{Window, WindowId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConnectionExt, EventMask,
    PropertyNotifyEvent,
};
use x11rb::rust_connection::RustConnection;

/// How long the watcher sleeps when no X11 event is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `UrgencyHint` flag of ICCCM `WM_HINTS`.
const URGENCY_HINT: u32 = 1 << 8;

/// EWMH source indication for requests from pagers and similar tools.
const SOURCE_PAGER: u32 = 2;

/// X11 attention source.
pub struct X11Source {
    conn: RustConnection,
    root: u32,
    atoms: X11Atoms,
    events: mpsc::UnboundedReceiver<Result<Window, BackendError>>,
    stop: Arc<AtomicBool>,
}

impl X11Source {
    /// Connect to the X server named by `DISPLAY` and start watching.
    pub fn connect() -> Result<Self, BackendError> {
        let (conn, screen_num) = connect_to_x11()?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = setup_atoms(&conn)?;

        let (tx, events) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        std::thread::Builder::new()
            .name("x11-attention".to_string())
            .spawn(move || {
                if let Err(e) = watch(&tx, &thread_stop) {
                    let _ = tx.send(Err(e));
                }
            })?;

        info!("Watching X11 root window 0x{:x}", root);

        Ok(Self {
            conn,
            root,
            atoms,
            events,
            stop,
        })
    }
}

impl Drop for X11Source {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[async_trait]
impl AttentionSource for X11Source {
    fn name(&self) -> &'static str {
        "x11-ewmh"
    }

    async fn next_event(&mut self) -> Result<Window, BackendError> {
        match self.events.recv().await {
            Some(event) => event,
            None => Err(BackendError::Disconnected),
        }
    }

    async fn activate(&mut self, window: &Window) -> Result<(), BackendError> {
        let WindowId::X11(xid) = window.id else {
            return Err(BackendError::Protocol(format!(
                "X11 cannot focus foreign window {}",
                window.id
            )));
        };

        let event = ClientMessageEvent::new(
            32,
            xid,
            self.atoms.net_active_window,
            [SOURCE_PAGER, x11rb::CURRENT_TIME, 0, 0, 0],
        );

        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(|e| BackendError::X11(format!("Failed to send _NET_ACTIVE_WINDOW: {e}")))?;
        flush_connection(&self.conn)?;

        debug!("Requested activation of window 0x{:x}", xid);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct X11Atoms {
    net_active_window: u32,
    net_client_list: u32,
    net_wm_state: u32,
    net_wm_state_demands_attention: u32,
    net_wm_name: u32,
    utf8_string: u32,
}

/// Watcher loop run on a dedicated thread with its own connection.
fn watch(
    tx: &mpsc::UnboundedSender<Result<Window, BackendError>>,
    stop: &AtomicBool,
) -> Result<(), BackendError> {
    let (conn, screen_num) = connect_to_x11()?;
    let root = conn.setup().roots[screen_num].root;
    let atoms = setup_atoms(&conn)?;

    select_property_changes(&conn, root)?;

    let mut tracker = AttentionTracker::default();
    sync_clients(&conn, root, &atoms, &mut tracker)?;
    flush_connection(&conn)?;

    loop {
        if stop.load(Ordering::Acquire) || tx.is_closed() {
            debug!("X11 watcher stopping");
            return Ok(());
        }

        let event = match conn.poll_for_event() {
            Ok(Some(e)) => e,
            Ok(None) => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => return Err(BackendError::X11(e.to_string())),
        };

        let Event::PropertyNotify(PropertyNotifyEvent { atom, window, .. }) = event else {
            continue;
        };

        if window == root {
            if atom == atoms.net_client_list {
                sync_clients(&conn, root, &atoms, &mut tracker)?;
                flush_connection(&conn)?;
            }
            continue;
        }

        if atom != atoms.net_wm_state && atom != u32::from(AtomEnum::WM_HINTS) {
            continue;
        }

        let Ok(wants_attention) = window_wants_attention(&conn, window, &atoms) else {
            trace!("Window 0x{:x} vanished before its state could be read", window);
            tracker.forget(window);
            continue;
        };

        if tracker.update(window, wants_attention) {
            let title = get_window_name(&conn, window, &atoms).unwrap_or_else(|e| {
                debug!("Failed to get window title for 0x{:x}: {}", window, e);
                None
            });

            debug!("Window 0x{:x} demands attention: {:?}", window, title);
            if tx.send(Ok(Window::new(WindowId::X11(window), title))).is_err() {
                return Ok(());
            }
        }
    }
}

/// Rising-edge detector for per-window attention state.
#[derive(Debug, Default)]
struct AttentionTracker {
    windows: HashMap<u32, bool>,
}

impl AttentionTracker {
    /// Record the state of `window`, returning true when it just started
    /// wanting attention.
    fn update(&mut self, window: u32, wants_attention: bool) -> bool {
        let previous = self.windows.insert(window, wants_attention);
        wants_attention && previous != Some(true)
    }

    /// Start tracking `window` without reporting its current state.
    fn track(&mut self, window: u32, wants_attention: bool) {
        self.windows.insert(window, wants_attention);
    }

    fn forget(&mut self, window: u32) {
        self.windows.remove(&window);
    }

    fn is_tracked(&self, window: u32) -> bool {
        self.windows.contains_key(&window)
    }

    /// Drop windows that are no longer managed. Returns the new ones.
    fn retain_clients(&mut self, clients: &[u32]) -> Vec<u32> {
        let current: HashSet<u32> = clients.iter().copied().collect();
        self.windows.retain(|w, _| current.contains(w));
        clients
            .iter()
            .copied()
            .filter(|w| !self.is_tracked(*w))
            .collect()
    }
}

/// Refresh the tracked client set from `_NET_CLIENT_LIST`.
fn sync_clients<C: Connection>(
    conn: &C,
    root: u32,
    atoms: &X11Atoms,
    tracker: &mut AttentionTracker,
) -> Result<(), BackendError> {
    let clients = get_client_list(conn, root, atoms.net_client_list)?;

    for window in tracker.retain_clients(&clients) {
        if select_property_changes(conn, window).is_err() {
            continue;
        }
        // Windows that were already urgent before we saw them are not reported.
        let wants_attention = window_wants_attention(conn, window, atoms).unwrap_or(false);
        tracker.track(window, wants_attention);
    }

    trace!("Tracking {} X11 clients", clients.len());
    Ok(())
}

fn window_wants_attention<C: Connection>(
    conn: &C,
    window: u32,
    atoms: &X11Atoms,
) -> Result<bool, BackendError> {
    let states = get_property_u32(conn, window, atoms.net_wm_state, AtomEnum::ATOM.into())?;
    if demands_attention(&states, atoms.net_wm_state_demands_attention) {
        return Ok(true);
    }

    let hints = get_property_u32(
        conn,
        window,
        AtomEnum::WM_HINTS.into(),
        AtomEnum::WM_HINTS.into(),
    )?;
    Ok(has_urgency_hint(&hints))
}

fn demands_attention(states: &[u32], demands_attention_atom: u32) -> bool {
    states.contains(&demands_attention_atom)
}

fn has_urgency_hint(hints: &[u32]) -> bool {
    hints.first().is_some_and(|flags| flags & URGENCY_HINT != 0)
}

/// Connect to X11 server with proper error handling.
fn connect_to_x11() -> Result<(RustConnection, usize), BackendError> {
    RustConnection::connect(None).map_err(|e| BackendError::ConnectionFailed(e.to_string()))
}

fn setup_atoms<C: Connection>(conn: &C) -> Result<X11Atoms, BackendError> {
    Ok(X11Atoms {
        net_active_window: get_atom(conn, b"_NET_ACTIVE_WINDOW")?,
        net_client_list: get_atom(conn, b"_NET_CLIENT_LIST")?,
        net_wm_state: get_atom(conn, b"_NET_WM_STATE")?,
        net_wm_state_demands_attention: get_atom(conn, b"_NET_WM_STATE_DEMANDS_ATTENTION")?,
        net_wm_name: get_atom(conn, b"_NET_WM_NAME")?,
        utf8_string: get_atom(conn, b"UTF8_STRING")?,
    })
}

fn get_atom<C: Connection>(conn: &C, name: &[u8]) -> Result<u32, BackendError> {
    let reply = conn
        .intern_atom(false, name)
        .map_err(|e| BackendError::X11(e.to_string()))?
        .reply()
        .map_err(|e| BackendError::X11(e.to_string()))?;

    Ok(reply.atom)
}

fn select_property_changes<C: Connection>(conn: &C, window: u32) -> Result<(), BackendError> {
    conn.change_window_attributes(
        window,
        &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
    )
    .map_err(|e| BackendError::X11(e.to_string()))?;
    Ok(())
}

fn flush_connection<C: Connection>(conn: &C) -> Result<(), BackendError> {
    conn.flush()
        .map_err(|e| BackendError::X11(format!("Failed to flush connection: {e}")))
}

fn get_client_list<C: Connection>(
    conn: &C,
    root: u32,
    net_client_list: u32,
) -> Result<Vec<u32>, BackendError> {
    get_property_u32(conn, root, net_client_list, AtomEnum::WINDOW.into())
}

fn get_property_u32<C: Connection>(
    conn: &C,
    window: u32,
    property: u32,
    property_type: u32,
) -> Result<Vec<u32>, BackendError> {
    let reply = conn
        .get_property(false, window, property, property_type, 0, 1024)
        .map_err(|e| BackendError::X11(format!("Failed to get property: {e}")))?
        .reply()
        .map_err(|e| BackendError::X11(format!("Failed to get property: {e}")))?;

    Ok(reply
        .value32()
        .map(|values| values.collect())
        .unwrap_or_default())
}

/// Get the window title, preferring `_NET_WM_NAME` over `WM_NAME`.
fn get_window_name<C: Connection>(
    conn: &C,
    window: u32,
    atoms: &X11Atoms,
) -> Result<Option<String>, BackendError> {
    if let Some(title) = get_property_string(conn, window, atoms.net_wm_name, atoms.utf8_string)? {
        return Ok(Some(title));
    }

    get_property_string(
        conn,
        window,
        AtomEnum::WM_NAME.into(),
        AtomEnum::STRING.into(),
    )
}

fn get_property_string<C: Connection>(
    conn: &C,
    window: u32,
    property: u32,
    property_type: u32,
) -> Result<Option<String>, BackendError> {
    let reply = conn
        .get_property(false, window, property, property_type, 0, u32::MAX)
        .map_err(|e| BackendError::X11(format!("Failed to get property: {e}")))?
        .reply()
        .map_err(|e| BackendError::X11(format!("Failed to get property: {e}")))?;

    if reply.value_len > 0 {
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    } else {
        warn_if_wrong_type(window, property, reply.type_, property_type);
        Ok(None)
    }
}

fn warn_if_wrong_type(window: u32, property: u32, actual: u32, expected: u32) {
    if actual != u32::from(AtomEnum::NONE) && actual != expected {
        warn!(
            "Property {} on 0x{:x} has type {} instead of {}",
            property, window, actual, expected
        );
    }
}
