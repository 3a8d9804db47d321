//! attention-focusd - focus windows that demand attention instead of
//! leaving an "is ready" notification behind.
//!
//! The [`handler::AttentionHandler`] connects to a [`display::WindowHost`]
//! and focuses every window that demands attention unless its title matches
//! the [`blocklist::Blocklist`]. The [`daemon::Daemon`] loop feeds a
//! [`display::Display`] from a compositor [`backend`].

pub mod backend;
pub mod blocklist;
pub mod config;
pub mod daemon;
pub mod display;
pub mod handler;
pub mod window;
