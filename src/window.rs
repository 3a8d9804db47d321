//! Window handles as seen by the attention handler.

use std::fmt;

/// Backend-specific window identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowId {
    /// Hyprland window address, stored without the `0x` prefix.
    Hyprland(String),
    /// X11 window XID.
    X11(u32),
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hyprland(address) => write!(f, "0x{address}"),
            Self::X11(xid) => write!(f, "0x{xid:x}"),
        }
    }
}

/// A window reported by the host.
///
/// Only the title is consulted when deciding whether to focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Identifier understood by the backend that reported the window.
    pub id: WindowId,

    /// Window title, if the window has one.
    pub title: Option<String>,
}

impl Window {
    /// Create a new window handle.
    pub fn new(id: WindowId, title: Option<String>) -> Self {
        Self { id, title }
    }

    /// Title for log output.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_id_display() {
        assert_eq!(
            WindowId::Hyprland("55a1b2c3d4e5".to_string()).to_string(),
            "0x55a1b2c3d4e5"
        );
        assert_eq!(WindowId::X11(0x0420_0007).to_string(), "0x4200007");
    }

    #[test]
    fn test_display_title() {
        let titled = Window::new(WindowId::X11(1), Some("Terminal".to_string()));
        assert_eq!(titled.display_title(), "Terminal");

        let untitled = Window::new(WindowId::X11(1), None);
        assert_eq!(untitled.display_title(), "<untitled>");
    }
}
