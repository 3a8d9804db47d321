//! Title blocklist for windows that must never be auto-focused.

/// Case-insensitive substring blocklist.
///
/// Entries are lower-cased once at construction and otherwise kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blocklist {
    entries: Vec<String>,
}

impl Blocklist {
    /// Build a blocklist from raw configured entries.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().to_lowercase())
            .collect();

        Self { entries }
    }

    /// Returns true if any entry is contained in `title`, ignoring case.
    pub fn matches(&self, title: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let title = title.to_lowercase();
        self.entries.iter().any(|entry| title.contains(entry.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the normalised entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blocklist_matches_nothing() {
        let blocklist = Blocklist::default();
        assert!(blocklist.is_empty());
        assert!(!blocklist.matches("Terminal"));
        assert!(!blocklist.matches(""));
    }

    #[test]
    fn test_case_insensitive_containment() {
        let blocklist = Blocklist::new(["Zoom"]);
        assert!(blocklist.matches("zoom — meeting"));
        assert!(blocklist.matches("ZOOM CALL"));
        assert!(blocklist.matches("Team Zoom"));
        assert!(!blocklist.matches("Zo om"));
    }

    #[test]
    fn test_entry_must_be_contained_in_title() {
        // A title that is a substring of an entry is not a match.
        let blocklist = Blocklist::new(["spotify premium"]);
        assert!(!blocklist.matches("Spotify"));
        assert!(blocklist.matches("Spotify Premium - Daft Punk"));
    }

    #[test]
    fn test_any_entry_matches() {
        let blocklist = Blocklist::new(["slack", "discord"]);
        assert!(blocklist.matches("Discord | #general"));
        assert!(blocklist.matches("Slack - workspace"));
        assert!(!blocklist.matches("Firefox"));
    }

    #[test]
    fn test_entries_are_only_lower_cased() {
        let blocklist = Blocklist::new([" Spotify", "ZOOM"]);
        assert_eq!(blocklist.len(), 2);
        assert_eq!(blocklist.iter().collect::<Vec<_>>(), vec![" spotify", "zoom"]);

        // Surrounding whitespace is part of the entry.
        let blocklist = Blocklist::new([" zoom"]);
        assert!(!blocklist.matches("zoomer"));
        assert!(blocklist.matches("Team zoom"));
    }

    #[test]
    fn test_empty_entry_matches_every_title() {
        let blocklist = Blocklist::new([""]);
        assert!(blocklist.matches("Terminal"));
        assert!(blocklist.matches(""));
    }

    #[test]
    fn test_non_ascii_titles() {
        let blocklist = Blocklist::new(["ÉDITEUR"]);
        assert!(blocklist.matches("mon éditeur de texte"));
    }
}
