use crate::{
    clipboard::ClipboardBackend,
    error::{Error, Result},
    history::HistoryStore,
    picker::Picker,
};
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_DISPLAY_WIDTH: usize = 80;
pub const DEFAULT_PREVIEW_WIDTH: usize = 50;

/// How a menu run ended, when it didn't fail outright.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MenuOutcome {
    /// The picker was dismissed.
    Cancelled,
    /// The entry was copied back to the clipboard.
    Restored { preview: String },
    /// The entry was found, but the clipboard refused it.
    CopyFailed { preview: String, reason: String },
}

impl MenuOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            MenuOutcome::Cancelled | MenuOutcome::Restored { .. } => 0,
            MenuOutcome::CopyFailed { .. } => 1,
        }
    }

    /// A line suitable for telling the user what happened.
    pub fn message(&self) -> Option<String> {
        match self {
            MenuOutcome::Cancelled => None,
            MenuOutcome::Restored { preview } => Some(format!("copied: {}", preview)),
            MenuOutcome::CopyFailed { preview, reason } => {
                Some(format!("failed to copy {}: {}", preview, reason))
            }
        }
    }
}

pub struct Controller {
    pub store: HistoryStore,
    pub clipboard: Box<dyn ClipboardBackend>,
    pub display_width: usize,
    pub preview_width: usize,
}

impl Controller {
    pub fn new(store: HistoryStore, clipboard: Box<dyn ClipboardBackend>) -> Self {
        Controller {
            store,
            clipboard,
            display_width: DEFAULT_DISPLAY_WIDTH,
            preview_width: DEFAULT_PREVIEW_WIDTH,
        }
    }

    /// Save whatever is on the clipboard now.
    pub fn capture(&mut self) -> Result<()> {
        // Clipboard tools fail when there's nothing, or nothing textual, to paste.
        let text = match self.clipboard.read() {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    backend = self.clipboard.name(),
                    "clipboard read failed, treating as empty: {:#}", err
                );
                String::new()
            }
        };
        self.store.capture(&text)
    }

    /// Capture, then let the user pick an entry and put it back on the clipboard.
    pub fn menu(&mut self, picker: &mut dyn Picker) -> Result<MenuOutcome> {
        self.capture()?;
        let display = self.list_display()?;
        if display.is_empty() {
            return Err(Error::NoHistory);
        }

        let Some(selection) = picker.pick(&display).map_err(Error::Picker)? else {
            debug!("picker dismissed");
            return Ok(MenuOutcome::Cancelled);
        };
        let line = self.store.restore_candidate(&selection)?;
        let preview = truncate(&line, self.preview_width);
        let text = self.store.encoder().decode(&line);

        match self.clipboard.write(&text) {
            Ok(()) => Ok(MenuOutcome::Restored { preview }),
            Err(err) => {
                warn!(backend = self.clipboard.name(), "clipboard write failed: {:#}", err);
                Ok(MenuOutcome::CopyFailed {
                    preview,
                    reason: format!("{:#}", err),
                })
            }
        }
    }

    /// The history as the picker shows it, most recent first.
    pub fn list_display(&self) -> Result<Vec<String>> {
        display_lines(&self.store, self.display_width)
    }
}

/// Stored entries cut down to `width` for display.
pub fn display_lines(store: &HistoryStore, width: usize) -> Result<Vec<String>> {
    Ok(store
        .list()?
        .iter()
        .map(|line| truncate(line, width))
        .collect())
}

/// Cut a line down to at most `width` user-perceived characters.
pub fn truncate(line: &str, width: usize) -> String {
    line.graphemes(true).take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::{MenuOutcome, truncate};

    #[test]
    fn truncate_counts_graphemes() {
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("short", 80), "short");
        // e + combining acute stays together.
        assert_eq!(truncate("e\u{301}e\u{301}e\u{301}", 2), "e\u{301}e\u{301}");
    }

    #[test]
    fn truncated_line_is_a_prefix() {
        let line = "x".repeat(200);
        assert!(line.starts_with(&truncate(&line, 80)));
    }

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(MenuOutcome::Cancelled.exit_code(), 0);
        assert_eq!(MenuOutcome::Cancelled.message(), None);
        let restored = MenuOutcome::Restored {
            preview: "abc".into(),
        };
        assert_eq!(restored.exit_code(), 0);
        assert_eq!(restored.message().unwrap(), "copied: abc");
        let failed = MenuOutcome::CopyFailed {
            preview: "abc".into(),
            reason: "no display".into(),
        };
        assert_eq!(failed.exit_code(), 1);
    }
}
