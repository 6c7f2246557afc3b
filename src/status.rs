use std::sync::Arc;

use parking_lot::RwLock;

/// Human readable loading status shown next to the viewport.
///
/// Implementations use interior mutability so the loader can hold a shared
/// reference while it awaits.
pub trait StatusDisplay {
    fn show_text(&self, text: &str);
    fn hide(&self);
}

/// A missing status element turns every update into a no-op.
impl<T: StatusDisplay> StatusDisplay for Option<T> {
    fn show_text(&self, text: &str) {
        if let Some(display) = self {
            display.show_text(text);
        }
    }

    fn hide(&self) {
        if let Some(display) = self {
            display.hide();
        }
    }
}

impl<T: StatusDisplay + ?Sized> StatusDisplay for Arc<T> {
    fn show_text(&self, text: &str) {
        (**self).show_text(text);
    }

    fn hide(&self) {
        (**self).hide();
    }
}

impl<T: StatusDisplay + ?Sized> StatusDisplay for &T {
    fn show_text(&self, text: &str) {
        (**self).show_text(text);
    }

    fn hide(&self) {
        (**self).hide();
    }
}

/// Snapshot of a [`StatusLine`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusState {
    pub text: String,
    pub visible: bool,
}

/// Thread-safe status holder that a host polls and mirrors into its UI.
#[derive(Debug, Default)]
pub struct StatusLine {
    state: RwLock<StatusState>,
}

impl StatusLine {
    pub fn new(initial: &str) -> Self {
        Self {
            state: RwLock::new(StatusState {
                text: initial.to_string(),
                visible: true,
            }),
        }
    }

    pub fn snapshot(&self) -> StatusState {
        self.state.read().clone()
    }
}

impl StatusDisplay for StatusLine {
    fn show_text(&self, text: &str) {
        let mut state = self.state.write();
        state.text = text.to_string();
        state.visible = true;
    }

    fn hide(&self) {
        self.state.write().visible = false;
    }
}

/// Prints status changes to stdout, for headless runs.
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    last: RwLock<Option<String>>,
}

impl StatusDisplay for ConsoleStatus {
    fn show_text(&self, text: &str) {
        let mut last = self.last.write();
        if last.as_deref() != Some(text) {
            println!("{text}");
            *last = Some(text.to_string());
        }
    }

    fn hide(&self) {
        *self.last.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_tracks_text_and_visibility() {
        let status = StatusLine::new("Loading model...");
        assert!(status.snapshot().visible);
        status.show_text("Loading model... 50%");
        assert_eq!(status.snapshot().text, "Loading model... 50%");
        status.hide();
        assert!(!status.snapshot().visible);
    }

    #[test]
    fn absent_display_ignores_updates() {
        let missing: Option<StatusLine> = None;
        missing.show_text("ignored");
        missing.hide();

        let present = Some(StatusLine::default());
        present.show_text("shown");
        assert_eq!(present.as_ref().unwrap().snapshot().text, "shown");
    }
}
