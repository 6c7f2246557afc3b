use web_sys::HtmlElement;

use crate::status::StatusDisplay;

/// Status element in the page, shown while loading and hidden afterwards.
#[derive(Debug, Clone)]
pub struct DomStatus {
    element: HtmlElement,
}

impl DomStatus {
    pub fn new(element: HtmlElement) -> Self {
        Self { element }
    }
}

impl StatusDisplay for DomStatus {
    fn show_text(&self, text: &str) {
        self.element.set_inner_text(text);
        let _ = self.element.style().remove_property("display");
    }

    fn hide(&self) {
        let _ = self.element.style().set_property("display", "none");
    }
}
