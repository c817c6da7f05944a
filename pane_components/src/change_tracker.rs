use log::{debug, warn};
use pane::prelude::*;
use pane::web_sys;

pub const SELECTOR: &str = "form[data-change-tracker]";

const CHANGED_CLASS: &str = "changed";
const DISCARD_CLASS: &str = "discardchanges";

/// Marks tracked forms as changed on user input and asks before their
/// changes are thrown away.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    message: String,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new("Are you sure you want to navigate away from this page?\n\nWARNING: Your changes have not been saved.")
    }
}

impl ChangeTracker {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn has_class(element: &web_sys::Element, class: &str) -> bool {
    element.class_list().contains(class)
}

impl UnsavedChanges for ChangeTracker {
    fn is_dirty(&self, element: &web_sys::Element) -> bool {
        has_class(element, CHANGED_CLASS) && !has_class(element, DISCARD_CLASS)
    }

    fn confirm_unsaved(&self, element: &web_sys::Element) -> bool {
        let Some(window) = web_sys::window() else {
            return true;
        };

        match window.confirm_with_message(&self.message) {
            Ok(true) => {
                if let Err(e) = element.class_list().add_1(DISCARD_CLASS) {
                    warn!("could not mark changes as discarded: {e:?}");
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("confirmation dialog unavailable: {e:?}");
                true
            }
        }
    }
}

impl Component for ChangeTracker {
    fn events(&self) -> &'static [&'static str] {
        &["input", "change"]
    }

    fn on_attach(&self, element: &web_sys::Element, _ctx: &ComponentContext) {
        if let Err(e) = element.class_list().remove_2(CHANGED_CLASS, DISCARD_CLASS) {
            debug!("could not reset change markers on {}: {e:?}", element.id());
        }
    }

    fn on_event(&self, element: &web_sys::Element, event: &web_sys::Event, _ctx: &ComponentContext) {
        let ignored = event
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .is_some_and(|t| t.closest(".no-change-track").ok().flatten().is_some());
        if ignored || has_class(element, CHANGED_CLASS) {
            return;
        }

        debug!("{} changed", element.id());
        if let Err(e) = element.class_list().add_1(CHANGED_CLASS) {
            warn!("could not mark {} as changed: {e:?}", element.id());
        }
    }

    fn unsaved_changes(&self) -> Option<&dyn UnsavedChanges> {
        Some(self)
    }
}
