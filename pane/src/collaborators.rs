use log::debug;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

use crate::dom;
use crate::status::StatusBanner;

/// Side effects the controller asks of the surrounding interface. All calls
/// are best effort.
pub trait Collaborators {
    /// Recompute layout after the DOM changed.
    fn redraw(&self);
    fn open_login_dialog(&self);
    fn show_status(&self, banner: &StatusBanner, stay_ms: u32);
    /// Refresh a tab widget after its selection changed.
    fn redraw_tabs(&self, tabset: &web_sys::Element);
}

/// Announces every collaborator call as a bubbling `pane:*` event on the
/// container, for the layout, dialog and banner widgets to pick up.
#[derive(Debug, Clone)]
pub struct EventCollaborators {
    target: web_sys::EventTarget,
}

impl EventCollaborators {
    pub fn new(target: web_sys::EventTarget) -> Self {
        Self { target }
    }

    fn emit(&self, target: &web_sys::EventTarget, name: &str, detail: serde_json::Value) {
        let result = dom::to_js(&detail).and_then(|detail| dom::dispatch_custom(target, name, &detail));
        if let Err(e) = result {
            debug!("could not dispatch {name}: {e}");
        }
    }
}

impl Collaborators for EventCollaborators {
    fn redraw(&self) {
        self.emit(&self.target, "pane:redraw", serde_json::Value::Null);
    }

    fn open_login_dialog(&self) {
        self.emit(&self.target, "pane:reauthenticate", serde_json::Value::Null);
    }

    fn show_status(&self, banner: &StatusBanner, stay_ms: u32) {
        self.emit(
            &self.target,
            "pane:status",
            json!({ "text": banner.text, "kind": banner.kind.as_str(), "stay": stay_ms }),
        );
    }

    fn redraw_tabs(&self, tabset: &web_sys::Element) {
        self.emit(tabset, "pane:redrawtabs", serde_json::Value::Null);
    }
}

/// Coalesces reflow requests: while any [`ReflowGuard`] is alive, requests
/// are recorded and a single redraw runs when the last guard drops.
pub struct LayoutBatch {
    collaborators: Rc<dyn Collaborators>,
    depth: Cell<usize>,
    pending: Cell<bool>,
}

impl LayoutBatch {
    pub fn new(collaborators: Rc<dyn Collaborators>) -> Self {
        Self {
            collaborators,
            depth: Cell::new(0),
            pending: Cell::new(false),
        }
    }

    pub fn suppress(&self) -> ReflowGuard<'_> {
        self.depth.set(self.depth.get() + 1);
        ReflowGuard { batch: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn request(&self) {
        if self.is_suppressed() {
            self.pending.set(true);
        } else {
            self.collaborators.redraw();
        }
    }
}

impl std::fmt::Debug for LayoutBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutBatch")
            .field("depth", &self.depth.get())
            .field("pending", &self.pending.get())
            .finish()
    }
}

#[derive(Debug)]
#[must_use = "reflow resumes as soon as the guard is dropped"]
pub struct ReflowGuard<'a> {
    batch: &'a LayoutBatch,
}

impl Drop for ReflowGuard<'_> {
    fn drop(&mut self) {
        let depth = self.batch.depth.get().saturating_sub(1);
        self.batch.depth.set(depth);

        if depth == 0 && self.batch.pending.replace(false) {
            self.batch.collaborators.redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        redraws: Cell<usize>,
    }

    impl Collaborators for Counter {
        fn redraw(&self) {
            self.redraws.set(self.redraws.get() + 1);
        }
        fn open_login_dialog(&self) {}
        fn show_status(&self, _: &StatusBanner, _: u32) {}
        fn redraw_tabs(&self, _: &web_sys::Element) {}
    }

    #[test]
    fn suppressed_requests_collapse_into_one_redraw() {
        let counter = Rc::new(Counter::default());
        let batch = LayoutBatch::new(counter.clone());

        {
            let _outer = batch.suppress();
            batch.request();
            {
                let _inner = batch.suppress();
                batch.request();
                batch.request();
            }
            assert_eq!(counter.redraws.get(), 0);
        }

        assert_eq!(counter.redraws.get(), 1);
    }

    #[test]
    fn unsuppressed_requests_redraw_immediately() {
        let counter = Rc::new(Counter::default());
        let batch = LayoutBatch::new(counter.clone());

        batch.request();
        drop(batch.suppress());

        assert_eq!(counter.redraws.get(), 1);
    }
}
