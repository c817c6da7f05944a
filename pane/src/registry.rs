use log::debug;
use std::rc::Rc;
use wasm_bindgen::JsCast;

use crate::PaneError;
use crate::controller::{PaneController, WeakController};
use crate::dom;

/// Editable region that can hold changes the user has not saved.
pub trait UnsavedChanges {
    fn is_dirty(&self, element: &web_sys::Element) -> bool;
    /// Ask whether the changes may be discarded.
    fn confirm_unsaved(&self, element: &web_sys::Element) -> bool;
}

/// Behaviour bound to every element matching a selector.
pub trait Component {
    /// Event types delivered to [`Component::on_event`].
    fn events(&self) -> &'static [&'static str] {
        &[]
    }

    /// Called once per matching element after it enters the page.
    fn on_attach(&self, _element: &web_sys::Element, _ctx: &ComponentContext) {}

    /// Called before a matching element is replaced.
    fn on_detach(&self, _element: &web_sys::Element, _ctx: &ComponentContext) {}

    /// `element` is the closest match of the binding's selector around the
    /// event target.
    fn on_event(&self, _element: &web_sys::Element, _event: &web_sys::Event, _ctx: &ComponentContext) {}

    fn unsaved_changes(&self) -> Option<&dyn UnsavedChanges> {
        None
    }
}

/// What a component can reach while handling a callback.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    controller: WeakController,
}

impl ComponentContext {
    pub(crate) fn new(controller: WeakController) -> Self {
        Self { controller }
    }

    /// Context with no controller behind it, for driving components
    /// outside a running controller.
    pub fn detached() -> Self {
        Self::new(WeakController::default())
    }

    /// `None` once the controller has been dropped.
    pub fn controller(&self) -> Option<PaneController> {
        self.controller.upgrade()
    }
}

/// A region reporting unsaved changes and the component tracking it.
pub type DirtyRegion = (web_sys::Element, Rc<dyn Component>);

struct Binding {
    selector: String,
    component: Rc<dyn Component>,
}

/// Ordered selector bindings. Each mutation batch resolves the bindings
/// once over the inserted or removed subtree.
#[derive(Default)]
pub struct ComponentRegistry {
    bindings: Vec<Binding>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, selector: impl Into<String>, component: impl Component + 'static) -> &mut Self {
        self.bindings.push(Binding {
            selector: selector.into(),
            component: Rc::new(component),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn attach_within(&self, root: &web_sys::Element, ctx: &ComponentContext) -> Result<(), PaneError> {
        for binding in &self.bindings {
            for element in dom::query_inclusive(root, &binding.selector)? {
                binding.component.on_attach(&element, ctx);
            }
        }
        Ok(())
    }

    pub fn detach_within(&self, root: &web_sys::Element, ctx: &ComponentContext) -> Result<(), PaneError> {
        for binding in &self.bindings {
            for element in dom::query_inclusive(root, &binding.selector)? {
                binding.component.on_detach(&element, ctx);
            }
        }
        Ok(())
    }

    /// Route a delegated event to every binding that listens for its type
    /// and matches around its target.
    pub fn dispatch(&self, event: &web_sys::Event, ctx: &ComponentContext) {
        let Some(target) = event
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
        else {
            return;
        };
        let kind = event.type_();

        for binding in &self.bindings {
            if !binding.component.events().iter().any(|k| *k == kind) {
                continue;
            }

            match target.closest(&binding.selector) {
                Ok(Some(element)) => binding.component.on_event(&element, event, ctx),
                Ok(None) => {}
                Err(e) => debug!("invalid selector {}: {e:?}", binding.selector),
            }
        }
    }

    /// Elements under `root` whose component reports unsaved changes.
    pub fn dirty_regions(
        &self,
        root: &web_sys::Element,
    ) -> Result<Vec<DirtyRegion>, PaneError> {
        let mut regions: Vec<DirtyRegion> = Vec::new();

        for binding in &self.bindings {
            let Some(tracker) = binding.component.unsaved_changes() else {
                continue;
            };

            for element in dom::query_inclusive(root, &binding.selector)? {
                if tracker.is_dirty(&element) {
                    regions.push((element, binding.component.clone()));
                }
            }
        }

        Ok(regions)
    }

    /// Event types some binding listens for, without duplicates.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = Vec::new();
        for binding in &self.bindings {
            for kind in binding.component.events() {
                if !kinds.contains(kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| &b.selector))
            .finish()
    }
}
