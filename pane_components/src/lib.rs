#![allow(missing_docs)]

//! Stock components of the CMS admin interface.

use pane::PaneBuilder;
use wasm_bindgen::prelude::*;
use std::cell::RefCell;

pub mod change_tracker;
pub mod deferred_panel;
pub mod edit_form;
pub mod panel_link;

pub use change_tracker::ChangeTracker;
pub use deferred_panel::DeferredPanel;
pub use edit_form::EditForm;
pub use panel_link::PanelLink;

thread_local! {
    static CONTROLLER: RefCell<Option<pane::PaneController>> = const { RefCell::new(None) };
}

/// Builder with every stock component bound.
pub fn admin() -> PaneBuilder {
    PaneBuilder::new()
        .bind(panel_link::SELECTOR, PanelLink)
        .bind(change_tracker::SELECTOR, ChangeTracker::default())
        .bind(edit_form::SELECTOR, EditForm)
        .bind(deferred_panel::SELECTOR, DeferredPanel)
}

/// Entry point for the admin page.
#[wasm_bindgen(js_name = startPane)]
pub fn start_pane() -> Result<(), JsValue> {
    pane::logging::init(log::Level::Info);

    let controller = admin().build().map_err(|e| JsValue::from_str(&e.to_string()))?;
    controller
        .start()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    CONTROLLER.with(|slot| *slot.borrow_mut() = Some(controller));
    Ok(())
}
