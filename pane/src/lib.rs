#![allow(missing_docs)]

//! PJAX navigation for the CMS admin: history-driven fragment loading,
//! response negotiation, fragment swapping and tab/focus persistence.

pub mod prelude;

pub use js_sys;
pub use pane_utils;
pub use wasm_bindgen;
pub use web_sys;

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod dom;
mod error;
pub mod focus;
pub mod guard;
pub mod headers;
mod loading;
pub mod logging;
pub mod negotiator;
pub mod registry;
pub mod replacer;
pub mod sequencer;
pub mod state_store;
pub mod status;
pub mod storage;
pub mod tabs;
pub mod transport;

pub use collaborators::{Collaborators, EventCollaborators, LayoutBatch};
pub use config::PaneConfig;
pub use controller::{PaneBuilder, PaneController, WeakController, intent_from_value};
pub use error::PaneError;
pub use registry::{Component, ComponentContext, ComponentRegistry, UnsavedChanges};
pub use pane_router::{
    HistoryBackend, MemoryHistory, NavigationIntent, NavigationState, RouteContext, Transition,
    Trigger,
};

/// Build a controller with the browser defaults and no components, then
/// start it.
pub fn start() -> Result<PaneController, PaneError> {
    let controller = PaneBuilder::new().build()?;
    controller.start()?;
    Ok(controller)
}
