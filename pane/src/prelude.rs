pub use crate::{
    Component, ComponentContext, NavigationIntent, NavigationState, PaneBuilder, PaneConfig,
    PaneController, PaneError, Transition, UnsavedChanges,
};
pub use pane_router::{Next, RouteContext, middleware};
pub use wasm_bindgen::JsCast;
