#![allow(missing_docs)]

//! History bridge for the pane controller: navigation state, back-stack
//! bookkeeping, veto rollback and the route middleware table.

use thiserror::Error;

mod bridge;
mod history;
mod routes;
mod state;
mod web_history;

pub use bridge::{HistoryBridge, NavigationGuard, Transition};
pub use history::{HistoryBackend, MemoryHistory};
pub use routes::{Middleware, Next, RouteContext, RouteTable, Trigger, middleware};
pub use state::{
    DEFAULT_FRAGMENT, FORCE_RELOAD_KEY, NavigationIntent, NavigationState, TAB_STATE_KEY,
    fragment_set,
};
pub use web_history::{PopStateListener, WebHistory, state_from_js};

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("history {operation} failed: {message}")]
    History {
        operation: &'static str,
        message: String,
    },
    #[error("invalid route pattern `{pattern}`: {message}")]
    Route { pattern: String, message: String },
    #[error("history state could not be serialised: {0}")]
    State(#[from] serde_json::Error),
}
