use log::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::{HistoryBackend, NavigationError, NavigationState};

fn js_error(operation: &'static str, value: JsValue) -> NavigationError {
    NavigationError::History {
        operation,
        message: value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}")),
    }
}

/// Read a [`NavigationState`] out of a history entry's state object.
pub fn state_from_js(value: &JsValue) -> Option<NavigationState> {
    if value.is_undefined() || value.is_null() {
        return None;
    }

    let json = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&json).ok()
}

fn state_to_js(state: &NavigationState) -> Result<JsValue, NavigationError> {
    let json = serde_json::to_string(state)?;
    js_sys::JSON::parse(&json).map_err(|e| js_error("serialise", e))
}

/// `window.history` backed back-stack.
#[derive(Debug, Clone)]
pub struct WebHistory {
    window: web_sys::Window,
    history: web_sys::History,
}

impl WebHistory {
    /// Probe for the history API. `None` when the environment has no window
    /// or no history object.
    pub fn probe() -> Option<Self> {
        let Some(window) = web_sys::window() else {
            debug!("no window; history api unavailable");
            return None;
        };

        match window.history() {
            Ok(history) => Some(Self { window, history }),
            Err(e) => {
                debug!("history api unavailable: {e:?}");
                None
            }
        }
    }

    /// Forward browser back/forward moves to `on_pop` with the entry's state
    /// and the new address.
    pub fn listen<F>(&self, mut on_pop: F) -> Result<PopStateListener, NavigationError>
    where
        F: FnMut(Option<NavigationState>, String) + 'static,
    {
        let window = self.window.clone();
        let callback = Closure::wrap(Box::new(move |event: web_sys::PopStateEvent| {
            let url = window.location().href().unwrap_or_default();
            on_pop(state_from_js(&event.state()), url);
        }) as Box<dyn FnMut(_)>);

        self.window
            .add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref())
            .map_err(|e| js_error("listen", e))?;

        Ok(PopStateListener {
            window: self.window.clone(),
            callback,
        })
    }
}

impl HistoryBackend for WebHistory {
    fn supports_state(&self) -> bool {
        true
    }

    fn push_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        let value = state_to_js(state)?;
        self.history
            .push_state_with_url(&value, "", Some(&state.path))
            .map_err(|e| js_error("pushState", e))
    }

    fn replace_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        let value = state_to_js(state)?;
        self.history
            .replace_state_with_url(&value, "", Some(&state.path))
            .map_err(|e| js_error("replaceState", e))
    }

    fn back(&self) -> Result<(), NavigationError> {
        self.history.back().map_err(|e| js_error("back", e))
    }

    fn current_state(&self) -> Option<NavigationState> {
        self.history.state().ok().and_then(|s| state_from_js(&s))
    }

    fn current_url(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }
}

/// Keeps the `popstate` listener registered until dropped.
pub struct PopStateListener {
    window: web_sys::Window,
    callback: Closure<dyn FnMut(web_sys::PopStateEvent)>,
}

impl Drop for PopStateListener {
    fn drop(&mut self) {
        let _ = self.window.remove_event_listener_with_callback(
            "popstate",
            self.callback.as_ref().unchecked_ref(),
        );
    }
}

impl std::fmt::Debug for PopStateListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopStateListener").finish_non_exhaustive()
    }
}
