use log::{debug, info};
use serde_json::Value;

use crate::{
    FORCE_RELOAD_KEY, HistoryBackend, NavigationError, NavigationIntent, NavigationState,
};

/// Asked before any navigation proceeds. Implementations poll the dirty
/// regions of the addressed fragments for consent.
pub trait NavigationGuard {
    fn can_navigate(&self, fragments: &[String]) -> bool;
}

impl<F> NavigationGuard for F
where
    F: Fn(&[String]) -> bool,
{
    fn can_navigate(&self, fragments: &[String]) -> bool {
        self(fragments)
    }
}

/// Result of handing a navigation to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Approved; the state should be dispatched.
    Proceed(NavigationState),
    /// The guard refused. History already points at the previous state.
    Vetoed,
    /// Ignored because a rollback is in progress.
    Suppressed,
}

/// Maps navigation intents onto the back-stack and re-emits back/forward
/// moves through the same approval path.
#[derive(Debug)]
pub struct HistoryBridge<H> {
    backend: H,
    last_state: Option<NavigationState>,
    rendered_state: Option<NavigationState>,
    paused: bool,
    swallow_pops: usize,
    reload_counter: u64,
}

impl<H: HistoryBackend> HistoryBridge<H> {
    pub fn new(backend: H) -> Self {
        Self {
            backend,
            last_state: None,
            rendered_state: None,
            paused: false,
            swallow_pops: 0,
            reload_counter: 0,
        }
    }

    pub fn backend(&self) -> &H {
        &self.backend
    }

    /// Adopt the entry the page was loaded with as the first known state.
    pub fn start(&mut self) -> Result<NavigationState, NavigationError> {
        let state = self
            .backend
            .current_state()
            .unwrap_or_else(|| NavigationState::new(self.backend.current_url()));

        if self.backend.supports_state() {
            self.backend.replace_state(&state)?;
        } else {
            debug!("history entries cannot carry state; tab state will not survive a refresh");
        }

        self.last_state = Some(state.clone());
        self.rendered_state = Some(state.clone());
        Ok(state)
    }

    /// Last approved state.
    pub fn current(&self) -> Option<&NavigationState> {
        self.last_state.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the next pop will be ignored without consulting the guard.
    pub fn swallows_next_pop(&self) -> bool {
        self.paused || self.swallow_pops > 0
    }

    pub fn navigate(
        &mut self,
        intent: NavigationIntent,
        guard: &dyn NavigationGuard,
    ) -> Result<Transition, NavigationError> {
        if self.paused {
            debug!("navigation to {} suppressed during rollback", intent.url);
            return Ok(Transition::Suppressed);
        }

        if !guard.can_navigate(&intent.fragment_names()) {
            info!("navigation to {} vetoed", intent.url);
            return Ok(Transition::Vetoed);
        }

        let referrer = self
            .last_state
            .as_ref()
            .map(|state| state.path.clone())
            .or_else(|| Some(self.backend.current_url()))
            .filter(|path| !path.is_empty());

        let force_reload = intent.force_reload;
        let mut state = intent.into_state(referrer);

        if self.backend.supports_state() {
            if force_reload {
                self.reload_counter += 1;
                state
                    .extra
                    .insert(FORCE_RELOAD_KEY.to_owned(), Value::from(self.reload_counter));
                self.backend.replace_state(&state)?;
            } else {
                self.backend.push_state(&state)?;
            }
        }

        info!("navigating to {} [{}]", state.path, state.fragment_header());
        self.last_state = Some(state.clone());
        Ok(Transition::Proceed(state))
    }

    /// Handle a browser back/forward move. `entry` is the state stored with
    /// the history entry, `url` the address it points at.
    pub fn pop(
        &mut self,
        entry: Option<NavigationState>,
        url: &str,
        guard: &dyn NavigationGuard,
    ) -> Result<Transition, NavigationError> {
        if self.swallow_pops > 0 {
            self.swallow_pops -= 1;
            debug!("ignoring pop to {url} caused by rollback");
            return Ok(Transition::Suppressed);
        }

        if self.paused {
            return Ok(Transition::Suppressed);
        }

        let state = entry.unwrap_or_else(|| NavigationState::new(url));

        if !guard.can_navigate(&state.pjax_fragments) {
            info!("navigation to {} vetoed, restoring history", state.path);
            self.rollback()?;
            return Ok(Transition::Vetoed);
        }

        self.last_state = Some(state.clone());
        Ok(Transition::Proceed(state))
    }

    fn rollback(&mut self) -> Result<(), NavigationError> {
        if !self.backend.supports_state() {
            return Ok(());
        }

        self.paused = true;
        let result = match &self.last_state {
            Some(last) => self.backend.push_state(last),
            None => {
                self.swallow_pops += 1;
                self.backend.back()
            }
        };
        self.paused = false;

        result
    }

    /// Overwrite the current entry, e.g. after a server side redirect.
    pub fn replace_current(&mut self, state: NavigationState) -> Result<(), NavigationError> {
        if self.backend.supports_state() {
            self.backend.replace_state(&state)?;
        }
        self.last_state = Some(state);
        Ok(())
    }

    /// Record that `state`'s response has been applied to the page.
    pub fn mark_rendered(&mut self, state: &NavigationState) {
        self.rendered_state = Some(state.clone());
    }

    pub fn rendered(&self) -> Option<&NavigationState> {
        self.rendered_state.as_ref()
    }

    /// Point the address bar back at the last rendered state. Returns
    /// whether anything changed.
    pub fn revert_to_rendered(&mut self) -> Result<bool, NavigationError> {
        let Some(rendered) = self.rendered_state.clone() else {
            return Ok(false);
        };

        if self.last_state.as_ref() == Some(&rendered) {
            return Ok(false);
        }

        if self.backend.supports_state() {
            self.paused = true;
            let result = self.backend.replace_state(&rendered);
            self.paused = false;
            result?;
        }

        self.last_state = Some(rendered);
        Ok(true)
    }
}
