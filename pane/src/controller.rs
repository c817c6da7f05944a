use log::{debug, error, info, warn};
use pane_router::{
    HistoryBackend, HistoryBridge, MemoryHistory, Middleware, NavigationIntent, NavigationState,
    Next, PopStateListener, RouteContext, RouteTable, Transition, Trigger, WebHistory, middleware,
};
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;

use crate::collaborators::{Collaborators, EventCollaborators, LayoutBatch};
use crate::guard::DomGuard;
use crate::loading::LoadingMarks;
use crate::negotiator::{Negotiated, RequestContext, negotiate};
use crate::registry::{Component, ComponentContext, ComponentRegistry};
use crate::replacer::FragmentReplacer;
use crate::sequencer::RequestSequencer;
use crate::state_store::StateStore;
use crate::status::response_banner;
use crate::storage::{SessionStorage, WebStorage};
use crate::tabs::{AriaTabs, Tabs};
use crate::transport::{FetchTransport, FragmentRequest, RawResponse, Settlement, Transport};
use crate::{PaneConfig, PaneError, dom, focus, headers, tabs as tab_state};

/// Custom event requesting a navigation. The detail is a URL string or
/// `{url, pjax?, ...extra}`.
pub const NAVIGATE_EVENT: &str = "pane:navigate";

const NAVIGATION_CHANNEL: &str = "navigation";

/// How far a response got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Rendered,
    Redirected,
    Reauthenticating,
    Left,
}

struct Inner {
    config: PaneConfig,
    window: web_sys::Window,
    document: web_sys::Document,
    container: web_sys::Element,
    bridge: RefCell<HistoryBridge<Rc<dyn HistoryBackend>>>,
    web_history: Option<WebHistory>,
    routes: RouteTable,
    approved: Rc<RefCell<Option<NavigationState>>>,
    sequencer: RequestSequencer<Rc<dyn Transport>>,
    store: StateStore,
    tabs: Rc<dyn Tabs>,
    collaborators: Rc<dyn Collaborators>,
    layout: LayoutBatch,
    registry: ComponentRegistry,
    context: ComponentContext,
    deferred: RefCell<HashMap<String, String>>,
    loading: LoadingMarks,
    guarding: Cell<bool>,
    listeners: RefCell<Vec<dom::EventListener>>,
    pop_listener: RefCell<Option<PopStateListener>>,
}

/// Handle on the navigation controller. Clones share one controller.
#[derive(Clone)]
pub struct PaneController {
    inner: Rc<Inner>,
}

#[derive(Clone, Default)]
pub struct WeakController {
    inner: Weak<Inner>,
}

impl WeakController {
    pub fn upgrade(&self) -> Option<PaneController> {
        self.inner.upgrade().map(|inner| PaneController { inner })
    }
}

impl std::fmt::Debug for WeakController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakController")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Assembles a [`PaneController`]. Anything not supplied falls back to the
/// browser implementation.
#[derive(Default)]
pub struct PaneBuilder {
    config: Option<PaneConfig>,
    history: Option<Rc<dyn HistoryBackend>>,
    transport: Option<Rc<dyn Transport>>,
    storage: Option<Option<Rc<dyn SessionStorage>>>,
    tabs: Option<Rc<dyn Tabs>>,
    collaborators: Option<Rc<dyn Collaborators>>,
    registry: ComponentRegistry,
    routes: RouteTable,
}

impl std::fmt::Debug for PaneBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl PaneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PaneConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn history(mut self, history: impl HistoryBackend + 'static) -> Self {
        self.history = Some(Rc::new(history));
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Rc::new(transport));
        self
    }

    /// `None` disables tab and focus persistence.
    pub fn storage(mut self, storage: Option<Rc<dyn SessionStorage>>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn tabs(mut self, tabs: impl Tabs + 'static) -> Self {
        self.tabs = Some(Rc::new(tabs));
        self
    }

    pub fn collaborators(mut self, collaborators: impl Collaborators + 'static) -> Self {
        self.collaborators = Some(Rc::new(collaborators));
        self
    }

    pub fn bind(mut self, selector: &str, component: impl Component + 'static) -> Self {
        self.registry.bind(selector, component);
        self
    }

    /// Run `middleware` before dispatch for paths matching `pattern`.
    pub fn route(mut self, pattern: &str, middleware: impl Middleware + 'static) -> Result<Self, PaneError> {
        self.routes.route(pattern, middleware)?;
        Ok(self)
    }

    /// Run `middleware` before dispatch for every path.
    pub fn fallback(mut self, middleware: impl Middleware + 'static) -> Self {
        self.routes.fallback(middleware);
        self
    }

    pub fn build(self) -> Result<PaneController, PaneError> {
        let window = dom::window()?;
        let document = dom::document()?;

        let config = match self.config {
            Some(config) => config,
            None => PaneConfig::load(&document)?,
        };

        let container = document
            .query_selector(&config.container_selector)?
            .ok_or_else(|| PaneError::MissingContainer(config.container_selector.clone()))?;

        let (history, web_history): (Rc<dyn HistoryBackend>, Option<WebHistory>) = match self.history {
            Some(history) => (history, None),
            None => match WebHistory::probe() {
                Some(web) => (Rc::new(web.clone()) as Rc<dyn HistoryBackend>, Some(web)),
                None => {
                    debug!("falling back to in-memory history");
                    let url = window.location().href().unwrap_or_default();
                    (Rc::new(MemoryHistory::new(url)), None)
                }
            },
        };

        let transport: Rc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Rc::new(FetchTransport::new(window.clone())),
        };

        let storage = match self.storage {
            Some(storage) => storage,
            None => WebStorage::probe().map(|s| Rc::new(s) as Rc<dyn SessionStorage>),
        };

        let tabs: Rc<dyn Tabs> = match self.tabs {
            Some(tabs) => tabs,
            None => Rc::new(AriaTabs::new(config.tabset_selector.clone())),
        };

        let collaborators: Rc<dyn Collaborators> = match self.collaborators {
            Some(collaborators) => collaborators,
            None => Rc::new(EventCollaborators::new(container.clone().into())),
        };

        // Last handler of every chain: whatever state reaches it is dispatched.
        let approved: Rc<RefCell<Option<NavigationState>>> = Rc::default();
        let mut routes = self.routes;
        {
            let approved = approved.clone();
            routes.fallback(middleware(move |ctx: &mut RouteContext, next: Next<'_>| {
                *approved.borrow_mut() = Some(ctx.state.clone());
                next.run(ctx);
            }));
        }

        let store = StateStore::new(storage, config.base_href.clone());
        let layout = LayoutBatch::new(collaborators.clone());
        let registry = self.registry;

        let loading = LoadingMarks::new(config.loading_class.clone());

        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| Inner {
            config,
            window,
            document,
            container,
            bridge: RefCell::new(HistoryBridge::new(history)),
            web_history,
            routes,
            approved,
            sequencer: RequestSequencer::new(transport),
            store,
            tabs,
            collaborators,
            layout,
            registry,
            context: ComponentContext::new(WeakController { inner: weak.clone() }),
            deferred: RefCell::default(),
            loading,
            guarding: Cell::new(false),
            listeners: RefCell::default(),
            pop_listener: RefCell::default(),
        });

        Ok(PaneController { inner })
    }
}

/// Log an error raised inside an event or response callback. Template
/// contract violations are rethrown into the page.
fn report(result: Result<(), PaneError>) {
    if let Err(e) = result {
        error!("{e}");
        if e.is_fatal() {
            wasm_bindgen::throw_str(&e.to_string());
        }
    }
}

/// Navigation intent from a `pane:navigate` detail.
pub fn intent_from_value(value: &Value) -> Option<NavigationIntent> {
    if let Some(url) = value.as_str() {
        return Some(NavigationIntent::new(url));
    }

    let object = value.as_object()?;
    let url = object.get("url").and_then(Value::as_str)?;
    let mut intent = NavigationIntent::new(url);

    match object.get("pjax") {
        Some(Value::String(list)) => intent = intent.fragments(pane_utils::parse_fragment_list(list)),
        Some(Value::Array(names)) => {
            intent = intent.fragments(names.iter().filter_map(Value::as_str).map(str::to_owned))
        }
        _ => {}
    }

    for (key, value) in object {
        match key.as_str() {
            "url" | "pjax" => {}
            "forceReload" => intent = intent.force_reload(value.as_bool().unwrap_or(false)),
            _ => intent = intent.extra(key.clone(), value.clone()),
        }
    }

    Some(intent)
}

impl PaneController {
    pub fn builder() -> PaneBuilder {
        PaneBuilder::new()
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &PaneConfig {
        &self.inner.config
    }

    pub fn container(&self) -> &web_sys::Element {
        &self.inner.container
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.inner.document
    }

    /// Last approved navigation state.
    pub fn current_state(&self) -> Option<NavigationState> {
        self.inner.bridge.borrow().current().cloned()
    }

    /// State whose response is on the page.
    pub fn rendered_state(&self) -> Option<NavigationState> {
        self.inner.bridge.borrow().rendered().cloned()
    }

    pub fn has_pending_navigation(&self) -> bool {
        self.inner.sequencer.has_pending_navigation()
    }

    fn current_url(&self) -> String {
        self.current_state()
            .map(|state| state.path)
            .unwrap_or_else(|| self.inner.window.location().href().unwrap_or_default())
    }

    /// Adopt the loaded page: stamp the history entry, listen for
    /// back/forward and delegated events, attach components and restore tab
    /// state.
    pub fn start(&self) -> Result<NavigationState, PaneError> {
        let inner = &self.inner;
        let state = inner.bridge.borrow_mut().start()?;

        if let Some(web) = &inner.web_history {
            let weak = self.downgrade();
            let listener = web.listen(move |entry, url| {
                if let Some(controller) = weak.upgrade() {
                    report(controller.handle_pop(entry, &url).map(drop));
                }
            })?;
            *inner.pop_listener.borrow_mut() = Some(listener);
        }

        self.install_listeners()?;

        if let Some(root) = inner.document.document_element() {
            inner.registry.attach_within(&root, &inner.context)?;
        }

        self.restore_tab_state(state.tab_state_overrides())?;
        self.redraw();

        info!("pane controller started at {}", state.path);
        Ok(state)
    }

    fn install_listeners(&self) -> Result<(), PaneError> {
        let target: &web_sys::EventTarget = &self.inner.document;
        let mut listeners = Vec::new();

        for kind in self.inner.registry.event_types() {
            let weak = self.downgrade();
            listeners.push(dom::EventListener::new(target, kind, move |event| {
                if let Some(controller) = weak.upgrade() {
                    let inner = &controller.inner;
                    inner.registry.dispatch(&event, &inner.context);
                }
            })?);
        }

        let weak = self.downgrade();
        listeners.push(dom::EventListener::new(target, NAVIGATE_EVENT, move |event| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            let detail = event
                .dyn_ref::<web_sys::CustomEvent>()
                .map(|event| event.detail())
                .and_then(|detail| js_sys::JSON::stringify(&detail).ok())
                .and_then(|json| json.as_string())
                .and_then(|json| serde_json::from_str::<Value>(&json).ok());

            match detail.as_ref().and_then(intent_from_value) {
                Some(intent) => report(controller.navigate(intent).map(drop)),
                None => debug!("ignoring {NAVIGATE_EVENT} without a url"),
            }
        })?);

        self.inner.listeners.borrow_mut().extend(listeners);
        Ok(())
    }

    /// Ask the dirty regions of `fragments` for consent. The bridge is not
    /// borrowed while components prompt.
    fn consult_guard(&self, fragments: &[String]) -> bool {
        use pane_router::NavigationGuard;

        self.inner.guarding.set(true);
        let guard = DomGuard::new(&self.inner.document, &self.inner.config, &self.inner.registry);
        let consent = guard.can_navigate(fragments);
        self.inner.guarding.set(false);
        consent
    }

    /// Navigate to `intent.url`. Tab state of the page being left is saved
    /// first; the dirty-region guard may veto. Navigation requested while
    /// the guard is prompting is suppressed.
    pub fn navigate(&self, intent: NavigationIntent) -> Result<Transition, PaneError> {
        if self.inner.guarding.get() {
            debug!("navigation to {} requested during a prompt; ignoring", intent.url);
            return Ok(Transition::Suppressed);
        }
        if self.inner.bridge.borrow().is_paused() {
            debug!("navigation to {} suppressed during rollback", intent.url);
            return Ok(Transition::Suppressed);
        }

        self.save_tab_state()?;

        let trigger = if intent.force_reload {
            Trigger::Replace
        } else {
            Trigger::Push
        };
        let consent = self.consult_guard(&intent.fragment_names());
        let transition = self
            .inner
            .bridge
            .borrow_mut()
            .navigate(intent, &move |_: &[String]| consent)?;

        if let Transition::Proceed(state) = &transition {
            self.route(state.clone(), trigger)?;
        }
        Ok(transition)
    }

    /// Navigation the server asked for; the guard has already been passed.
    fn follow(&self, intent: NavigationIntent) -> Result<(), PaneError> {
        let transition = self
            .inner
            .bridge
            .borrow_mut()
            .navigate(intent, &|_: &[String]| true)?;

        if let Transition::Proceed(state) = transition {
            self.route(state, Trigger::Push)?;
        }
        Ok(())
    }

    /// Browser back/forward to `url`, carrying the entry's stored state.
    pub fn handle_pop(&self, entry: Option<NavigationState>, url: &str) -> Result<Transition, PaneError> {
        if self.inner.guarding.get() {
            debug!("history move to {url} during a prompt; ignoring");
            return Ok(Transition::Suppressed);
        }

        let departing = self.current_state().map(|state| state.path);
        if let Some(path) = &departing {
            self.save_tab_state_for(path)?;
        }

        let swallowed = self.inner.bridge.borrow().swallows_next_pop();
        let consent = swallowed || {
            let fragments = match &entry {
                Some(state) => state.pjax_fragments.clone(),
                None => NavigationState::new(url).pjax_fragments,
            };
            self.consult_guard(&fragments)
        };
        let transition = self
            .inner
            .bridge
            .borrow_mut()
            .pop(entry, url, &move |_: &[String]| consent)?;

        if let Transition::Proceed(state) = &transition {
            self.route(state.clone(), Trigger::Pop)?;
        }
        Ok(transition)
    }

    /// Reload the current address into the default fragment, replacing the
    /// history entry.
    pub fn reload_current_panel(&self) -> Result<Transition, PaneError> {
        self.navigate(NavigationIntent::new(self.current_url()).force_reload(true))
    }

    fn route(&self, state: NavigationState, trigger: Trigger) -> Result<(), PaneError> {
        self.inner.approved.borrow_mut().take();
        let ctx = self.inner.routes.handle(state, trigger);
        let approved = self.inner.approved.borrow_mut().take();

        match approved {
            Some(state) => self.handle_state_change(state),
            None => {
                debug!("route chain for {} ended before dispatch", ctx.state.path);
                Ok(())
            }
        }
    }

    /// Fetch and apply an approved state.
    pub fn handle_state_change(&self, mut state: NavigationState) -> Result<(), PaneError> {
        let inner = &self.inner;

        if !dom::fragments_present(&inner.document, &inner.config, &state.pjax_fragments)? {
            debug!(
                "[{}] not all on the page; loading {} instead",
                state.fragment_header(),
                inner.config.default_fragment
            );
            state.pjax_fragments = vec![inner.config.default_fragment.clone()];
        }

        self.emit("pane:beforestatechange", &json!({ "state": state }))?;
        inner.deferred.borrow_mut().clear();

        inner.sequencer.abort_navigation();
        let targets = self.loading_targets(&state.pjax_fragments)?;
        let ticket = inner.loading.mark(NAVIGATION_CHANNEL, targets)?;

        let weak = self.downgrade();
        let request_state = state.clone();
        inner.sequencer.dispatch_navigation(&state, move |settlement| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            controller.inner.loading.release(NAVIGATION_CHANNEL, ticket);
            let result = controller.settle_navigation(&request_state, settlement);
            report(result);
        });

        Ok(())
    }

    fn settle_navigation(&self, state: &NavigationState, settlement: Settlement) -> Result<(), PaneError> {
        match settlement {
            Settlement::Aborted => {
                debug!("navigation to {} superseded", state.path);
                Ok(())
            }
            Settlement::Failed(failure) => {
                warn!("navigation to {} failed: {failure}", state.path);
                if let Some(response) = failure.response() {
                    self.show_status(response);
                }
                self.revert_history();
                Ok(())
            }
            Settlement::Response(response) => {
                self.show_status(&response);

                let outcome = self.apply_response(
                    &response,
                    &state.path,
                    &state.pjax_fragments,
                    state.tab_state_overrides(),
                    true,
                );
                match outcome {
                    Ok(Outcome::Rendered) => {
                        self.mark_current_rendered();
                        self.emit("pane:afterstatechange", &json!({ "state": state }))
                    }
                    Ok(_) => Ok(()),
                    Err(e) => {
                        self.revert_history();
                        Err(e)
                    }
                }
            }
        }
    }

    fn revert_history(&self) {
        if !self.inner.config.restore_history_on_failure {
            return;
        }

        let reverted = self.inner.bridge.borrow_mut().revert_to_rendered();
        match reverted {
            Ok(true) => info!("address restored to {}", self.current_url()),
            Ok(false) => {}
            Err(e) => warn!("could not restore the address: {e}"),
        }
    }

    fn mark_current_rendered(&self) {
        let current = self.current_state();
        if let Some(current) = current {
            self.inner.bridge.borrow_mut().mark_rendered(&current);
        }
    }

    /// Act on a settled response. With `follows_redirects` off the address
    /// and history are left alone whatever `X-ControllerURL` says.
    fn apply_response(
        &self,
        response: &RawResponse,
        requested_url: &str,
        fragments: &[String],
        overrides: Option<&Map<String, Value>>,
        follows_redirects: bool,
    ) -> Result<Outcome, PaneError> {
        let inner = &self.inner;
        let current_url = inner.window.location().href().unwrap_or_default();
        let ctx = RequestContext {
            requested_url,
            current_url: &current_url,
            fragments,
            base_href: inner.config.base_href(),
            default_fragment: &inner.config.default_fragment,
            form_fragment: &inner.config.form_fragment,
            follows_redirects,
        };

        match negotiate(response, &ctx)? {
            Negotiated::FullReload { url } => {
                info!("server requested a full load of {url}");
                inner.window.location().set_href(&url)?;
                Ok(Outcome::Left)
            }
            Negotiated::Reauthenticate => {
                info!("session expired; asking for credentials");
                inner.collaborators.open_login_dialog();
                Ok(Outcome::Reauthenticating)
            }
            Negotiated::Redirect(redirect) => {
                info!("server redirected {requested_url} to {}", redirect.url);
                self.follow(NavigationIntent::new(redirect.url).fragments(redirect.fragments))?;
                Ok(Outcome::Redirected)
            }
            Negotiated::Empty { title } => {
                self.set_title(title.as_deref());
                Ok(Outcome::Rendered)
            }
            Negotiated::Apply(payload) => {
                self.set_title(payload.title.as_deref());

                let replacer = FragmentReplacer::new(
                    &inner.document,
                    &inner.config,
                    &inner.registry,
                    &inner.context,
                    &inner.layout,
                );
                replacer.apply_with(&payload.fragments, || {
                    self.restore_tab_state(overrides).map(drop)
                })?;

                if let Some(redirect) = payload.redirect {
                    // The new markup already belongs to the new address.
                    let intent = NavigationIntent::new(redirect.url).fragments(redirect.fragments);
                    inner.bridge.borrow_mut().navigate(intent, &|_: &[String]| true)?;
                }
                Ok(Outcome::Rendered)
            }
        }
    }

    fn set_title(&self, title: Option<&str>) {
        if let Some(title) = title {
            self.inner.document.set_title(title);
        }
    }

    fn show_status(&self, response: &RawResponse) {
        let config = &self.inner.config;
        if let Some(banner) = response_banner(response, &config.ignored_status_messages) {
            self.inner.collaborators.show_status(&banner, config.status_stay_ms);
        }
    }

    fn loading_targets(&self, fragments: &[String]) -> Result<Vec<web_sys::Element>, PaneError> {
        let inner = &self.inner;
        let mut targets = Vec::new();
        for name in fragments {
            targets.extend(dom::fragment_targets(&inner.document, &inner.config, name)?);
        }
        Ok(targets)
    }

    /// Load fragment `name` from `url` without touching history. A newer
    /// load of the same fragment aborts this one.
    pub fn load_fragment(&self, url: &str, name: &str) {
        let url = pane_utils::make_absolute(url, self.inner.config.base_href());
        let weak = self.downgrade();
        let (request_url, fragment) = (url.clone(), name.to_owned());

        self.inner.sequencer.dispatch_fragment(name, &url, move |settlement| {
            if let Some(controller) = weak.upgrade() {
                let result = controller.settle_fragment(&request_url, &fragment, settlement);
                report(result);
            }
        });
    }

    fn settle_fragment(&self, url: &str, name: &str, settlement: Settlement) -> Result<(), PaneError> {
        match settlement {
            Settlement::Aborted => {
                debug!("load of {name} from {url} superseded");
                Ok(())
            }
            Settlement::Failed(failure) => {
                warn!("load of {name} from {url} failed: {failure}");
                let (status, status_text) = match failure.response() {
                    Some(response) => {
                        self.show_status(response);
                        (response.status, response.status_text.clone())
                    }
                    None => (0, failure.to_string()),
                };
                self.emit(
                    "pane:loadfragmenterror",
                    &json!({ "url": url, "fragment": name, "status": status, "statusText": status_text }),
                )
            }
            Settlement::Response(response) => {
                self.show_status(&response);
                self.apply_response(&response, url, &[name.to_owned()], None, false)?;
                self.emit("pane:afterloadfragment", &json!({ "url": url, "fragment": name }))
            }
        }
    }

    /// Submit `form` in the background. `button` is the control that
    /// triggered the submission; its name is posted as `name=1`.
    pub fn submit_form(
        &self,
        form: &web_sys::HtmlFormElement,
        button: Option<&web_sys::Element>,
    ) -> Result<(), PaneError> {
        let inner = &self.inner;

        let fragments: Vec<String> = form
            .get_attribute(&inner.config.fragment_attribute)
            .map(|names| names.split_whitespace().map(str::to_owned).collect())
            .filter(|names: &Vec<String>| !names.is_empty())
            .unwrap_or_else(|| vec![inner.config.form_fragment.clone()]);

        self.save_tab_state()?;

        let data = web_sys::FormData::new_with_form(form)?;
        let params = web_sys::UrlSearchParams::new_with_str_sequence_sequence(&data)?;
        if let Some(name) = button
            .and_then(|button| button.get_attribute("name"))
            .filter(|name| !name.is_empty())
        {
            params.append(&name, "1");
        }
        let body = String::from(params.to_string());

        let channel = format!("fragment:{}", fragments[0]);
        let ticket = inner.loading.mark(&channel, button.into_iter().cloned().collect())?;

        let url = form.action();
        let form_id = form.id();
        let weak = self.downgrade();
        let (request_url, request_fragments) = (url.clone(), fragments.clone());

        info!("submitting {} to {url}", dom::describe(form));
        inner.sequencer.submit(&fragments, &url, body, move |settlement| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            controller.inner.loading.release(&channel, ticket);
            let result =
                controller.settle_submission(&request_url, &request_fragments, &form_id, settlement);
            report(result);
        });

        Ok(())
    }

    fn settle_submission(
        &self,
        url: &str,
        fragments: &[String],
        form_id: &str,
        settlement: Settlement,
    ) -> Result<(), PaneError> {
        match settlement {
            Settlement::Aborted => {
                debug!("submission to {url} superseded");
                Ok(())
            }
            Settlement::Failed(failure) => {
                warn!("submission to {url} failed: {failure}");
                if let Some(response) = failure.response() {
                    self.show_status(response);
                }
                Ok(())
            }
            Settlement::Response(response) => {
                self.show_status(&response);

                if self.apply_response(&response, url, fragments, None, true)? == Outcome::Rendered {
                    self.mark_current_rendered();
                }

                let target: web_sys::EventTarget = match self.inner.document.get_element_by_id(form_id) {
                    Some(form) if !form_id.is_empty() => form.into(),
                    _ => self.inner.container.clone().into(),
                };
                self.emit_from(
                    &target,
                    "pane:aftersubmitform",
                    &json!({ "url": url, "status": response.status }),
                )
            }
        }
    }

    /// Fill a `data-url` panel, from the per-URL cache when it was loaded
    /// before.
    pub fn load_deferred(&self, panel: &web_sys::Element) -> Result<(), PaneError> {
        let inner = &self.inner;
        let url = panel
            .get_attribute("data-url")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PaneError::MissingAttribute {
                element: dom::describe(panel),
                attribute: "data-url".to_owned(),
            })?;

        let cached = inner.deferred.borrow().get(&url).cloned();
        if let Some(markup) = cached {
            debug!("filling {} from cache", dom::describe(panel));
            return self.fill_panel(panel, &markup);
        }

        let channel = format!("deferred:{url}");
        let marks = format!("fragment:{channel}");
        let ticket = inner.loading.mark(&marks, vec![panel.clone()])?;

        let request = FragmentRequest::get(pane_utils::make_absolute(&url, inner.config.base_href()))
            .header(headers::REQUESTED_WITH, headers::REQUESTED_WITH_VALUE);
        let weak = self.downgrade();
        let panel = panel.clone();

        inner.sequencer.dispatch_fragment_request(&channel, request, move |settlement| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            controller.inner.loading.release(&marks, ticket);

            let result = match settlement {
                Settlement::Response(response) => {
                    controller
                        .inner
                        .deferred
                        .borrow_mut()
                        .insert(url, response.body.clone());
                    controller.fill_panel(&panel, &response.body)
                }
                Settlement::Failed(failure) => {
                    warn!("deferred panel {url} failed: {failure}");
                    if let Some(response) = failure.response() {
                        controller.show_status(response);
                    }
                    Ok(())
                }
                Settlement::Aborted => Ok(()),
            };
            report(result);
        });

        Ok(())
    }

    fn fill_panel(&self, panel: &web_sys::Element, markup: &str) -> Result<(), PaneError> {
        let inner = &self.inner;
        let children = |panel: &web_sys::Element| -> Vec<web_sys::Element> {
            let list = panel.children();
            (0..list.length()).filter_map(|i| list.item(i)).collect()
        };

        for child in children(panel) {
            inner.registry.detach_within(&child, &inner.context)?;
        }
        panel.set_inner_html(markup);
        for child in children(panel) {
            inner.registry.attach_within(&child, &inner.context)?;
        }

        inner.layout.request();
        Ok(())
    }

    /// Whether the dirty regions inside `fragments` (default: the default
    /// fragment) agree to be discarded.
    pub fn check_can_navigate(&self, fragments: Option<&[String]>) -> bool {
        let default = [self.inner.config.default_fragment.clone()];
        self.consult_guard(fragments.unwrap_or(&default))
    }

    /// Persist the selected tabs of the current page.
    pub fn save_tab_state(&self) -> Result<(), PaneError> {
        self.save_tab_state_for(&self.current_url())
    }

    fn save_tab_state_for(&self, url: &str) -> Result<(), PaneError> {
        let inner = &self.inner;
        if !inner.store.is_enabled() {
            return Ok(());
        }

        let records = tab_state::collect(&inner.container, &inner.config, &*inner.tabs)?;
        inner.store.save_tabs(url, &records)
    }

    /// Reselect tabs from the navigation's overrides and the persisted state
    /// of the current page.
    pub fn restore_tab_state(
        &self,
        overrides: Option<&Map<String, Value>>,
    ) -> Result<Vec<web_sys::Element>, PaneError> {
        let inner = &self.inner;
        let persisted = inner.store.load_tabs(&self.current_url());
        let restored = tab_state::restore(
            &inner.container,
            &inner.config,
            &*inner.tabs,
            &persisted,
            overrides,
        )?;

        for tabset in &restored {
            inner.collaborators.redraw_tabs(tabset);
            self.emit_from(tabset, "pane:tabstaterestored", &Value::Null)?;
        }
        Ok(restored)
    }

    /// Forget persisted tabs of `url`, or of every page.
    pub fn clear_tab_state(&self, url: Option<&str>) {
        self.inner.store.clear_tabs(url);
    }

    pub fn clear_current_tab_state(&self) {
        self.clear_tab_state(Some(&self.current_url()));
    }

    pub fn save_field_focus(
        &self,
        form: &web_sys::Element,
        selected: &web_sys::Element,
    ) -> Result<(), PaneError> {
        focus::save(&self.inner.store, form, selected)
    }

    pub fn restore_field_focus(&self, form: &web_sys::Element) -> Result<Option<web_sys::Element>, PaneError> {
        focus::restore(&self.inner.store, &self.inner.config, form)
    }

    /// Ask the layout to reflow; coalesced while a swap is in progress.
    pub fn redraw(&self) {
        self.inner.layout.request();
    }

    fn emit(&self, name: &str, detail: &Value) -> Result<(), PaneError> {
        let target: &web_sys::EventTarget = &self.inner.container;
        self.emit_from(target, name, detail)
    }

    fn emit_from(&self, target: &web_sys::EventTarget, name: &str, detail: &Value) -> Result<(), PaneError> {
        dom::dispatch_custom(target, name, &dom::to_js(detail)?)?;
        Ok(())
    }
}

impl std::fmt::Debug for PaneController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneController")
            .field("state", &self.current_state().map(|s| s.path))
            .field("routes", &self.inner.routes)
            .field("registry", &self.inner.registry)
            .field("sequencer", &self.inner.sequencer)
            .finish_non_exhaustive()
    }
}
