use log::debug;
use pane_router::NavigationState;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::headers;
use crate::transport::{FragmentRequest, InFlight, Settlement, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Channel {
    Navigation,
    Fragment(String),
}

struct Slot {
    id: u64,
    handle: Box<dyn InFlight>,
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    navigation: Option<Slot>,
    fragments: HashMap<String, Slot>,
}

impl Slots {
    fn take(&mut self, channel: &Channel) -> Option<Slot> {
        match channel {
            Channel::Navigation => self.navigation.take(),
            Channel::Fragment(name) => self.fragments.remove(name),
        }
    }

    fn insert(&mut self, channel: Channel, slot: Slot) {
        match channel {
            Channel::Navigation => self.navigation = Some(slot),
            Channel::Fragment(name) => {
                self.fragments.insert(name, slot);
            }
        }
    }

    /// Empty the slot for `channel` if it still holds request `id`.
    fn release(&mut self, channel: &Channel, id: u64) {
        let holds = match channel {
            Channel::Navigation => self.navigation.as_ref().is_some_and(|s| s.id == id),
            Channel::Fragment(name) => self.fragments.get(name).is_some_and(|s| s.id == id),
        };

        if holds {
            self.take(channel);
        }
    }
}

/// Tracks the single in-flight navigation request and one request per
/// fragment name. Dispatching on a channel aborts whatever that channel
/// still has in flight; nothing else is touched.
pub struct RequestSequencer<T> {
    transport: T,
    slots: Rc<RefCell<Slots>>,
}

impl<T: Transport> RequestSequencer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            slots: Rc::default(),
        }
    }

    /// Request for a navigation: the state's path with the fragment and
    /// back-url headers.
    pub fn navigation_request(state: &NavigationState) -> FragmentRequest {
        let mut request = FragmentRequest::get(state.path.clone())
            .header(headers::PJAX, state.fragment_header())
            .header(headers::REQUESTED_WITH, headers::REQUESTED_WITH_VALUE);

        if let Some(referrer) = state.referrer.as_deref().filter(|r| !r.is_empty()) {
            let back_url = match pane_utils::decode_uri(referrer) {
                Some(decoded) => pane_utils::encode_uri(&decoded),
                None => referrer.to_owned(),
            };
            request = request.header(headers::BACK_URL, back_url);
        }

        request
    }

    pub fn dispatch_navigation<F>(&self, state: &NavigationState, on_settle: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        self.send(Channel::Navigation, Self::navigation_request(state), on_settle);
    }

    pub fn dispatch_fragment<F>(&self, name: &str, url: &str, on_settle: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        let request = FragmentRequest::get(url)
            .header(headers::PJAX, name)
            .header(headers::REQUESTED_WITH, headers::REQUESTED_WITH_VALUE);

        self.dispatch_fragment_request(name, request, on_settle);
    }

    /// POST a url-encoded form body asking for `fragments` back. The request
    /// runs on the channel of the first fragment.
    pub fn submit<F>(&self, fragments: &[String], url: &str, body: String, on_settle: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        let fragments = pane_router::fragment_set(fragments.iter().map(String::as_str));
        let request = FragmentRequest::post(url, body)
            .header(headers::PJAX, fragments.join(","))
            .header(headers::REQUESTED_WITH, headers::REQUESTED_WITH_VALUE);

        self.dispatch_fragment_request(&fragments[0], request, on_settle);
    }

    pub fn dispatch_fragment_request<F>(&self, name: &str, request: FragmentRequest, on_settle: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        self.send(Channel::Fragment(name.to_owned()), request, on_settle);
    }

    pub fn abort_navigation(&self) {
        let previous = self.slots.borrow_mut().navigation.take();
        if let Some(slot) = previous {
            debug!("aborting navigation request #{}", slot.id);
            slot.handle.abort();
        }
    }

    pub fn has_pending_navigation(&self) -> bool {
        self.slots.borrow().navigation.is_some()
    }

    /// Fragment names with a request in flight, sorted.
    pub fn pending_fragments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.borrow().fragments.keys().cloned().collect();
        names.sort();
        names
    }

    fn send<F>(&self, channel: Channel, request: FragmentRequest, on_settle: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        // The abort may settle synchronously and re-enter `release`, so the
        // borrow has to end before it runs.
        let previous = self.slots.borrow_mut().take(&channel);
        if let Some(slot) = previous {
            debug!("superseding request #{} on {channel:?}", slot.id);
            slot.handle.abort();
        }

        let id = {
            let mut slots = self.slots.borrow_mut();
            slots.next_id += 1;
            slots.next_id
        };

        let settled = Rc::new(Cell::new(false));
        let weak: Weak<RefCell<Slots>> = Rc::downgrade(&self.slots);
        let url = request.url.clone();

        let callback = {
            let settled = settled.clone();
            let channel = channel.clone();
            Box::new(move |settlement: Settlement| {
                settled.set(true);
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().release(&channel, id);
                }
                if settlement == Settlement::Aborted {
                    debug!("request #{id} to {url} aborted");
                }
                on_settle(settlement);
            })
        };

        let handle = self.transport.send(request, callback);

        if !settled.get() {
            self.slots.borrow_mut().insert(channel, Slot { id, handle });
        }
    }
}

impl<T> std::fmt::Debug for RequestSequencer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.borrow();
        f.debug_struct("RequestSequencer")
            .field("navigation", &slots.navigation.as_ref().map(|s| s.id))
            .field("fragments", &slots.fragments.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RawResponse, RequestFailure};

    type Callback = Rc<RefCell<Option<Box<dyn FnOnce(Settlement)>>>>;

    struct Sent {
        request: FragmentRequest,
        callback: Callback,
    }

    /// Holds requests until a test completes them. Aborts settle at once
    /// unless `lazy_abort` is set, which mimics `fetch` rejecting later.
    #[derive(Default)]
    struct MockTransport {
        sent: RefCell<Vec<Sent>>,
        lazy_abort: bool,
        immediate: Option<Settlement>,
    }

    struct MockHandle {
        callback: Callback,
        lazy: bool,
    }

    impl InFlight for MockHandle {
        fn abort(&self) {
            if self.lazy {
                return;
            }
            let callback = self.callback.borrow_mut().take();
            if let Some(callback) = callback {
                callback(Settlement::Aborted);
            }
        }
    }

    impl Transport for MockTransport {
        fn send(
            &self,
            request: FragmentRequest,
            on_settle: Box<dyn FnOnce(Settlement)>,
        ) -> Box<dyn InFlight> {
            if let Some(settlement) = self.immediate.clone() {
                on_settle(settlement);
                return Box::new(MockHandle {
                    callback: Rc::default(),
                    lazy: false,
                });
            }

            let callback: Callback = Rc::new(RefCell::new(Some(on_settle)));
            self.sent.borrow_mut().push(Sent {
                request,
                callback: callback.clone(),
            });
            Box::new(MockHandle {
                callback,
                lazy: self.lazy_abort,
            })
        }
    }

    impl MockTransport {
        fn complete(&self, index: usize, settlement: Settlement) {
            let callback = self.sent.borrow()[index].callback.borrow_mut().take();
            callback.expect("request already settled")(settlement);
        }

        fn request(&self, index: usize) -> FragmentRequest {
            self.sent.borrow()[index].request.clone()
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Box<dyn FnOnce(Settlement)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |label: &'static str| {
            let sink = sink.clone();
            Box::new(move |settlement: Settlement| {
                let outcome = match settlement {
                    Settlement::Response(r) => format!("{label}: {}", r.body),
                    Settlement::Failed(f) => format!("{label}: failed {f}"),
                    Settlement::Aborted => format!("{label}: aborted"),
                };
                sink.borrow_mut().push(outcome);
            }) as Box<dyn FnOnce(Settlement)>
        };
        (log, make)
    }

    fn state(path: &str) -> NavigationState {
        NavigationState::new(path)
    }

    #[test]
    fn navigation_request_carries_fragment_and_back_url_headers() {
        let mut nav = state("/admin/pages/edit/show/5").with_fragments(["Content", "Menu"]);
        nav.referrer = Some("/admin/pages?q=about us".to_owned());

        let request = RequestSequencer::<Rc<MockTransport>>::navigation_request(&nav);

        assert_eq!(request.url, "/admin/pages/edit/show/5");
        assert_eq!(request.header_value("X-Pjax"), Some("Content,Menu"));
        assert_eq!(request.header_value("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(request.header_value("X-Backurl"), Some("/admin/pages?q=about%20us"));
    }

    #[test]
    fn back_url_is_omitted_without_referrer_and_kept_raw_when_undecodable() {
        let request =
            RequestSequencer::<Rc<MockTransport>>::navigation_request(&state("/admin"));
        assert_eq!(request.header_value("X-Backurl"), None);

        let mut nav = state("/admin");
        nav.referrer = Some("/admin/%E0%A4%A".to_owned());
        let request = RequestSequencer::<Rc<MockTransport>>::navigation_request(&nav);
        assert_eq!(request.header_value("X-Backurl"), Some("/admin/%E0%A4%A"));
    }

    #[test]
    fn rapid_navigations_abort_the_earlier_request() {
        let transport = Rc::new(MockTransport::default());
        let sequencer = RequestSequencer::new(transport.clone());
        let (log, settle) = recorder();

        sequencer.dispatch_navigation(&state("/admin/A"), settle("A"));
        sequencer.dispatch_navigation(&state("/admin/B"), settle("B"));

        assert_eq!(*log.borrow(), vec!["A: aborted"]);
        assert!(sequencer.has_pending_navigation());

        transport.complete(1, Settlement::Response(RawResponse::new(200, "OK").with_body("B")));

        assert_eq!(*log.borrow(), vec!["A: aborted", "B: B"]);
        assert!(!sequencer.has_pending_navigation());
    }

    #[test]
    fn fragment_channels_are_independent() {
        let transport = Rc::new(MockTransport::default());
        let sequencer = RequestSequencer::new(transport.clone());
        let (log, settle) = recorder();

        sequencer.dispatch_fragment("Menu", "/admin/menu", settle("menu-1"));
        sequencer.dispatch_fragment("Tree", "/admin/tree", settle("tree"));
        sequencer.dispatch_navigation(&state("/admin/pages"), settle("nav"));
        sequencer.dispatch_fragment("Menu", "/admin/menu?v=2", settle("menu-2"));

        assert_eq!(*log.borrow(), vec!["menu-1: aborted"]);
        assert_eq!(sequencer.pending_fragments(), vec!["Menu", "Tree"]);
        assert!(sequencer.has_pending_navigation());
        assert_eq!(transport.request(3).header_value("X-Pjax"), Some("Menu"));
    }

    #[test]
    fn submissions_post_on_the_fragment_channel() {
        let transport = Rc::new(MockTransport::default());
        let sequencer = RequestSequencer::new(transport.clone());
        let (log, settle) = recorder();

        let fragments = vec!["CurrentForm".to_owned(), "Breadcrumbs".to_owned()];
        sequencer.submit(&fragments, "/admin/pages/EditForm", "Title=Home".to_owned(), settle("save"));
        sequencer.dispatch_fragment("CurrentForm", "/admin/pages/edit/show/1", settle("load"));

        assert_eq!(*log.borrow(), vec!["save: aborted"]);
        let request = transport.request(0);
        assert_eq!(request.method, crate::transport::Method::Post);
        assert_eq!(request.header_value("X-Pjax"), Some("CurrentForm,Breadcrumbs"));
        assert_eq!(request.body.as_deref(), Some("Title=Home"));
    }

    #[test]
    fn synchronously_settled_requests_never_occupy_a_slot() {
        let transport = Rc::new(MockTransport {
            immediate: Some(Settlement::Failed(RequestFailure::Network("offline".to_owned()))),
            ..MockTransport::default()
        });
        let sequencer = RequestSequencer::new(transport);
        let (log, settle) = recorder();

        sequencer.dispatch_navigation(&state("/admin"), settle("nav"));
        sequencer.dispatch_fragment("Menu", "/admin/menu", settle("menu"));

        assert!(!sequencer.has_pending_navigation());
        assert!(sequencer.pending_fragments().is_empty());
        assert_eq!(
            *log.borrow(),
            vec!["nav: failed network error: offline", "menu: failed network error: offline"]
        );
    }

    #[test]
    fn late_abort_does_not_release_the_newer_request() {
        let transport = Rc::new(MockTransport {
            lazy_abort: true,
            ..MockTransport::default()
        });
        let sequencer = RequestSequencer::new(transport.clone());
        let (log, settle) = recorder();

        sequencer.dispatch_navigation(&state("/admin/A"), settle("A"));
        sequencer.dispatch_navigation(&state("/admin/B"), settle("B"));
        transport.complete(0, Settlement::Aborted);

        assert_eq!(*log.borrow(), vec!["A: aborted"]);
        assert!(sequencer.has_pending_navigation());
    }

    #[test]
    fn abort_navigation_empties_the_slot() {
        let transport = Rc::new(MockTransport::default());
        let sequencer = RequestSequencer::new(transport);
        let (log, settle) = recorder();

        sequencer.dispatch_navigation(&state("/admin"), settle("nav"));
        sequencer.abort_navigation();

        assert!(!sequencer.has_pending_navigation());
        assert_eq!(*log.borrow(), vec!["nav: aborted"]);
    }
}
