#![allow(missing_docs)]

use pane_router::{
    FORCE_RELOAD_KEY, HistoryBackend, HistoryBridge, MemoryHistory, NavigationIntent,
    NavigationState, Transition,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn allow(_: &[String]) -> bool {
    true
}

fn deny(_: &[String]) -> bool {
    false
}

fn started(url: &str) -> (Rc<MemoryHistory>, HistoryBridge<Rc<MemoryHistory>>) {
    let history = Rc::new(MemoryHistory::new(url));
    let mut bridge = HistoryBridge::new(history.clone());
    bridge.start().unwrap();
    (history, bridge)
}

fn proceed(transition: Transition) -> NavigationState {
    match transition {
        Transition::Proceed(state) => state,
        other => panic!("expected navigation to proceed, got {other:?}"),
    }
}

#[test]
fn start_stamps_the_initial_entry() {
    let (history, bridge) = started("/admin");

    assert_eq!(history.current_state(), Some(NavigationState::new("/admin")));
    assert_eq!(bridge.current().map(|s| s.path.as_str()), Some("/admin"));
}

#[test]
fn navigate_pushes_a_new_entry_with_referrer() {
    let (history, mut bridge) = started("/admin");

    let state = proceed(
        bridge
            .navigate(
                NavigationIntent::new("/admin/pages").fragments(["Content", "Menu"]),
                &allow,
            )
            .unwrap(),
    );

    assert_eq!(state.referrer.as_deref(), Some("/admin"));
    assert_eq!(state.fragment_header(), "Content,Menu");
    assert_eq!(history.len(), 2);
    assert_eq!(history.current_state(), Some(state));
}

#[test]
fn identical_urls_are_distinct_intents() {
    let (history, mut bridge) = started("/admin");

    proceed(bridge.navigate(NavigationIntent::new("/admin/A"), &allow).unwrap());
    proceed(bridge.navigate(NavigationIntent::new("/admin/A"), &allow).unwrap());

    assert_eq!(history.len(), 3);
}

#[test]
fn force_reload_replaces_with_a_fresh_token() {
    let (history, mut bridge) = started("/admin");

    let first = proceed(
        bridge
            .navigate(NavigationIntent::new("/admin").force_reload(true), &allow)
            .unwrap(),
    );
    let second = proceed(
        bridge
            .navigate(NavigationIntent::new("/admin").force_reload(true), &allow)
            .unwrap(),
    );

    assert_eq!(history.len(), 1);
    assert_ne!(first.extra[FORCE_RELOAD_KEY], second.extra[FORCE_RELOAD_KEY]);
}

#[test]
fn vetoed_navigate_leaves_history_untouched() {
    let (history, mut bridge) = started("/admin/O");

    let asked = RefCell::new(Vec::new());
    let guard = |fragments: &[String]| {
        asked.borrow_mut().push(fragments.to_vec());
        false
    };

    let transition = bridge
        .navigate(NavigationIntent::new("/admin/X"), &guard)
        .unwrap();

    assert_eq!(transition, Transition::Vetoed);
    assert_eq!(asked.into_inner(), vec![vec!["Content".to_owned()]]);
    assert_eq!(history.current_url(), "/admin/O");
    assert_eq!(bridge.current().map(|s| s.path.as_str()), Some("/admin/O"));
}

#[test]
fn vetoed_pop_restores_the_last_state() {
    for (origin, target) in [("/admin/O", "/admin/X"), ("/", "/admin/pages?q=1"), ("/a", "/a")] {
        let (history, mut bridge) = started(origin);

        proceed(bridge.navigate(NavigationIntent::new(target), &allow).unwrap());
        let (entry, url) = history.go_back().unwrap();
        proceed(bridge.pop(entry, &url, &allow).unwrap());

        // Forward to the target again, refused by the user.
        let (entry, url) = history.forward().unwrap();
        let transition = bridge.pop(entry, &url, &deny).unwrap();

        assert_eq!(transition, Transition::Vetoed);
        assert_eq!(history.current_url(), origin);
        assert_eq!(history.current_state().map(|s| s.path), Some(origin.to_owned()));
        assert_eq!(bridge.current().map(|s| s.path.as_str()), Some(origin));
        assert!(!bridge.is_paused());
    }
}

#[test]
fn vetoed_pop_without_known_state_steps_back_and_swallows_the_echo() {
    let history = Rc::new(MemoryHistory::new("/admin/O"));
    history.push_state(&NavigationState::new("/admin/X")).unwrap();
    history.go_back();
    let mut bridge = HistoryBridge::new(history.clone());

    assert!(!bridge.swallows_next_pop());
    let (entry, url) = history.forward().unwrap();
    assert_eq!(bridge.pop(entry, &url, &deny).unwrap(), Transition::Vetoed);
    assert_eq!(history.current_url(), "/admin/O");
    assert!(bridge.swallows_next_pop());

    // The browser reports the rollback's own back() as a pop.
    let guard_calls = Cell::new(0);
    let counting = |_: &[String]| {
        guard_calls.set(guard_calls.get() + 1);
        true
    };
    let transition = bridge
        .pop(history.current_state(), &history.current_url(), &counting)
        .unwrap();

    assert_eq!(transition, Transition::Suppressed);
    assert_eq!(guard_calls.get(), 0);
    assert!(!bridge.swallows_next_pop());
}

#[test]
fn pop_without_entry_state_rebuilds_from_url() {
    let (_history, mut bridge) = started("/admin");

    let state = proceed(bridge.pop(None, "/admin/pages", &allow).unwrap());

    assert_eq!(state, NavigationState::new("/admin/pages"));
}

#[test]
fn stateless_backend_still_emits_transitions() {
    let history = Rc::new(MemoryHistory::stateless("/admin"));
    let mut bridge = HistoryBridge::new(history.clone());
    bridge.start().unwrap();

    let state = proceed(bridge.navigate(NavigationIntent::new("/admin/A"), &allow).unwrap());

    assert_eq!(state.path, "/admin/A");
    assert_eq!(history.len(), 1);
    assert_eq!(history.current_state(), None);
}

#[test]
fn revert_to_rendered_restores_the_address_bar() {
    let (history, mut bridge) = started("/admin/O");

    proceed(bridge.navigate(NavigationIntent::new("/admin/broken"), &allow).unwrap());
    assert_eq!(history.current_url(), "/admin/broken");

    assert!(bridge.revert_to_rendered().unwrap());
    assert_eq!(history.current_url(), "/admin/O");
    assert_eq!(bridge.current().map(|s| s.path.as_str()), Some("/admin/O"));
    assert!(!bridge.revert_to_rendered().unwrap());
}

#[test]
fn rendered_state_follows_successful_loads() {
    let (_history, mut bridge) = started("/admin");

    let state = proceed(bridge.navigate(NavigationIntent::new("/admin/A"), &allow).unwrap());
    bridge.mark_rendered(&state);

    assert!(!bridge.revert_to_rendered().unwrap());
    assert_eq!(bridge.rendered(), Some(&state));
}
