#![cfg(target_arch = "wasm32")]
#![allow(missing_docs)]

use pane::collaborators::{Collaborators, LayoutBatch};
use pane::replacer::FragmentReplacer;
use pane::status::StatusBanner;
use pane::{Component, ComponentContext, ComponentRegistry, PaneConfig, PaneError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Default)]
struct Redraws {
    count: Cell<usize>,
}

impl Collaborators for Redraws {
    fn redraw(&self) {
        self.count.set(self.count.get() + 1);
    }
    fn open_login_dialog(&self) {}
    fn show_status(&self, _banner: &StatusBanner, _stay_ms: u32) {}
    fn redraw_tabs(&self, _tabset: &web_sys::Element) {}
}

#[derive(Clone, Default)]
struct Lifecycle {
    log: Rc<RefCell<Vec<String>>>,
}

impl Component for Lifecycle {
    fn on_attach(&self, element: &web_sys::Element, _ctx: &ComponentContext) {
        self.log.borrow_mut().push(format!("attach {}", element.id()));
    }

    fn on_detach(&self, element: &web_sys::Element, _ctx: &ComponentContext) {
        self.log.borrow_mut().push(format!("detach {}", element.id()));
    }
}

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

/// Fresh `.cms-container` in the body holding `markup`.
fn mount(markup: &str) -> web_sys::Element {
    let document = document();
    if let Some(old) = document.query_selector(".cms-container").unwrap() {
        old.remove();
    }
    let container = document.create_element("div").unwrap();
    container.set_class_name("cms-container");
    container.set_inner_html(markup);
    document.body().unwrap().append_child(&container).unwrap();
    container
}

fn fragments(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(name, markup)| (name.to_string(), markup.to_string()))
        .collect()
}

#[wasm_bindgen_test]
fn fragments_holding_the_container_are_rejected_untouched() {
    let container = mount(
        r#"<div id="menu" data-pjax-fragment="Menu">old menu</div>
           <div id="content" data-pjax-fragment="Content">old content</div>"#,
    );
    let document = document();
    let config = PaneConfig::default();
    let registry = ComponentRegistry::new();
    let context = ComponentContext::detached();
    let redraws = Rc::new(Redraws::default());
    let layout = LayoutBatch::new(redraws.clone());

    let replacer = FragmentReplacer::new(&document, &config, &registry, &context, &layout);
    let result = replacer.apply(&fragments(&[
        ("Menu", r#"<div data-pjax-fragment="Menu">new menu</div>"#),
        ("Content", r#"<div class="cms-container">nested</div>"#),
    ]));

    assert!(matches!(result, Err(PaneError::CyclicFragment { ref fragment, .. }) if fragment == "Content"));
    assert!(result.unwrap_err().is_fatal());
    assert!(container.inner_html().contains("old menu"));
    assert!(container.inner_html().contains("old content"));
    assert_eq!(redraws.count.get(), 0);
}

#[wasm_bindgen_test]
fn several_fragments_reflow_once() {
    mount(
        r#"<div data-pjax-fragment="Menu"></div>
           <div data-pjax-fragment="Breadcrumbs"></div>
           <div data-pjax-fragment="Content"></div>"#,
    );
    let document = document();
    let config = PaneConfig::default();
    let registry = ComponentRegistry::new();
    let context = ComponentContext::detached();
    let redraws = Rc::new(Redraws::default());
    let layout = LayoutBatch::new(redraws.clone());

    let replacer = FragmentReplacer::new(&document, &config, &registry, &context, &layout);
    let inserted = replacer
        .apply(&fragments(&[
            ("Menu", r#"<nav data-pjax-fragment="Menu">m</nav>"#),
            ("Breadcrumbs", r#"<p data-pjax-fragment="Breadcrumbs">b</p>"#),
            ("Content", r#"<section data-pjax-fragment="Content">c</section>"#),
        ]))
        .unwrap();

    assert_eq!(inserted.len(), 3);
    assert_eq!(redraws.count.get(), 1);
}

#[wasm_bindgen_test]
fn layout_classes_and_inline_style_survive_the_swap() {
    mount(
        r#"<div class="east loading" style="width: 200px" data-pjax-fragment="Content">old</div>"#,
    );
    let document = document();
    let config = PaneConfig::default();
    let registry = ComponentRegistry::new();
    let context = ComponentContext::detached();
    let layout = LayoutBatch::new(Rc::new(Redraws::default()));

    let replacer = FragmentReplacer::new(&document, &config, &registry, &context, &layout);
    let inserted = replacer
        .apply(&fragments(&[(
            "Content",
            r#"<div class="cms-content" data-pjax-fragment="Content">new</div>"#,
        )]))
        .unwrap();

    let root = &inserted[0];
    assert!(root.class_list().contains("east"));
    assert!(root.class_list().contains("cms-content"));
    assert!(!root.class_list().contains("loading"));
    assert_eq!(root.get_attribute("style").as_deref(), Some("width: 200px"));
}

#[wasm_bindgen_test]
fn styles_move_to_the_head() {
    mount(r#"<div data-pjax-fragment="Content"></div>"#);
    let document = document();
    let config = PaneConfig::default();
    let registry = ComponentRegistry::new();
    let context = ComponentContext::detached();
    let layout = LayoutBatch::new(Rc::new(Redraws::default()));

    let replacer = FragmentReplacer::new(&document, &config, &registry, &context, &layout);
    replacer
        .apply(&fragments(&[(
            "Content",
            r#"<div data-pjax-fragment="Content"><style id="fragment-style">.x{}</style>body</div>"#,
        )]))
        .unwrap();

    let style = document.get_element_by_id("fragment-style").unwrap();
    assert_eq!(style.parent_element().unwrap().tag_name(), "HEAD");
    style.remove();
}

#[wasm_bindgen_test]
fn every_target_gets_a_copy_and_components_follow() {
    mount(
        r#"<div id="top" class="widget" data-pjax-fragment="Notice">a</div>
           <div id="bottom" class="widget" data-pjax-fragment="Notice">b</div>"#,
    );
    let document = document();
    let config = PaneConfig::default();
    let lifecycle = Lifecycle::default();
    let mut registry = ComponentRegistry::new();
    registry.bind(".widget", lifecycle.clone());
    let context = ComponentContext::detached();
    let layout = LayoutBatch::new(Rc::new(Redraws::default()));

    let replacer = FragmentReplacer::new(&document, &config, &registry, &context, &layout);
    let inserted = replacer
        .apply(&fragments(&[(
            "Notice",
            r#"<div id="notice" class="widget" data-pjax-fragment="Notice">fresh</div>"#,
        )]))
        .unwrap();

    assert_eq!(inserted.len(), 2);
    assert_eq!(
        document.query_selector_all("[data-pjax-fragment~=\"Notice\"]").unwrap().length(),
        2
    );
    assert_eq!(
        *lifecycle.log.borrow(),
        vec!["detach top", "attach notice", "detach bottom", "attach notice"]
    );
}
