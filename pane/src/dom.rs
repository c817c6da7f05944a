use serde::Serialize;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::{PaneConfig, PaneError};

pub fn window() -> Result<web_sys::Window, PaneError> {
    web_sys::window().ok_or_else(|| PaneError::Dom("no window".to_owned()))
}

pub fn document() -> Result<web_sys::Document, PaneError> {
    window()?
        .document()
        .ok_or_else(|| PaneError::Dom("no document".to_owned()))
}

pub fn elements(list: &web_sys::NodeList) -> Vec<web_sys::Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
        .collect()
}

pub fn query_all(root: &web_sys::Element, selector: &str) -> Result<Vec<web_sys::Element>, PaneError> {
    Ok(elements(&root.query_selector_all(selector)?))
}

pub fn document_query_all(
    document: &web_sys::Document,
    selector: &str,
) -> Result<Vec<web_sys::Element>, PaneError> {
    Ok(elements(&document.query_selector_all(selector)?))
}

/// `root` itself (when it matches) followed by its matching descendants.
pub fn query_inclusive(
    root: &web_sys::Element,
    selector: &str,
) -> Result<Vec<web_sys::Element>, PaneError> {
    let mut found = Vec::new();
    if root.matches(selector)? {
        found.push(root.clone());
    }
    found.extend(query_all(root, selector)?);
    Ok(found)
}

/// Live elements declaring fragment `name`.
pub fn fragment_targets(
    document: &web_sys::Document,
    config: &PaneConfig,
    name: &str,
) -> Result<Vec<web_sys::Element>, PaneError> {
    document_query_all(document, &config.fragment_selector(name))
}

/// Whether every name in `fragments` has at least one live target.
pub fn fragments_present(
    document: &web_sys::Document,
    config: &PaneConfig,
    fragments: &[String],
) -> Result<bool, PaneError> {
    for name in fragments {
        if document.query_selector(&config.fragment_selector(name))?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, PaneError> {
    let json = serde_json::to_string(value).map_err(PaneError::Serialize)?;
    Ok(js_sys::JSON::parse(&json)?)
}

/// Dispatch a bubbling `name` event carrying `detail` from `target`.
pub fn dispatch_custom(
    target: &web_sys::EventTarget,
    name: &str,
    detail: &JsValue,
) -> Result<bool, PaneError> {
    let init = web_sys::CustomEventInit::new();
    init.set_bubbles(true);
    init.set_detail(detail);

    let event = web_sys::CustomEvent::new_with_event_init_dict(name, &init)?;
    Ok(target.dispatch_event(&event)?)
}

pub fn is_same(a: &web_sys::Element, b: &web_sys::Element) -> bool {
    let b: &web_sys::Node = b;
    a.is_same_node(Some(b))
}

/// Whether `descendant` is `ancestor` or lies inside it.
pub fn contains(ancestor: &web_sys::Element, descendant: &web_sys::Element) -> bool {
    let descendant: &web_sys::Node = descendant;
    ancestor.contains(Some(descendant))
}

/// Whether `element` takes up space on the page.
pub fn is_visible(element: &web_sys::Element) -> bool {
    element
        .dyn_ref::<web_sys::HtmlElement>()
        .is_some_and(|el| el.offset_width() > 0 || el.offset_height() > 0 || el.get_client_rects().length() > 0)
}

pub fn describe(element: &web_sys::Element) -> String {
    let tag = element.tag_name().to_ascii_lowercase();
    match element.get_attribute("id") {
        Some(id) if !id.is_empty() => format!("<{tag} id=\"{id}\">"),
        _ => format!("<{tag}>"),
    }
}

/// An event listener that stays registered until dropped.
pub struct EventListener {
    target: web_sys::EventTarget,
    kind: String,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl EventListener {
    pub fn new<F>(target: &web_sys::EventTarget, kind: &str, callback: F) -> Result<Self, PaneError>
    where
        F: FnMut(web_sys::Event) + 'static,
    {
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut(web_sys::Event)>);
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;

        Ok(Self {
            target: target.clone(),
            kind: kind.to_owned(),
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(&self.kind, self.callback.as_ref().unchecked_ref());
    }
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener").field("kind", &self.kind).finish_non_exhaustive()
    }
}
