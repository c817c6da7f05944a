use log::debug;
use wasm_bindgen::JsCast;

use crate::state_store::StateStore;
use crate::{PaneConfig, PaneError, dom};

const FOCUSABLE: &str = "input, select, textarea, button";

/// Remember `selected` as the focused element of `form`. Forms or elements
/// without an id are not tracked.
pub fn save(store: &StateStore, form: &web_sys::Element, selected: &web_sys::Element) -> Result<(), PaneError> {
    let (form_id, element_id) = (form.id(), selected.id());
    if form_id.is_empty() || element_id.is_empty() {
        debug!("focus of {} not tracked: missing id", dom::describe(form));
        return Ok(());
    }

    store.save_focus(&form_id, &element_id)
}

/// Whether a form control may receive focus automatically: anything that
/// is not a submit control and not marked `data-skip-autofocus="true"`.
pub fn is_autofocus_candidate(tag: &str, input_type: Option<&str>, skip_autofocus: Option<&str>) -> bool {
    if skip_autofocus == Some("true") {
        return false;
    }

    let input_type = input_type.map(str::to_ascii_lowercase);
    match tag.to_ascii_lowercase().as_str() {
        "input" => !matches!(input_type.as_deref(), Some("submit" | "image" | "hidden")),
        // Buttons submit unless told otherwise.
        "button" => matches!(input_type.as_deref(), Some("button" | "reset")),
        "select" | "textarea" => true,
        _ => false,
    }
}

fn first_focusable(form: &web_sys::Element) -> Result<Option<web_sys::Element>, PaneError> {
    Ok(dom::query_all(form, FOCUSABLE)?.into_iter().find(|el| {
        is_autofocus_candidate(
            &el.tag_name(),
            el.get_attribute("type").as_deref(),
            el.get_attribute("data-skip-autofocus").as_deref(),
        ) && dom::is_visible(el)
    }))
}

/// Whether `target` sits inside a tab panel that is not showing.
fn in_inactive_tab(target: &web_sys::Element, config: &PaneConfig) -> bool {
    if target.closest(&config.tabset_selector).ok().flatten().is_none() {
        return false;
    }

    target
        .closest("[role=tabpanel]")
        .ok()
        .flatten()
        .is_some_and(|panel| !dom::is_visible(&panel))
}

/// Target for a restored focus: the persisted element, its `.field` when the
/// element itself is hidden, or the first focusable control. `Ok(None)` when
/// the persisted element lies in a tab the user cannot see.
fn resolve_target(
    store: &StateStore,
    config: &PaneConfig,
    document: &web_sys::Document,
    form: &web_sys::Element,
) -> Result<Option<web_sys::Element>, PaneError> {
    let persisted = store
        .load_focus(&form.id())
        .and_then(|id| document.get_element_by_id(&id))
        .filter(|el| dom::contains(form, el));

    let Some(target) = persisted else {
        return first_focusable(form);
    };

    if in_inactive_tab(&target, config) {
        debug!("{} is in an inactive tab; not focusing", dom::describe(&target));
        return Ok(None);
    }

    if dom::is_visible(&target) {
        return Ok(Some(target));
    }

    match target.closest(".field")? {
        Some(field) => Ok(Some(field)),
        None => first_focusable(form),
    }
}

/// Scroll the fields scroller so `target` is in view, but only when it sits
/// in the lower half of the viewport.
fn scroll_into_view(
    window: &web_sys::Window,
    config: &PaneConfig,
    form: &web_sys::Element,
    target: &web_sys::Element,
) -> Result<(), PaneError> {
    let viewport = window.inner_height()?.as_f64().unwrap_or_default();
    let top = target.get_bounding_client_rect().top();
    if top <= viewport / 2.0 {
        return Ok(());
    }

    let scroller = match form.query_selector(&config.fields_scroller_selector)? {
        Some(scroller) => Some(scroller),
        None => form.closest(&config.fields_scroller_selector)?,
    };
    if let Some(scroller) = scroller {
        let offset = top - scroller.get_bounding_client_rect().top();
        scroller.set_scroll_top(scroller.scroll_top() + offset as i32);
    }
    Ok(())
}

/// Focus the element `form` last had focus on. Returns the element that
/// received focus.
pub fn restore(
    store: &StateStore,
    config: &PaneConfig,
    form: &web_sys::Element,
) -> Result<Option<web_sys::Element>, PaneError> {
    let window = dom::window()?;
    let document = dom::document()?;

    let Some(target) = resolve_target(store, config, &document, form)? else {
        return Ok(None);
    };

    if let Some(html) = target.dyn_ref::<web_sys::HtmlElement>() {
        html.focus()?;
    }
    scroll_into_view(&window, config, form, &target)?;

    Ok(Some(target))
}
