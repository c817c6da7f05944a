use log::{debug, error};
use pane::prelude::*;
use pane::web_sys;

/// Links that load into the panel instead of reloading the page. The
/// optional `data-pjax-target` lists the fragments to fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelLink;

pub const SELECTOR: &str = "a.cms-panel-link, a[data-pjax-target]";

/// Only an unmodified primary-button click stays in the panel; anything
/// else is left to the browser (new tab, download, ...).
pub fn is_plain_click(button: i16, modified: bool, target: Option<&str>) -> bool {
    button == 0 && !modified && target.is_none_or(|t| t.is_empty() || t == "_self")
}

/// Navigation requested by `link`.
pub fn intent_for(href: &str, fragments: Option<&str>) -> NavigationIntent {
    let intent = NavigationIntent::new(href);
    match fragments {
        Some(list) => intent.fragments(pane::pane_utils::parse_fragment_list(list)),
        None => intent,
    }
}

impl Component for PanelLink {
    fn events(&self) -> &'static [&'static str] {
        &["click"]
    }

    fn on_event(&self, element: &web_sys::Element, event: &web_sys::Event, ctx: &ComponentContext) {
        let Some(click) = event.dyn_ref::<web_sys::MouseEvent>() else {
            return;
        };
        let modified = click.meta_key() || click.ctrl_key() || click.shift_key() || click.alt_key();
        if !is_plain_click(click.button(), modified, element.get_attribute("target").as_deref()) {
            return;
        }

        let Some(href) = element.get_attribute("href").filter(|href| !href.starts_with('#')) else {
            return;
        };
        let Some(controller) = ctx.controller() else {
            return;
        };

        event.prevent_default();
        let intent = intent_for(&href, element.get_attribute("data-pjax-target").as_deref());
        match controller.navigate(intent) {
            Ok(Transition::Proceed(_)) => {}
            Ok(transition) => debug!("link to {href} not followed: {transition:?}"),
            Err(e) => error!("link to {href} failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_clicks_are_left_to_the_browser() {
        assert!(is_plain_click(0, false, None));
        assert!(is_plain_click(0, false, Some("_self")));
        assert!(!is_plain_click(1, false, None));
        assert!(!is_plain_click(0, true, None));
        assert!(!is_plain_click(0, false, Some("_blank")));
    }

    #[test]
    fn target_attribute_selects_fragments() {
        let intent = intent_for("/admin/pages", Some("Content, Breadcrumbs"));
        assert_eq!(intent.fragment_names(), vec!["Content", "Breadcrumbs"]);

        let intent = intent_for("/admin/pages", None);
        assert_eq!(intent.fragment_names(), vec!["Content"]);
    }
}
