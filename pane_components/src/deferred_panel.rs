use log::error;
use pane::prelude::*;
use pane::web_sys;

pub const SELECTOR: &str = ".cms-panel-deferred[data-url]";

/// Panels whose content is fetched from `data-url` once they are on the
/// page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredPanel;

impl Component for DeferredPanel {
    fn on_attach(&self, element: &web_sys::Element, ctx: &ComponentContext) {
        if let Some(controller) = ctx.controller()
            && let Err(e) = controller.load_deferred(element)
        {
            error!("deferred panel: {e}");
        }
    }
}
