use log::{debug, error};
use pane::prelude::*;
use pane::web_sys;

pub const SELECTOR: &str = "form.cms-edit-form";

/// Edit forms: submitted in the background, with the focused field
/// remembered across reloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditForm;

impl Component for EditForm {
    fn events(&self) -> &'static [&'static str] {
        &["focusin", "submit"]
    }

    fn on_attach(&self, element: &web_sys::Element, ctx: &ComponentContext) {
        let Some(controller) = ctx.controller() else {
            return;
        };
        match controller.restore_field_focus(element) {
            Ok(Some(focused)) => debug!("focus restored to #{}", focused.id()),
            Ok(None) => {}
            Err(e) => error!("could not restore focus: {e}"),
        }
    }

    fn on_event(&self, element: &web_sys::Element, event: &web_sys::Event, ctx: &ComponentContext) {
        let Some(controller) = ctx.controller() else {
            return;
        };

        match event.type_().as_str() {
            "focusin" => {
                let Some(field) = event.target().and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                else {
                    return;
                };
                if let Err(e) = controller.save_field_focus(element, &field) {
                    error!("could not save focus: {e}");
                }
            }
            "submit" => {
                let Some(form) = element.dyn_ref::<web_sys::HtmlFormElement>() else {
                    return;
                };
                event.prevent_default();

                let button = event
                    .dyn_ref::<web_sys::SubmitEvent>()
                    .and_then(|submit| submit.submitter())
                    .and_then(|submitter| submitter.dyn_into::<web_sys::Element>().ok());
                if let Err(e) = controller.submit_form(form, button.as_ref()) {
                    error!("could not submit {}: {e}", form.id());
                }
            }
            _ => {}
        }
    }
}
