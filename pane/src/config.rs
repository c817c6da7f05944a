use log::debug;
use serde::Deserialize;

use crate::PaneError;

/// Id of the inline JSON script the server renders the configuration into.
pub const CONFIG_SCRIPT_ID: &str = "pane-config";

/// Controller settings. Every field has a default, so an empty object (or
/// no configuration script at all) yields a working setup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaneConfig {
    pub container_selector: String,
    /// Marker class of the container. Loaded fragments must not contain it.
    pub container_class: String,
    pub fragment_attribute: String,
    pub default_fragment: String,
    pub form_fragment: String,
    /// Classes owned by the layout coordinator, carried over on every swap.
    pub layout_classes: Vec<String>,
    pub loading_class: String,
    pub ignored_status_messages: Vec<String>,
    pub status_stay_ms: u32,
    pub tabset_selector: String,
    pub fields_scroller_selector: String,
    /// Point the address bar back at the rendered page when a navigation
    /// request fails.
    pub restore_history_on_failure: bool,
    pub base_href: Option<String>,
}

impl Default for PaneConfig {
    fn default() -> Self {
        Self {
            container_selector: ".cms-container".to_owned(),
            container_class: "cms-container".to_owned(),
            fragment_attribute: "data-pjax-fragment".to_owned(),
            default_fragment: pane_router::DEFAULT_FRAGMENT.to_owned(),
            form_fragment: "CurrentForm".to_owned(),
            layout_classes: ["east", "west", "center", "north", "south", "column-hidden"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            loading_class: "loading".to_owned(),
            ignored_status_messages: vec!["OK".to_owned()],
            status_stay_ms: 5000,
            tabset_selector: ".cms-tabset, .ss-tabset".to_owned(),
            fields_scroller_selector: ".cms-content-fields".to_owned(),
            restore_history_on_failure: true,
            base_href: None,
        }
    }
}

impl PaneConfig {
    pub fn from_json(json: &str) -> Result<Self, PaneError> {
        serde_json::from_str(json).map_err(PaneError::Config)
    }

    /// Read the configuration script from `document`, then remove it. The
    /// base href falls back to the document's `<base>` element.
    pub fn load(document: &web_sys::Document) -> Result<Self, PaneError> {
        let mut config = match document.get_element_by_id(CONFIG_SCRIPT_ID) {
            Some(script) => {
                let config = Self::from_json(&script.text_content().unwrap_or_default())?;
                script.remove();
                config
            }
            None => {
                debug!("no #{CONFIG_SCRIPT_ID} script; using default configuration");
                Self::default()
            }
        };

        if config.base_href.is_none() {
            config.base_href = document
                .query_selector("base[href]")
                .ok()
                .flatten()
                .and_then(|base| base.get_attribute("href"));
        }

        Ok(config)
    }

    pub fn base_href(&self) -> Option<&str> {
        self.base_href.as_deref()
    }

    /// Selector matching every element that declares `name` as a fragment.
    pub fn fragment_selector(&self, name: &str) -> String {
        let name = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("[{}~=\"{name}\"]", self.fragment_attribute)
    }
}
