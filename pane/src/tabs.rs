use log::debug;
use serde_json::{Map, Value};

use crate::state_store::{TabStateRecord, resolve_tab_index};
use crate::{PaneConfig, PaneError, dom};

const FORCE_ACTIVE_CLASS: &str = "ss-tabs-force-active";
const IGNORE_ATTRIBUTE: &str = "data-ignore-tab-state";

/// Tab widget access. Indices count the tabs of one tabset in document
/// order.
pub trait Tabs {
    fn count(&self, tabset: &web_sys::Element) -> usize;
    fn selected(&self, tabset: &web_sys::Element) -> Option<usize>;
    fn select(&self, tabset: &web_sys::Element, index: usize) -> Result<(), PaneError>;
    /// Tab carrying the force-active marker.
    fn forced(&self, tabset: &web_sys::Element) -> Option<usize>;
    /// Tab that is, contains, is contained by or controls the first element
    /// matching `selector` inside the tabset.
    fn index_matching(&self, tabset: &web_sys::Element, selector: &str) -> Option<usize>;
}

/// WAI-ARIA tabs: `[role=tab]` elements with `aria-selected`, panels linked
/// through `aria-controls`.
#[derive(Debug, Clone)]
pub struct AriaTabs {
    tabset_selector: String,
}

impl AriaTabs {
    pub fn new(tabset_selector: impl Into<String>) -> Self {
        Self {
            tabset_selector: tabset_selector.into(),
        }
    }

    /// Tabs owned by `tabset`, excluding those of nested tabsets.
    fn tabs(&self, tabset: &web_sys::Element) -> Vec<web_sys::Element> {
        dom::query_all(tabset, "[role=tab]")
            .unwrap_or_default()
            .into_iter()
            .filter(|tab| {
                tab.closest(&self.tabset_selector)
                    .ok()
                    .flatten()
                    .is_some_and(|owner| dom::is_same(&owner, tabset))
            })
            .collect()
    }

    fn panel(tab: &web_sys::Element) -> Option<web_sys::Element> {
        let id = tab.get_attribute("aria-controls")?;
        tab.owner_document()?.get_element_by_id(&id)
    }
}

impl Tabs for AriaTabs {
    fn count(&self, tabset: &web_sys::Element) -> usize {
        self.tabs(tabset).len()
    }

    fn selected(&self, tabset: &web_sys::Element) -> Option<usize> {
        self.tabs(tabset)
            .iter()
            .position(|tab| tab.get_attribute("aria-selected").as_deref() == Some("true"))
    }

    fn select(&self, tabset: &web_sys::Element, index: usize) -> Result<(), PaneError> {
        for (i, tab) in self.tabs(tabset).iter().enumerate() {
            let active = i == index;
            tab.set_attribute("aria-selected", if active { "true" } else { "false" })?;
            tab.set_attribute("tabindex", if active { "0" } else { "-1" })?;

            if let Some(panel) = Self::panel(tab) {
                if active {
                    panel.remove_attribute("hidden")?;
                } else {
                    panel.set_attribute("hidden", "")?;
                }
            }
        }
        Ok(())
    }

    fn forced(&self, tabset: &web_sys::Element) -> Option<usize> {
        let marker = format!(".{FORCE_ACTIVE_CLASS}");
        self.tabs(tabset).iter().position(|tab| {
            tab.closest(&marker)
                .ok()
                .flatten()
                .is_some_and(|owner| dom::contains(tabset, &owner))
        })
    }

    fn index_matching(&self, tabset: &web_sys::Element, selector: &str) -> Option<usize> {
        let target = tabset.query_selector(selector).ok().flatten()?;
        let target_id = target.id();

        self.tabs(tabset).iter().position(|tab| {
            dom::contains(tab, &target)
                || dom::contains(&target, tab)
                || (!target_id.is_empty()
                    && (tab.get_attribute("aria-controls").as_deref() == Some(target_id.as_str())
                        || tab.get_attribute("href") == Some(format!("#{target_id}"))))
        })
    }
}

/// Selection requested for one tabset by the navigation that loaded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOverride {
    Index(usize),
    Selector(String),
}

impl TabOverride {
    /// `3`, `{"selected": 3}` or `{"tabSelector": "#Root_Settings"}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(index) = value.as_u64() {
            return usize::try_from(index).ok().map(Self::Index);
        }

        let object = value.as_object()?;
        if let Some(selector) = object.get("tabSelector").and_then(Value::as_str) {
            return Some(Self::Selector(selector.to_owned()));
        }
        object
            .get("selected")
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .map(Self::Index)
    }
}

fn is_ignored(tabset: &web_sys::Element) -> bool {
    tabset.get_attribute(IGNORE_ATTRIBUTE).as_deref() == Some("true")
}

fn tabsets(root: &web_sys::Element, config: &PaneConfig) -> Result<Vec<web_sys::Element>, PaneError> {
    dom::query_inclusive(root, &config.tabset_selector)
}

/// Current selection of every stateful tabset under `root`. Tabsets without
/// an id, without tabs or opted out are skipped.
pub fn collect(
    root: &web_sys::Element,
    config: &PaneConfig,
    tabs: &dyn Tabs,
) -> Result<Vec<TabStateRecord>, PaneError> {
    let mut records = Vec::new();

    for tabset in tabsets(root, config)? {
        let id = tabset.id();
        if id.is_empty() || is_ignored(&tabset) {
            continue;
        }
        if let Some(selected) = tabs.selected(&tabset) {
            records.push(TabStateRecord { id, selected });
        }
    }

    Ok(records)
}

/// Reselect tabs under `root`. Returns the tabsets whose selection was
/// resolved.
pub fn restore(
    root: &web_sys::Element,
    config: &PaneConfig,
    tabs: &dyn Tabs,
    persisted: &[TabStateRecord],
    overrides: Option<&Map<String, Value>>,
) -> Result<Vec<web_sys::Element>, PaneError> {
    let mut restored = Vec::new();

    for tabset in tabsets(root, config)? {
        let id = tabset.id();
        let count = tabs.count(&tabset);
        if id.is_empty() || count == 0 {
            continue;
        }

        let override_index = overrides
            .and_then(|o| o.get(&id))
            .and_then(TabOverride::from_value)
            .and_then(|o| match o {
                TabOverride::Index(index) => Some(index),
                TabOverride::Selector(selector) => tabs.index_matching(&tabset, &selector),
            });
        let persisted_index = if is_ignored(&tabset) {
            None
        } else {
            persisted.iter().find(|r| r.id == id).map(|r| r.selected)
        };

        let Some(index) = resolve_tab_index(tabs.forced(&tabset), override_index, persisted_index, count)
        else {
            continue;
        };

        if tabs.selected(&tabset) != Some(index) {
            debug!("restoring tab {index} of #{id}");
            tabs.select(&tabset, index)?;
        }
        restored.push(tabset);
    }

    Ok(restored)
}
