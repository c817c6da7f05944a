use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::PaneError;
use crate::storage::{SessionStorage, StorageError};

const TAB_KEY_PREFIX: &str = "tabs-";

/// Selected tab of one tabset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStateRecord {
    pub id: String,
    #[serde(rename = "selectedIndex")]
    pub selected: usize,
}

/// Last focused element of one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusStateRecord {
    pub id: String,
    #[serde(rename = "selectedElementId")]
    pub selected: String,
}

/// Tab and focus state persisted per page in session storage. Without a
/// storage backend every operation is a no-op.
#[derive(Clone)]
pub struct StateStore {
    storage: Option<Rc<dyn SessionStorage>>,
    base_href: Option<String>,
}

impl StateStore {
    pub fn new(storage: Option<Rc<dyn SessionStorage>>, base_href: Option<String>) -> Self {
        Self { storage, base_href }
    }

    pub fn is_enabled(&self) -> bool {
        self.storage.is_some()
    }

    /// Storage key for the tab state of the page at `url`.
    pub fn tab_key(&self, url: &str) -> String {
        format!(
            "{TAB_KEY_PREFIX}{}",
            pane_utils::normalize_state_url(url, self.base_href.as_deref())
        )
    }

    pub fn save_tabs(&self, url: &str, records: &[TabStateRecord]) -> Result<(), PaneError> {
        let json = serde_json::to_string(records).map_err(PaneError::Serialize)?;
        self.write(&self.tab_key(url), &json)
    }

    pub fn load_tabs(&self, url: &str) -> Vec<TabStateRecord> {
        self.read(&self.tab_key(url)).unwrap_or_default()
    }

    /// Forget the tab state of `url`, or of every page when `url` is `None`.
    pub fn clear_tabs(&self, url: Option<&str>) {
        let Some(storage) = &self.storage else {
            return;
        };

        match url {
            Some(url) => storage.remove_item(&self.tab_key(url)),
            None => {
                let keys: Vec<String> = (0..storage.length())
                    .filter_map(|i| storage.key(i))
                    .filter(|key| key.starts_with(TAB_KEY_PREFIX))
                    .collect();
                for key in keys {
                    storage.remove_item(&key);
                }
            }
        }
    }

    pub fn save_focus(&self, form_id: &str, element_id: &str) -> Result<(), PaneError> {
        let record = [FocusStateRecord {
            id: form_id.to_owned(),
            selected: element_id.to_owned(),
        }];
        let json = serde_json::to_string(&record).map_err(PaneError::Serialize)?;
        self.write(form_id, &json)
    }

    pub fn load_focus(&self, form_id: &str) -> Option<String> {
        let records: Vec<FocusStateRecord> = self.read(form_id)?;
        records
            .into_iter()
            .find(|record| record.id == form_id)
            .map(|record| record.selected)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.as_ref()?.get_item(key)?;

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("ignoring unreadable session entry {key}: {e}");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PaneError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        match storage.set_item(key, value) {
            Ok(()) => Ok(()),
            // Some browsers report a zero quota instead of no storage.
            Err(StorageError::QuotaExceeded) if storage.length() == 0 => {
                debug!("session storage has no quota; state for {key} not saved");
                Ok(())
            }
            Err(e) => Err(PaneError::Storage(e.to_string())),
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("enabled", &self.storage.is_some())
            .field("base_href", &self.base_href)
            .finish()
    }
}

/// Pick the tab to select: a forced marker wins, then an override carried
/// by the navigation, then the persisted index. Candidates outside the
/// tabset are skipped; `None` leaves the tabset unchanged.
pub fn resolve_tab_index(
    forced: Option<usize>,
    override_index: Option<usize>,
    persisted: Option<usize>,
    count: usize,
) -> Option<usize> {
    [forced, override_index, persisted]
        .into_iter()
        .flatten()
        .find(|&index| index < count)
}
