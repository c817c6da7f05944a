use log::debug;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use wasm_bindgen::JsCast;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("{0}")]
    Other(String),
}

/// Session scoped key/value storage.
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str);
    /// Number of stored keys.
    fn length(&self) -> u32;
    /// Name of the `index`th key.
    fn key(&self, index: u32) -> Option<String>;
}

impl<T: SessionStorage + ?Sized> SessionStorage for Rc<T> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) {
        (**self).remove_item(key)
    }

    fn length(&self) -> u32 {
        (**self).length()
    }

    fn key(&self, index: u32) -> Option<String> {
        (**self).key(index)
    }
}

/// `window.sessionStorage`.
#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: web_sys::Storage,
}

impl WebStorage {
    /// `None` when session storage is unavailable, e.g. disabled by privacy
    /// settings or in a sandboxed frame.
    pub fn probe() -> Option<Self> {
        let window = web_sys::window()?;

        match window.session_storage() {
            Ok(Some(storage)) => Some(Self { storage }),
            Ok(None) => {
                debug!("session storage unavailable");
                None
            }
            Err(e) => {
                debug!("session storage access denied: {e:?}");
                None
            }
        }
    }
}

fn is_quota_error(value: &wasm_bindgen::JsValue) -> bool {
    value.dyn_ref::<web_sys::DomException>().is_some_and(|e| {
        e.code() == 22
            || matches!(
                e.name().as_str(),
                "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED"
            )
    })
}

impl SessionStorage for WebStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|e| {
            if is_quota_error(&e) {
                StorageError::QuotaExceeded
            } else {
                StorageError::Other(format!("{e:?}"))
            }
        })
    }

    fn remove_item(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            debug!("could not remove {key} from session storage: {e:?}");
        }
    }

    fn length(&self) -> u32 {
        self.storage.length().unwrap_or(0)
    }

    fn key(&self, index: u32) -> Option<String> {
        self.storage.key(index).ok().flatten()
    }
}

/// In-process storage with an optional byte quota over keys and values.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<Vec<(String, String)>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: RefCell::default(),
            quota: Some(quota),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.borrow_mut();

        if let Some(quota) = self.quota {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        match items.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => items.push((key.to_owned(), value.to_owned())),
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().retain(|(k, _)| k != key);
    }

    fn length(&self) -> u32 {
        self.items.borrow().len() as u32
    }

    fn key(&self, index: u32) -> Option<String> {
        self.items
            .borrow()
            .get(index as usize)
            .map(|(k, _)| k.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_overwrites_and_removes() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").unwrap();
        storage.set_item("a", "2").unwrap();

        assert_eq!(storage.get_item("a").as_deref(), Some("2"));
        assert_eq!(storage.length(), 1);

        storage.remove_item("a");
        assert_eq!(storage.get_item("a"), None);
        assert_eq!(storage.length(), 0);
    }

    #[test]
    fn quota_counts_everything_but_the_replaced_value() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("ab", "1234").unwrap();
        storage.set_item("ab", "123456").unwrap();

        assert_eq!(storage.set_item("c", "1"), Err(StorageError::QuotaExceeded));
    }
}
