use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::PaneError;

/// Loading markers keyed by request channel.
///
/// Marking a channel clears whatever its previous request marked, and a
/// settling request only clears the markers when it still owns them. A
/// superseded request that settles late therefore leaves its successor's
/// markers alone.
#[derive(Debug)]
pub(crate) struct LoadingMarks {
    class: String,
    next_id: Cell<u64>,
    channels: RefCell<HashMap<String, (u64, Vec<web_sys::Element>)>>,
}

impl LoadingMarks {
    pub(crate) fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            next_id: Cell::new(0),
            channels: RefCell::default(),
        }
    }

    /// Mark `elements` for a new request on `channel`, returning the ticket
    /// that releases them.
    pub(crate) fn mark(&self, channel: &str, elements: Vec<web_sys::Element>) -> Result<u64, PaneError> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let previous = self.channels.borrow_mut().remove(channel);
        if let Some((_, elements)) = previous {
            self.clear(&elements);
        }

        for element in &elements {
            element.class_list().add_1(&self.class)?;
        }
        self.channels.borrow_mut().insert(channel.to_owned(), (id, elements));
        Ok(id)
    }

    /// Clear the markers of `channel` if ticket `id` still owns them.
    pub(crate) fn release(&self, channel: &str, id: u64) {
        let owned = {
            let mut channels = self.channels.borrow_mut();
            match channels.get(channel) {
                Some((owner, _)) if *owner == id => channels.remove(channel),
                _ => None,
            }
        };

        match owned {
            Some((_, elements)) => self.clear(&elements),
            None => debug!("request {id} on {channel} no longer owns its loading markers"),
        }
    }

    fn clear(&self, elements: &[web_sys::Element]) {
        for element in elements {
            if let Err(e) = element.class_list().remove_1(&self.class) {
                debug!("could not clear loading marker: {e:?}");
            }
        }
    }
}
