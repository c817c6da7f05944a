use std::cell::RefCell;
use std::rc::Rc;

use crate::{NavigationError, NavigationState};

/// Access to the browser's back-stack.
pub trait HistoryBackend {
    /// Whether entries can carry a [`NavigationState`].
    fn supports_state(&self) -> bool;
    fn push_state(&self, state: &NavigationState) -> Result<(), NavigationError>;
    fn replace_state(&self, state: &NavigationState) -> Result<(), NavigationError>;
    /// Step back one entry. Browsers report the move later through a pop.
    fn back(&self) -> Result<(), NavigationError>;
    fn current_state(&self) -> Option<NavigationState>;
    fn current_url(&self) -> String;
}

impl<T: HistoryBackend + ?Sized> HistoryBackend for Rc<T> {
    fn supports_state(&self) -> bool {
        (**self).supports_state()
    }

    fn push_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        (**self).push_state(state)
    }

    fn replace_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        (**self).replace_state(state)
    }

    fn back(&self) -> Result<(), NavigationError> {
        (**self).back()
    }

    fn current_state(&self) -> Option<NavigationState> {
        (**self).current_state()
    }

    fn current_url(&self) -> String {
        (**self).current_url()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    state: Option<NavigationState>,
}

#[derive(Debug)]
struct Stack {
    entries: Vec<Entry>,
    index: usize,
}

/// In-process back-stack. Used where the browser offers no history API
/// and by tests.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: RefCell<Stack>,
    stateful: bool,
}

impl MemoryHistory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            stack: RefCell::new(Stack {
                entries: vec![Entry {
                    url: url.into(),
                    state: None,
                }],
                index: 0,
            }),
            stateful: true,
        }
    }

    /// A backend whose entries cannot hold state.
    pub fn stateless(url: impl Into<String>) -> Self {
        Self {
            stateful: false,
            ..Self::new(url)
        }
    }

    pub fn len(&self) -> usize {
        self.stack.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move forward one entry, returning what a pop would carry.
    pub fn forward(&self) -> Option<(Option<NavigationState>, String)> {
        let mut stack = self.stack.borrow_mut();
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        let entry = &stack.entries[stack.index];
        Some((entry.state.clone(), entry.url.clone()))
    }

    /// Move back one entry, returning what a pop would carry.
    pub fn go_back(&self) -> Option<(Option<NavigationState>, String)> {
        let mut stack = self.stack.borrow_mut();
        if stack.index == 0 {
            return None;
        }
        stack.index -= 1;
        let entry = &stack.entries[stack.index];
        Some((entry.state.clone(), entry.url.clone()))
    }
}

impl HistoryBackend for MemoryHistory {
    fn supports_state(&self) -> bool {
        self.stateful
    }

    fn push_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        let mut stack = self.stack.borrow_mut();
        let index = stack.index;
        stack.entries.truncate(index + 1);
        stack.entries.push(Entry {
            url: state.path.clone(),
            state: self.stateful.then(|| state.clone()),
        });
        stack.index = index + 1;
        Ok(())
    }

    fn replace_state(&self, state: &NavigationState) -> Result<(), NavigationError> {
        let mut stack = self.stack.borrow_mut();
        let index = stack.index;
        stack.entries[index] = Entry {
            url: state.path.clone(),
            state: self.stateful.then(|| state.clone()),
        };
        Ok(())
    }

    fn back(&self) -> Result<(), NavigationError> {
        self.go_back();
        Ok(())
    }

    fn current_state(&self) -> Option<NavigationState> {
        let stack = self.stack.borrow();
        stack.entries[stack.index].state.clone()
    }

    fn current_url(&self) -> String {
        let stack = self.stack.borrow();
        stack.entries[stack.index].url.clone()
    }
}
