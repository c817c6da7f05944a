use pane_router::NavigationError;
use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum PaneError {
    /// Loaded markup contains the container itself. Swapping it in would
    /// nest the whole interface inside a fragment.
    #[error(
        "fragment `{fragment}` contains an element matching `.{marker}`; loading it would nest the container inside itself"
    )]
    CyclicFragment { fragment: String, marker: String },
    #[error("no element matches the container selector `{0}`")]
    MissingContainer(String),
    #[error("{element} is missing the required `{attribute}` attribute")]
    MissingAttribute { element: String, attribute: String },
    #[error("malformed {content_type} response: {message}")]
    MalformedResponse {
        content_type: String,
        message: String,
    },
    #[error("session storage write failed: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    Config(serde_json::Error),
    #[error("could not serialise state: {0}")]
    Serialize(serde_json::Error),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("DOM operation failed: {0}")]
    Dom(String),
}

impl PaneError {
    /// Errors that signal a server/template contract violation rather than a
    /// transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CyclicFragment { .. } | Self::MissingContainer(_) | Self::MissingAttribute { .. }
        )
    }
}

impl From<JsValue> for PaneError {
    fn from(value: JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &"message".into())
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| format!("{value:?}"));

        Self::Dom(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<u8>("not a number").unwrap_err()
    }

    #[test]
    fn serialisation_failures_are_not_reported_as_configuration() {
        let message = PaneError::Serialize(json_error()).to_string();
        assert!(message.starts_with("could not serialise state: "), "{message}");

        let message = PaneError::Config(json_error()).to_string();
        assert!(message.starts_with("invalid configuration: "), "{message}");
    }
}
