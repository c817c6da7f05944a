use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fragment every navigation falls back to.
pub const DEFAULT_FRAGMENT: &str = "Content";

/// Key in [`NavigationState::extra`] holding per-tabset overrides.
pub const TAB_STATE_KEY: &str = "tabState";

/// Key in [`NavigationState::extra`] carrying the forced reload token.
pub const FORCE_RELOAD_KEY: &str = "__forceReload";

/// A navigation as stored in a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub path: String,
    #[serde(rename = "pjax", default = "default_fragments")]
    pub pjax_fragments: Vec<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

fn default_fragments() -> Vec<String> {
    vec![DEFAULT_FRAGMENT.to_owned()]
}

/// Deduplicate preserving order; an empty list becomes `["Content"]`.
pub fn fragment_set<I, S>(fragments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: Vec<String> = Vec::new();

    for fragment in fragments {
        let fragment = fragment.into();
        let fragment = fragment.trim();
        if !fragment.is_empty() && !set.iter().any(|f| f == fragment) {
            set.push(fragment.to_owned());
        }
    }

    if set.is_empty() {
        default_fragments()
    } else {
        set
    }
}

impl NavigationState {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pjax_fragments: default_fragments(),
            extra: Map::new(),
            referrer: None,
        }
    }

    pub fn with_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pjax_fragments = fragment_set(fragments);
        self
    }

    /// Value of the `X-Pjax` request header.
    pub fn fragment_header(&self) -> String {
        self.pjax_fragments.join(",")
    }

    pub fn tab_state_overrides(&self) -> Option<&Map<String, Value>> {
        self.extra.get(TAB_STATE_KEY).and_then(Value::as_object)
    }
}

/// What a caller asks for before the bridge turns it into a
/// [`NavigationState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationIntent {
    pub url: String,
    pub fragments: Option<Vec<String>>,
    pub extra: Map<String, Value>,
    pub force_reload: bool,
}

impl NavigationIntent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fragments = Some(fragments.into_iter().map(Into::into).collect());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn force_reload(mut self, force: bool) -> Self {
        self.force_reload = force;
        self
    }

    pub fn fragment_names(&self) -> Vec<String> {
        fragment_set(self.fragments.clone().unwrap_or_default())
    }

    pub(crate) fn into_state(self, referrer: Option<String>) -> NavigationState {
        let pjax_fragments = self.fragment_names();

        NavigationState {
            path: self.url,
            pjax_fragments,
            extra: self.extra,
            referrer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_survives_history_serialisation() {
        let state = NavigationState::new("/admin/pages/edit/show/5")
            .with_fragments(["CurrentForm", "Breadcrumbs", "CurrentForm"]);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"pjax\":[\"CurrentForm\",\"Breadcrumbs\"]"));

        let restored: NavigationState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn bare_history_entry_defaults_to_content() {
        let restored: NavigationState = serde_json::from_str(r#"{"path":"/admin"}"#).unwrap();
        assert_eq!(restored.pjax_fragments, vec![DEFAULT_FRAGMENT]);
        assert!(restored.extra.is_empty());
        assert_eq!(restored.referrer, None);
    }

    #[test]
    fn intent_without_fragments_targets_content() {
        let state = NavigationIntent::new("/admin/A").into_state(None);
        assert_eq!(state.fragment_header(), "Content");

        let state = NavigationIntent::new("/admin/A")
            .fragments(["", " Menu "])
            .into_state(Some("/admin".to_owned()));
        assert_eq!(state.pjax_fragments, vec!["Menu"]);
        assert_eq!(state.referrer.as_deref(), Some("/admin"));
    }
}
