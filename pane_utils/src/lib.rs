#![allow(missing_docs)]

mod markup;
mod uri;

pub use markup::{RootElement, root_element};
pub use uri::{
    decode_uri, decode_uri_component, encode_uri, make_absolute, normalize_state_url,
    request_path,
};

/// Escape text for insertion into markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// Split a comma separated fragment list (as carried by `X-Pjax`) into an
/// ordered set of names.
pub fn parse_fragment_list(value: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }

    names
}

/// Whether a `data-pjax-fragment` attribute value lists `name`.
pub fn attribute_lists_fragment(attribute: &str, name: &str) -> bool {
    attribute.split_whitespace().any(|part| part == name)
}
