/// Opening tag of the first element in a markup string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl RootElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Find the opening tag of the first element in `markup`, skipping
/// whitespace, text, comments, doctypes and processing instructions.
pub fn root_element(markup: &str) -> Option<RootElement> {
    let mut rest = markup;

    loop {
        let start = rest.find('<')?;
        rest = &rest[start..];

        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->")?;
            rest = &after[end + 3..];
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") || rest.starts_with("</") {
            let end = rest.find('>')?;
            rest = &rest[end + 1..];
            continue;
        }

        let tag = &rest[1..];
        if !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
            rest = tag;
            continue;
        }

        return Some(parse_opening_tag(tag));
    }
}

fn parse_opening_tag(tag: &str) -> RootElement {
    let name_end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    let name = tag[..name_end].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut rest = &tag[name_end..];

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');

        if rest.is_empty() || rest.starts_with('>') {
            break;
        }

        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            attributes.push((key, String::new()));
            continue;
        };

        let after_eq = after_eq.trim_start();
        let (value, remaining) = match after_eq.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &after_eq[1..];
                let end = body.find(quote).unwrap_or(body.len());
                (&body[..end], body.get(end + 1..).unwrap_or_default())
            }
            _ => {
                let end = after_eq
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(after_eq.len());
                (&after_eq[..end], &after_eq[end..])
            }
        };

        attributes.push((key, value.to_owned()));
        rest = remaining;
    }

    RootElement { name, attributes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_form_after_comments_and_whitespace() {
        let root = root_element(
            "\n  <!-- <div> --><form id=\"Form_EditForm\" class='cms-edit-form' data-pjax-fragment=\"CurrentForm Content\" novalidate><div></div></form>",
        )
        .expect("root");

        assert_eq!(root.name, "form");
        assert_eq!(root.attribute("id"), Some("Form_EditForm"));
        assert_eq!(root.attribute("class"), Some("cms-edit-form"));
        assert_eq!(root.attribute("DATA-PJAX-FRAGMENT"), Some("CurrentForm Content"));
        assert_eq!(root.attribute("novalidate"), Some(""));
    }

    #[test]
    fn unquoted_and_self_closing_attributes() {
        let root = root_element("<!DOCTYPE html><DIV data-pjax-fragment=Content/>").expect("root");
        assert_eq!(root.name, "div");
        assert_eq!(root.attribute("data-pjax-fragment"), Some("Content/"));

        let root = root_element("<input disabled />").expect("root");
        assert_eq!(root.attributes, vec![("disabled".to_owned(), String::new())]);
    }

    #[test]
    fn text_only_markup_has_no_root() {
        assert_eq!(root_element("plain text"), None);
        assert_eq!(root_element("a < b"), None);
        assert_eq!(root_element(""), None);
    }
}
