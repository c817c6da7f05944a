use log::{debug, warn};
use serde_json::{Map, Value};

use crate::PaneError;
use crate::headers;
use crate::transport::RawResponse;

/// What the request being negotiated asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext<'a> {
    pub requested_url: &'a str,
    /// Address of the page when the response arrived.
    pub current_url: &'a str,
    pub fragments: &'a [String],
    pub base_href: Option<&'a str>,
    pub default_fragment: &'a str,
    pub form_fragment: &'a str,
    /// Whether `X-ControllerURL` may move the address. Off for fragment
    /// loads, which never touch history.
    pub follows_redirects: bool,
}

/// Server announced a new canonical address for the response.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftRedirect {
    pub url: String,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub title: Option<String>,
    /// Ordered `(name, markup)` pairs.
    pub fragments: Vec<(String, String)>,
    /// Whether the single fragment name was inferred from the markup.
    pub guessed: bool,
    pub redirect: Option<SoftRedirect>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Negotiated {
    /// Leave the single-page flow and load `url` as a document.
    FullReload { url: String },
    Reauthenticate,
    /// Nothing to swap but the address moved; load the new address.
    Redirect(SoftRedirect),
    /// Nothing to swap.
    Empty { title: Option<String> },
    Apply(Payload),
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    matches!(mime.as_str(), "text/json" | "application/json")
}

/// Document title from `X-Title`: `+` is a space, the rest percent-encoded.
pub fn document_title(response: &RawResponse) -> Option<String> {
    let raw = response.header(headers::TITLE)?.replace('+', " ");
    Some(pane_utils::decode_uri_component(&raw).unwrap_or(raw))
}

/// Fragment name for a markup response that did not say which fragment it
/// is: a root `<form>` not tagged as the default fragment is the form
/// fragment, anything else the default fragment.
pub fn guess_fragment<'a>(markup: &str, ctx: &RequestContext<'a>) -> &'a str {
    let Some(root) = pane_utils::root_element(markup) else {
        return ctx.default_fragment;
    };

    let tagged_default = root
        .attribute("data-pjax-fragment")
        .is_some_and(|names| pane_utils::attribute_lists_fragment(names, ctx.default_fragment));

    if root.name == "form" && !tagged_default {
        ctx.form_fragment
    } else {
        ctx.default_fragment
    }
}

fn same_url(a: &str, b: &str, base: Option<&str>) -> bool {
    let normalize = |url: &str| {
        pane_utils::make_absolute(url, base)
            .trim_end_matches('/')
            .to_owned()
    };
    normalize(a) == normalize(b)
}

fn soft_redirect(response: &RawResponse, ctx: &RequestContext<'_>) -> Option<SoftRedirect> {
    if !ctx.follows_redirects {
        return None;
    }

    let url = response.header(headers::CONTROLLER_URL)?;

    if same_url(url, ctx.requested_url, ctx.base_href)
        || same_url(url, ctx.current_url, ctx.base_href)
    {
        return None;
    }

    let fragments = match response.header(headers::PJAX) {
        Some(list) => pane_utils::parse_fragment_list(list),
        None => ctx.fragments.to_vec(),
    };

    Some(SoftRedirect {
        url: url.to_owned(),
        fragments: pane_router::fragment_set(fragments),
    })
}

fn fragment_map(body: &str, content_type: &str) -> Result<Vec<(String, String)>, PaneError> {
    let map: Map<String, Value> =
        serde_json::from_str(body).map_err(|e| PaneError::MalformedResponse {
            content_type: content_type.to_owned(),
            message: e.to_string(),
        })?;

    Ok(map
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(markup) => Some((name, markup)),
            Value::Null => None,
            other => {
                warn!("ignoring non-markup value for fragment {name}: {other}");
                None
            }
        })
        .collect())
}

/// Classify a completed response.
pub fn negotiate(response: &RawResponse, ctx: &RequestContext<'_>) -> Result<Negotiated, PaneError> {
    if response.header(headers::RELOAD).is_some()
        && let Some(url) = response.header(headers::CONTROLLER_URL)
    {
        return Ok(Negotiated::FullReload {
            url: pane_utils::make_absolute(url, ctx.base_href),
        });
    }

    if response.header(headers::REAUTHENTICATE).is_some() {
        return Ok(Negotiated::Reauthenticate);
    }

    let title = document_title(response);
    let redirect = soft_redirect(response, ctx);

    if response.body.trim().is_empty() {
        return Ok(match redirect {
            Some(redirect) => Negotiated::Redirect(redirect),
            None => Negotiated::Empty { title },
        });
    }

    let content_type = response.header(headers::CONTENT_TYPE).unwrap_or_default();

    let (fragments, guessed) = if is_json(content_type) {
        (fragment_map(&response.body, content_type)?, false)
    } else {
        let name = guess_fragment(&response.body, ctx);
        debug!(
            "markup response for {} names no fragment; treating it as {name}",
            ctx.requested_url
        );
        (vec![(name.to_owned(), response.body.clone())], true)
    };

    Ok(Negotiated::Apply(Payload {
        title,
        fragments,
        guessed,
        redirect,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(requested_url: &'a str, fragments: &'a [String]) -> RequestContext<'a> {
        RequestContext {
            requested_url,
            current_url: requested_url,
            fragments,
            base_href: Some("http://cms.test/"),
            default_fragment: "Content",
            form_fragment: "CurrentForm",
            follows_redirects: true,
        }
    }

    fn html(body: &str) -> RawResponse {
        RawResponse::new(200, "OK")
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body)
    }

    fn content() -> Vec<String> {
        vec!["Content".to_owned()]
    }

    #[test]
    fn root_form_markup_is_the_form_fragment() {
        let fragments = content();
        let ctx = context("/admin/pages/edit/show/5", &fragments);

        let outcome = negotiate(
            &html("<form id=\"Form_EditForm\" class=\"cms-edit-form\"><input name=\"Title\"></form>"),
            &ctx,
        )
        .unwrap();

        let Negotiated::Apply(payload) = outcome else {
            panic!("expected a payload, got {outcome:?}");
        };
        assert_eq!(payload.fragments[0].0, "CurrentForm");
        assert!(payload.guessed);
    }

    #[test]
    fn form_tagged_as_content_stays_content() {
        let fragments = content();
        let ctx = context("/admin/pages", &fragments);

        let outcome = negotiate(
            &html("<!-- list --><form data-pjax-fragment=\"Content ListViewForm\"></form>"),
            &ctx,
        )
        .unwrap();

        let Negotiated::Apply(payload) = outcome else {
            panic!("expected a payload");
        };
        assert_eq!(payload.fragments[0].0, "Content");
    }

    #[test]
    fn json_payload_keeps_server_order_and_skips_non_markup() {
        let fragments = vec!["Breadcrumbs".to_owned(), "CurrentForm".to_owned()];
        let ctx = context("/admin/pages/edit/show/5", &fragments);
        let response = RawResponse::new(200, "OK")
            .with_header("content-type", "application/json; charset=utf-8")
            .with_header("X-Title", "Edit+Page%3A+Home")
            .with_body(r#"{"CurrentForm":"<form></form>","Breadcrumbs":"<div></div>","Meta":42,"Menu":null}"#);

        let Negotiated::Apply(payload) = negotiate(&response, &ctx).unwrap() else {
            panic!("expected a payload");
        };

        let names: Vec<_> = payload.fragments.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["CurrentForm", "Breadcrumbs"]);
        assert!(!payload.guessed);
        assert_eq!(payload.title.as_deref(), Some("Edit Page: Home"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let fragments = content();
        let ctx = context("/admin", &fragments);
        let response = RawResponse::new(200, "OK")
            .with_header("Content-Type", "text/json")
            .with_body("{\"Content\":");

        assert!(matches!(
            negotiate(&response, &ctx),
            Err(PaneError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn reload_flag_forces_an_absolute_document_load() {
        let fragments = content();
        let ctx = context("/admin/pages", &fragments);
        let response = html("<div></div>")
            .with_header("X-Reload", "1")
            .with_header("X-ControllerURL", "admin/security/login");

        assert_eq!(
            negotiate(&response, &ctx).unwrap(),
            Negotiated::FullReload {
                url: "http://cms.test/admin/security/login".to_owned()
            }
        );
    }

    #[test]
    fn reauthentication_short_circuits() {
        let fragments = content();
        let ctx = context("/admin/pages", &fragments);
        let response = html("<div></div>").with_header("X-Reauthenticate", "1");

        assert_eq!(negotiate(&response, &ctx).unwrap(), Negotiated::Reauthenticate);
    }

    #[test]
    fn empty_body_with_new_controller_url_is_a_soft_redirect() {
        let fragments = content();
        let ctx = context("/admin/pages/add", &fragments);
        let response = RawResponse::new(200, "OK")
            .with_header("X-ControllerURL", "/admin/pages/edit/show/9")
            .with_header("X-Pjax", "CurrentForm,Breadcrumbs");

        assert_eq!(
            negotiate(&response, &ctx).unwrap(),
            Negotiated::Redirect(SoftRedirect {
                url: "/admin/pages/edit/show/9".to_owned(),
                fragments: vec!["CurrentForm".to_owned(), "Breadcrumbs".to_owned()],
            })
        );
    }

    #[test]
    fn controller_url_matching_the_request_is_not_a_redirect() {
        let fragments = content();
        let ctx = context("http://cms.test/admin/pages/", &fragments);
        let response = RawResponse::new(200, "OK").with_header("X-ControllerURL", "/admin/pages");

        assert_eq!(
            negotiate(&response, &ctx).unwrap(),
            Negotiated::Empty { title: None }
        );
    }

    #[test]
    fn applied_payload_carries_the_redirect_for_address_update() {
        let fragments = vec!["CurrentForm".to_owned()];
        let ctx = context("/admin/pages/EditForm", &fragments);
        let response = html("<form></form>").with_header("X-ControllerURL", "/admin/pages/edit/show/9");

        let Negotiated::Apply(payload) = negotiate(&response, &ctx).unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(
            payload.redirect.map(|r| r.fragments),
            Some(vec!["CurrentForm".to_owned()])
        );
    }

    #[test]
    fn fragment_loads_ignore_controller_url() {
        let fragments = vec!["Tree".to_owned()];
        let mut ctx = context("/admin/pages/tree", &fragments);
        ctx.follows_redirects = false;

        let empty = RawResponse::new(200, "OK").with_header("X-ControllerURL", "/admin/elsewhere");
        assert_eq!(negotiate(&empty, &ctx).unwrap(), Negotiated::Empty { title: None });

        let markup = html("<ul></ul>").with_header("X-ControllerURL", "/admin/elsewhere");
        let Negotiated::Apply(payload) = negotiate(&markup, &ctx).unwrap() else {
            panic!("expected a payload");
        };
        assert_eq!(payload.redirect, None);
    }
}
