use crate::headers;
use crate::transport::RawResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Good,
    Bad,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Good => "good",
            StatusKind::Bad => "bad",
        }
    }
}

/// Transient notification text, already HTML-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBanner {
    pub text: String,
    pub kind: StatusKind,
}

/// Banner for a settled request. `status` 0 means the request never reached
/// the server (aborted), which never produces a banner; so do messages on
/// the `ignored` list.
pub fn status_banner(
    status: u16,
    x_status: Option<&str>,
    status_text: &str,
    ignored: &[String],
) -> Option<StatusBanner> {
    if status == 0 {
        return None;
    }

    let message = x_status.unwrap_or(status_text);
    if message.trim().is_empty() || ignored.iter().any(|i| i == message) {
        return None;
    }

    let decoded = pane_utils::decode_uri_component(message).unwrap_or_else(|| message.to_owned());
    let kind = if (200..400).contains(&status) {
        StatusKind::Good
    } else {
        StatusKind::Bad
    };

    Some(StatusBanner {
        text: pane_utils::escape_html(&decoded),
        kind,
    })
}

/// [`status_banner`] for a response.
pub fn response_banner(response: &RawResponse, ignored: &[String]) -> Option<StatusBanner> {
    status_banner(
        response.status,
        response.header(headers::STATUS),
        &response.status_text,
        ignored,
    )
}
