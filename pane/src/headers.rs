//! Header names exchanged with the CMS backend.

/// Request: comma separated fragment names wanted back. Response: the
/// fragments a redirect target should be loaded with.
pub const PJAX: &str = "X-Pjax";
/// Request: URI-encoded previous logical path.
pub const BACK_URL: &str = "X-Backurl";
pub const REQUESTED_WITH: &str = "X-Requested-With";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

pub const CONTROLLER_URL: &str = "X-ControllerURL";
pub const RELOAD: &str = "X-Reload";
pub const REAUTHENTICATE: &str = "X-Reauthenticate";
pub const TITLE: &str = "X-Title";
pub const STATUS: &str = "X-Status";
pub const CONTENT_TYPE: &str = "Content-Type";
