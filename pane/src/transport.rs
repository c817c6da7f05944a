use log::debug;
use std::rc::Rc;
use thiserror::Error;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body.
    pub body: Option<String>,
}

impl FragmentRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_owned(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Status range jQuery-style callers treat as success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) || self.status == 304
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestFailure {
    #[error("HTTP {} {}", .0.status, .0.status_text)]
    Http(RawResponse),
    #[error("network error: {0}")]
    Network(String),
}

impl RequestFailure {
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            RequestFailure::Http(response) => Some(response),
            RequestFailure::Network(_) => None,
        }
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Response(RawResponse),
    Failed(RequestFailure),
    /// Superseded or cancelled. Not a failure.
    Aborted,
}

pub trait InFlight {
    fn abort(&self);
}

/// Issues HTTP requests. `on_settle` is called exactly once, including
/// after an abort.
pub trait Transport {
    fn send(
        &self,
        request: FragmentRequest,
        on_settle: Box<dyn FnOnce(Settlement)>,
    ) -> Box<dyn InFlight>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(
        &self,
        request: FragmentRequest,
        on_settle: Box<dyn FnOnce(Settlement)>,
    ) -> Box<dyn InFlight> {
        (**self).send(request, on_settle)
    }
}

/// `fetch` based transport with `AbortController` cancellation.
#[derive(Debug, Clone)]
pub struct FetchTransport {
    window: web_sys::Window,
}

impl FetchTransport {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

struct FetchHandle {
    controller: Option<web_sys::AbortController>,
}

impl InFlight for FetchHandle {
    fn abort(&self) {
        if let Some(controller) = &self.controller {
            controller.abort();
        }
    }
}

fn js_message(value: &wasm_bindgen::JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn response_headers(response: &web_sys::Response) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    let Ok(Some(entries)) = js_sys::try_iter(response.headers().as_ref()) else {
        return headers;
    };

    for entry in entries.flatten() {
        let Some(pair) = entry.dyn_ref::<js_sys::Array>() else {
            continue;
        };
        if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
            headers.push((name.to_ascii_lowercase(), value));
        }
    }

    headers
}

async fn run_fetch(
    window: web_sys::Window,
    request: FragmentRequest,
    signal: Option<web_sys::AbortSignal>,
) -> Settlement {
    let aborted = |signal: &Option<web_sys::AbortSignal>| {
        signal.as_ref().is_some_and(web_sys::AbortSignal::aborted)
    };

    let init = web_sys::RequestInit::new();
    init.set_method(request.method.as_str());
    init.set_signal(signal.as_ref());

    let headers = match web_sys::Headers::new() {
        Ok(headers) => headers,
        Err(e) => return Settlement::Failed(RequestFailure::Network(js_message(&e))),
    };
    for (name, value) in &request.headers {
        if let Err(e) = headers.set(name, value) {
            return Settlement::Failed(RequestFailure::Network(js_message(&e)));
        }
    }
    if let Some(body) = &request.body {
        if let Err(e) = headers.set(
            "Content-Type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ) {
            return Settlement::Failed(RequestFailure::Network(js_message(&e)));
        }
        init.set_body(&body.into());
    }
    init.set_headers(&headers);

    let response = match JsFuture::from(window.fetch_with_str_and_init(&request.url, &init)).await
    {
        Ok(value) => value,
        Err(_) if aborted(&signal) => return Settlement::Aborted,
        Err(e) => return Settlement::Failed(RequestFailure::Network(js_message(&e))),
    };

    let Ok(response) = response.dyn_into::<web_sys::Response>() else {
        return Settlement::Failed(RequestFailure::Network("fetch resolved to a non-response".to_owned()));
    };

    let text = match response.text() {
        Ok(promise) => JsFuture::from(promise).await,
        Err(e) => Err(e),
    };
    let body = match text {
        Ok(body) => body.as_string().unwrap_or_default(),
        Err(_) if aborted(&signal) => return Settlement::Aborted,
        Err(e) => return Settlement::Failed(RequestFailure::Network(js_message(&e))),
    };

    let raw = RawResponse {
        status: response.status(),
        status_text: response.status_text(),
        headers: response_headers(&response),
        body,
    };

    if aborted(&signal) {
        Settlement::Aborted
    } else if raw.is_success() {
        Settlement::Response(raw)
    } else {
        Settlement::Failed(RequestFailure::Http(raw))
    }
}

impl Transport for FetchTransport {
    fn send(
        &self,
        request: FragmentRequest,
        on_settle: Box<dyn FnOnce(Settlement)>,
    ) -> Box<dyn InFlight> {
        let controller = match web_sys::AbortController::new() {
            Ok(controller) => Some(controller),
            Err(e) => {
                debug!("AbortController unavailable, requests cannot be cancelled: {e:?}");
                None
            }
        };
        let signal = controller.as_ref().map(web_sys::AbortController::signal);
        let window = self.window.clone();

        wasm_bindgen_futures::spawn_local(async move {
            on_settle(run_fetch(window, request, signal).await);
        });

        Box::new(FetchHandle { controller })
    }
}
