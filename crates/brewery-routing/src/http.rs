//! HTTP request/response collaborator.
//!
//! The router only needs a narrow slice of HTTP: the request method, the
//! normalized path, the async transport headers and somewhere to put a status
//! and headers. [`Request`] and [`Response`] provide exactly that on top of the
//! `http` crate types.

use std::fmt;
use std::str::FromStr;

use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static HEADER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// The HTTP methods a route may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestMethod {
    Head,
    Options,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Connect,
}

impl RequestMethod {
    /// All methods, in the order they are matched in callback strings.
    pub const ALL: [RequestMethod; 9] = [
        RequestMethod::Head,
        RequestMethod::Options,
        RequestMethod::Get,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Patch,
        RequestMethod::Delete,
        RequestMethod::Trace,
        RequestMethod::Connect,
    ];

    /// Lowercase method name (`"get"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Head => "head",
            RequestMethod::Options => "options",
            RequestMethod::Get => "get",
            RequestMethod::Post => "post",
            RequestMethod::Put => "put",
            RequestMethod::Patch => "patch",
            RequestMethod::Delete => "delete",
            RequestMethod::Trace => "trace",
            RequestMethod::Connect => "connect",
        }
    }

    /// Converts from an `http::Method`, if it is one of the supported verbs.
    pub fn from_http(method: &Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a supported HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported request method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for RequestMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Async transport a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncMethod {
    Ajax,
    Pjax,
}

impl AsyncMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsyncMethod::Ajax => "ajax",
            AsyncMethod::Pjax => "pjax",
        }
    }
}

impl fmt::Display for AsyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsyncMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ajax") {
            Ok(AsyncMethod::Ajax)
        } else if s.eq_ignore_ascii_case("pjax") {
            Ok(AsyncMethod::Pjax)
        } else {
            Err(UnknownMethod(s.to_string()))
        }
    }
}

/// Normalizes a URI path for route matching.
///
/// Leading and trailing slashes are trimmed and repeated slashes collapse.
/// The empty path normalizes to `/`.
///
/// ```rust
/// use brewery_routing::normalize_path;
///
/// assert_eq!(normalize_path("/account//42/"), "account/42");
/// assert_eq!(normalize_path("/"), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments.join("/")
    }
}

fn clean_parameter(value: &str) -> String {
    MARKUP_TAG.replace_all(value, "").into_owned()
}

/// An incoming HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method as a routable verb, if supported.
    pub fn request_method(&self) -> Option<RequestMethod> {
        RequestMethod::from_http(&self.method)
    }

    /// The normalized request path (see [`normalize_path`]).
    pub fn path(&self) -> String {
        normalize_path(self.uri.path())
    }

    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// True when `X-Requested-With` is `XMLHttpRequest`.
    pub fn is_ajax(&self) -> bool {
        self.header_str("x-requested-with")
            .map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
            .unwrap_or(false)
    }

    /// True when a non-empty `X-PJAX` header is present.
    pub fn is_pjax(&self) -> bool {
        self.header_str("x-pjax")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn is_async(&self) -> bool {
        self.is_ajax() || self.is_pjax()
    }

    /// The async transport, with PJAX taking precedence over AJAX.
    pub fn async_method(&self) -> Option<AsyncMethod> {
        if self.is_pjax() {
            Some(AsyncMethod::Pjax)
        } else if self.is_ajax() {
            Some(AsyncMethod::Ajax)
        } else {
            None
        }
    }

    /// Looks up a query string parameter, stripped of markup.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| clean_parameter(&value))
    }

    /// Looks up a form-encoded body parameter, stripped of markup.
    pub fn form_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| clean_parameter(&value))
    }

    /// Looks up a parameter for the current method: the query string for
    /// `GET`/`HEAD`, the body for everything else.
    pub fn parameter(&self, name: &str) -> Option<String> {
        match self.request_method() {
            Some(RequestMethod::Get) | Some(RequestMethod::Head) | None => self.query_param(name),
            Some(_) => self.form_param(name),
        }
    }
}

impl From<http::Request<String>> for Request {
    fn from(request: http::Request<String>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }
}

/// Status and headers produced while handling a request.
///
/// Headers keep their insertion order; setting an existing header (compared
/// case-insensitively) replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code. Returns false for codes outside 100-999.
    pub fn set_status(&mut self, code: u16) -> bool {
        match StatusCode::from_u16(code) {
            Ok(status) => {
                self.status = status;
                true
            }
            Err(_) => false,
        }
    }

    /// Sets a header. Returns false when the name has characters outside
    /// `[A-Za-z0-9-]` or the value is not a valid header value (CR and LF
    /// included).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        if !HEADER_NAME.is_match(name) || HeaderValue::from_str(&value).is_err() {
            warn!("Rejected response header {}", name);
            return false;
        }
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
        true
    }

    pub fn set_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name.as_ref(), value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// `HTTP/1.1 <code> <reason>`.
    pub fn status_line(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("HTTP/1.1 {} {}", self.status.as_u16(), reason),
            None => format!("HTTP/1.1 {}", self.status.as_u16()),
        }
    }

    /// Status line followed by one `Name: value` line per header, CRLF-terminated.
    pub fn output_headers(&self) -> String {
        let mut out = format!("{}\r\n", self.status_line());
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out
    }

    pub fn is_informational(&self) -> bool {
        self.status.is_informational()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }
}
