//! The request side of the abstraction layer.
//!
//! [`Request`] normalizes one inbound HTTP transaction: the method is
//! uppercased, header keys are lowercased once at construction, URL parts are
//! derived against a synthetic `http://<host>` base, and the query string and
//! body are decoded lazily, at most once per instance.

use std::collections::HashMap;

use http::Uri;
use once_cell::unsync::OnceCell;
use serde_json::{Map, Value};

use super::body::{ParsedBody, is_truthy};
use super::error::ParseError;
use super::{multipart, query};

/// A normalized HTTP request.
///
/// Identity fields (method, url, headers, raw body) are immutable once
/// constructed; the parsed query and body are memoized derived state. One
/// instance corresponds to one transaction.
#[derive(Debug)]
pub struct Request {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    raw_body: String,

    host: String,
    hostname: String,
    port: Option<u16>,
    path: String,
    raw_query: Option<String>,

    query: OnceCell<Value>,
    body: OnceCell<(ParsedBody, Vec<String>)>,
}

impl Request {
    /// Builds a request from raw transport inputs.
    ///
    /// `url` is path + query as it appeared on the request line. Header keys
    /// may be mixed-case. The URL is resolved against
    /// `http://<host-header-or-"localhost">` so host, port, path and query
    /// come out uniformly whether or not the target was absolute.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidUri`] when the combined URL does not
    /// parse. Everything downstream of construction is non-fatal.
    pub fn new<I, K, V>(method: &str, url: &str, headers: I, body: &str) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut lowered = HashMap::new();
        for (name, value) in headers {
            lowered.insert(name.as_ref().to_ascii_lowercase(), value.into());
        }

        let host_header = lowered.get("host").map(String::as_str).unwrap_or("localhost");
        let target = format!("http://{host_header}{url}");
        let uri: Uri = target.parse().map_err(|_| ParseError::invalid_uri(&target))?;

        let hostname = uri.host().unwrap_or_default().to_string();
        let host = uri.authority().map(|authority| authority.as_str().to_string()).unwrap_or_else(|| hostname.clone());

        Ok(Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: lowered,
            raw_body: body.to_string(),
            host,
            hostname,
            port: uri.port_u16(),
            path: uri.path().to_string(),
            raw_query: uri.query().map(str::to_string),
            query: OnceCell::new(),
            body: OnceCell::new(),
        })
    }

    /// Request method, always uppercase.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path + query string as given on the request line.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Authority, possibly including an explicit port (`127.0.0.1:8080`).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Undecoded body text.
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The query string as a JSON object, parsed on first access.
    pub fn query(&self) -> &Value {
        self.query.get_or_init(|| match &self.raw_query {
            Some(raw) if !raw.is_empty() => Value::Object(query::parse(raw)),
            _ => Value::Object(Map::new()),
        })
    }

    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query().get(name)
    }

    /// The `content-type` header up to the first `;`, or `""` if absent.
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("").split(';').next().unwrap_or_default()
    }

    /// Everything after the first `;` of the `content-type` header, with each
    /// segment trimmed, or `""`.
    pub fn content_type_details(&self) -> String {
        let header = self.header("content-type").unwrap_or("");
        let mut segments = header.split(';');
        segments.next();
        segments.map(str::trim).collect::<Vec<_>>().join(";")
    }

    /// The content type the client expects back, when it stated one.
    ///
    /// The first `accept` entry wins unless it is a wildcard; failing that, a
    /// json-ish request content type implies a json response.
    pub fn expected_response_content_type(&self) -> Option<String> {
        if let Some(accept) = self.header("accept") {
            if !accept.is_empty() {
                let first = accept.split(',').next().unwrap_or_default().trim();
                if !first.contains('*') {
                    return Some(first.to_string());
                }
            }
        }

        let own = self.content_type();
        if !own.is_empty() && own.contains("json") {
            return Some(mime::APPLICATION_JSON.as_ref().to_string());
        }
        None
    }

    /// The body decoded per the request content type, on first access.
    pub fn body(&self) -> &ParsedBody {
        &self.parsed().0
    }

    /// Non-fatal diagnostics collected while decoding the body (for example
    /// dropped multipart fragments). Empty until [`Self::body`] has run.
    pub fn parse_warnings(&self) -> &[String] {
        &self.parsed().1
    }

    fn parsed(&self) -> &(ParsedBody, Vec<String>) {
        self.body.get_or_init(|| self.decode_body())
    }

    fn decode_body(&self) -> (ParsedBody, Vec<String>) {
        let content_type = self.content_type();

        if content_type == mime::APPLICATION_WWW_FORM_URLENCODED.as_ref() {
            return (ParsedBody::Json(Value::Object(query::parse(&self.raw_body))), Vec::new());
        }

        if content_type == mime::MULTIPART_FORM_DATA.as_ref() {
            return self.decode_multipart();
        }

        if content_type == mime::APPLICATION_JSON.as_ref() {
            let value = serde_json::from_str(&self.raw_body).unwrap_or_else(|_| Value::Object(Map::new()));
            return (ParsedBody::Json(value), Vec::new());
        }

        // Parsed JSON is kept only when truthy: a body of literal `false`, `0`
        // or `""` degrades to the raw text. Long-standing quirk, kept for
        // compatibility.
        match serde_json::from_str::<Value>(&self.raw_body) {
            Ok(value) if is_truthy(&value) => (ParsedBody::Json(value), Vec::new()),
            _ if self.raw_body.is_empty() => (ParsedBody::Empty, Vec::new()),
            _ => (ParsedBody::Raw(self.raw_body.clone()), Vec::new()),
        }
    }

    fn decode_multipart(&self) -> (ParsedBody, Vec<String>) {
        let details = self.content_type_details();
        let boundary = details.split(';').map(str::trim).find_map(|segment| segment.strip_prefix("boundary="));
        let Some(boundary) = boundary else {
            return (
                ParsedBody::Json(Value::Object(Map::new())),
                vec!["multipart body without a boundary parameter".to_string()],
            );
        };

        let (fields, warnings) = multipart::parse_fields(&self.raw_body, boundary.trim());
        let mut result = Map::new();
        for (name, value) in fields {
            query::fold_pair(&mut result, name, Value::String(value));
        }
        query::collapse_array_like(&mut result);
        (ParsedBody::Json(Value::Object(result)), warnings)
    }
}

/// Cloning copies the identity fields and resets the lazy caches, so the
/// clone derives its query and body independently of the original.
impl Clone for Request {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            raw_body: self.raw_body.clone(),
            host: self.host.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            path: self.path.clone(),
            raw_query: self.raw_query.clone(),
            query: OnceCell::new(),
            body: OnceCell::new(),
        }
    }
}
