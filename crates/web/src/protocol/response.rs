//! The response side of the abstraction layer.
//!
//! [`Response`] accumulates a status code, headers and content, inferring the
//! content type from the shape of the content, and serializes itself through
//! the [`ResponseSink`] contract.

use serde_json::{Map, Value};

use super::body::is_truthy;

/// One response header. User-added headers keep insertion order; the derived
/// `Content-type` header is appended last when the list is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Response content: either verbatim text or a structured JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Json(Value),
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// The serialization contract a response is written through.
///
/// [`Response::send`] invokes the four operations in order: every header via
/// [`set_header`](Self::set_header), the status via
/// [`write_head`](Self::write_head), the body via [`write`](Self::write),
/// then [`end`](Self::end).
pub trait ResponseSink {
    fn set_header(&mut self, name: &str, value: &str);
    fn write_head(&mut self, code: u16);
    fn write(&mut self, chunk: &str);
    fn end(&mut self);
}

/// A response under construction by a handler.
#[derive(Debug, Clone)]
pub struct Response {
    code: u16,
    headers: Vec<Header>,
    content: Content,
    content_type: Option<String>,
}

impl Response {
    /// Starts a 200 response with empty text content (and therefore a
    /// `text/plain` content type).
    pub fn new() -> Self {
        let mut response = Self { code: 200, headers: Vec::new(), content: Content::Text(String::new()), content_type: None };
        response.set_content("");
        response
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.code = code;
        self
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Assigns the content and re-infers the content type from its shape:
    /// text containing `<html` becomes `text/html`, other text `text/plain`,
    /// JSON `application/json`. Inference always fires, overriding any
    /// content type set explicitly beforehand.
    pub fn set_content(&mut self, content: impl Into<Content>) -> &mut Self {
        let content = content.into();
        let inferred = match &content {
            Content::Text(text) if text.to_ascii_lowercase().contains("<html") => mime::TEXT_HTML.as_ref(),
            Content::Text(_) => mime::TEXT_PLAIN.as_ref(),
            Content::Json(_) => mime::APPLICATION_JSON.as_ref(),
        };
        self.content_type = Some(inferred.to_string());
        self.content = content;
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// User-added headers in insertion order, with the derived `Content-type`
    /// header appended last when a content type is set.
    pub fn headers(&self) -> Vec<Header> {
        let mut headers = self.headers.clone();
        if let Some(content_type) = &self.content_type {
            headers.push(Header::new("Content-type", content_type));
        }
        headers
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Turns this response into a structured JSON error: sets the code and a
    /// `{error, ...data}` object body. `data` fields win on key collision.
    pub fn set_error(&mut self, code: u16, error: impl Into<String>, data: Value) -> &mut Self {
        self.code = code;
        let mut object = Map::new();
        object.insert("error".to_string(), Value::String(error.into()));
        if let Value::Object(extra) = data {
            for (key, value) in extra {
                object.insert(key, value);
            }
        }
        self.set_content(Value::Object(object))
    }

    /// Serializes this response into the sink: headers, status line, body
    /// (text verbatim, JSON pretty-printed with 2-space indent), end.
    ///
    /// Consumes the response; a response is sent exactly once.
    pub fn send(self, sink: &mut impl ResponseSink) {
        for header in self.headers() {
            sink.set_header(&header.name, &header.value);
        }
        sink.write_head(self.code);
        match &self.content {
            Content::Text(text) if !text.is_empty() => sink.write(text),
            Content::Text(_) => {}
            Content::Json(value) if is_truthy(value) => {
                sink.write(&serde_json::to_string_pretty(value).unwrap_or_default());
            }
            Content::Json(_) => {}
        }
        sink.end();
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
