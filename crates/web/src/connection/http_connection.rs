//! Connection processing: the transport adapter between raw sockets and the
//! protocol types.
//!
//! [`HttpConnection`] reads one request head with `httparse`, buffers the
//! complete `Content-Length` body (the core never sees partial bodies),
//! constructs a [`Request`], runs the handler and writes the resulting
//! [`Response`] back through a [`WireSink`]. Requests on one connection are
//! served sequentially until `Connection: close` or EOF.

use std::error::Error;
use std::sync::Arc;

use bytes::BytesMut;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::connection::sink::WireSink;
use crate::handler::{ErrorHandler, Handler};
use crate::protocol::{HttpError, ParseError, Request, Response, SendError};

const MAX_HEADER_SIZE: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;

/// An HTTP/1.1 connection over a pair of async streams.
pub struct HttpConnection<R, W> {
    reader: R,
    writer: W,
    read_buf: BytesMut,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, read_buf: BytesMut::with_capacity(MAX_HEADER_SIZE) }
    }

    /// Serves requests until the peer closes the connection or asks to.
    ///
    /// Handler failures never terminate the loop abnormally: they are routed
    /// through the error handler (or the generic 500 fallback) and the
    /// substitute response is written before the next request is read.
    pub async fn process<H>(mut self, handler: Arc<H>, error_handler: Option<Arc<ErrorHandler>>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            let raw = match self.read_transaction().await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("peer closed connection");
                    return Ok(());
                }
                Err(e) => {
                    error!("can't read next request, cause {}", e);
                    let mut response = Response::new();
                    response.set_error(400, "Bad Request", json!({}));
                    self.write_response(response).await?;
                    return Err(e.into());
                }
            };

            let keep_alive = raw.keep_alive;
            let response = dispatch(raw, handler.as_ref(), error_handler.as_deref()).await;
            self.write_response(response).await?;

            if !keep_alive {
                info!("connection marked for close, shutting down");
                return Ok(());
            }
        }
    }

    /// Reads one full transaction: head, then the complete body.
    ///
    /// Returns `None` on a clean EOF between requests.
    async fn read_transaction(&mut self) -> Result<Option<RawTransaction>, ParseError> {
        let (head, head_len) = loop {
            if let Some(parsed) = self.parse_head()? {
                break parsed;
            }
            let read = self.reader.read_buf(&mut self.read_buf).await.map_err(ParseError::io)?;
            if read == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(ParseError::invalid_header("connection closed mid request head"));
            }
        };

        let _ = self.read_buf.split_to(head_len);

        let content_length = head.content_length()?;
        while self.read_buf.len() < content_length {
            let read = self.reader.read_buf(&mut self.read_buf).await.map_err(ParseError::io)?;
            if read == 0 {
                return Err(ParseError::invalid_body("connection closed before the full body arrived"));
            }
        }
        let body_bytes = self.read_buf.split_to(content_length);
        let body = String::from_utf8_lossy(&body_bytes).into_owned();

        let keep_alive = head.keep_alive();
        Ok(Some(RawTransaction { method: head.method, target: head.target, headers: head.headers, body, keep_alive }))
    }

    fn parse_head(&self) -> Result<Option<(Head, usize)>, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        match parsed.parse(&self.read_buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let head = Head {
                    method: parsed.method.unwrap_or("GET").to_string(),
                    target: parsed.path.unwrap_or("/").to_string(),
                    minor_version: parsed.version.unwrap_or(1),
                    headers: parsed
                        .headers
                        .iter()
                        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                        .collect(),
                };
                Ok(Some((head, head_len)))
            }
            Ok(httparse::Status::Partial) => {
                if self.read_buf.len() > MAX_HEADER_SIZE {
                    return Err(ParseError::too_large_header(self.read_buf.len(), MAX_HEADER_SIZE));
                }
                Ok(None)
            }
            Err(httparse::Error::TooManyHeaders) => Err(ParseError::too_many_headers(MAX_HEADERS)),
            Err(e) => Err(ParseError::invalid_header(e)),
        }
    }

    async fn write_response(&mut self, response: Response) -> Result<(), SendError> {
        let mut sink = WireSink::new();
        response.send(&mut sink);
        self.writer.write_all(&sink.into_bytes()).await.map_err(SendError::io)?;
        self.writer.flush().await.map_err(SendError::io)?;
        Ok(())
    }
}

/// Builds the request, runs the handler and applies the error-handling path.
async fn dispatch<H>(raw: RawTransaction, handler: &H, error_handler: Option<&ErrorHandler>) -> Response
where
    H: Handler,
{
    let request = match Request::new(&raw.method, &raw.target, raw.headers, &raw.body) {
        Ok(request) => request,
        Err(e) => {
            error!("failed to construct request, cause {}", e);
            return fallback_response(None, &e, error_handler);
        }
    };

    // The handler consumes the request, but an installed error handler wants
    // to see it on failure. Only it pays for the copy; the generic fallback
    // never looks at the request.
    let fallback_request = error_handler.map(|_| request.clone());

    match handler.call(request).await {
        Ok(response) => response,
        Err(e) => {
            error!("handler failed, cause {}", e);
            fallback_response(fallback_request.as_ref(), e.as_ref(), error_handler)
        }
    }
}

fn fallback_response(
    request: Option<&Request>,
    error: &(dyn Error + Send + Sync),
    error_handler: Option<&ErrorHandler>,
) -> Response {
    if let Some(error_handler) = error_handler {
        if let Some(response) = error_handler(request, error) {
            return response;
        }
        warn!("error handler declined, using generic response");
    }
    let mut response = Response::new();
    response.set_error(500, "Internal Server Error", json!({}));
    response
}

struct RawTransaction {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: String,
    keep_alive: bool,
}

struct Head {
    method: String,
    target: String,
    minor_version: u8,
    headers: Vec<(String, String)>,
}

impl Head {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    fn content_length(&self) -> Result<usize, ParseError> {
        match self.header("content-length") {
            Some(raw) => raw.trim().parse().map_err(|_| ParseError::invalid_content_length(raw)),
            None => Ok(0),
        }
    }

    fn keep_alive(&self) -> bool {
        let connection = self.header("connection").unwrap_or("").to_ascii_lowercase();
        if connection.contains("close") {
            return false;
        }
        if self.minor_version == 0 {
            return connection.contains("keep-alive");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::handler::{BoxError, make_handler};
    use crate::protocol::ParsedBody;

    async fn run<H>(request_bytes: &str, handler: Arc<H>, error_handler: Option<Arc<ErrorHandler>>) -> String
    where
        H: Handler + 'static,
    {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer);
        let task = tokio::spawn(async move { connection.process(handler, error_handler).await });

        client.write_all(request_bytes.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        task.await.unwrap().unwrap();
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn json_round_trip() {
        let body = r#"{"first_name":"Donald"}"#;
        let request = format!(
            "POST /echo?a=1 HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        let handler = Arc::new(make_handler(|req: Request| async move {
            assert_eq!(req.method(), "POST");
            assert_eq!(req.path(), "/echo");
            assert_eq!(req.query_param("a"), Some(&json!(1)));
            assert_eq!(req.body(), &ParsedBody::Json(json!({"first_name": "Donald"})));

            let mut response = Response::new();
            response.set_content(json!({"received": true}));
            Ok::<_, BoxError>(response)
        }));

        let response = run(&request, handler, None).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Content-type: application/json\r\n"), "{response}");
        assert!(response.ends_with("{\n  \"received\": true\n}"), "{response}");
    }

    #[tokio::test]
    async fn handler_failure_falls_back_to_500() {
        let handler = Arc::new(make_handler(|_req: Request| async move {
            Err::<Response, BoxError>("boom".into())
        }));

        let request = "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let response = run(request, handler, None).await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{response}");
        assert!(response.contains("\"error\": \"Internal Server Error\""), "{response}");
    }

    #[tokio::test]
    async fn error_handler_substitutes_response() {
        let handler = Arc::new(make_handler(|_req: Request| async move {
            Err::<Response, BoxError>("boom".into())
        }));

        let error_handler: Arc<ErrorHandler> = Arc::new(|request, error| {
            assert_eq!(request.map(Request::path), Some("/"));
            let mut response = Response::new();
            response.set_error(503, "Out for lunch", json!({"cause": error.to_string()}));
            Some(response)
        });

        let request = "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let response = run(request, handler, Some(error_handler)).await;
        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"), "{response}");
        assert!(response.contains("\"cause\": \"boom\""), "{response}");
    }

    #[tokio::test]
    async fn declining_error_handler_falls_back_to_500() {
        let handler = Arc::new(make_handler(|_req: Request| async move {
            Err::<Response, BoxError>("boom".into())
        }));

        let error_handler: Arc<ErrorHandler> = Arc::new(|request, _error| {
            // The failed request is still handed over, even when declining.
            assert_eq!(request.map(Request::path), Some("/"));
            None
        });

        let request = "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let response = run(request, handler, Some(error_handler)).await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{response}");
        assert!(response.contains("\"error\": \"Internal Server Error\""), "{response}");
    }

    #[tokio::test]
    async fn keep_alive_serves_sequential_requests() {
        let handler = Arc::new(make_handler(|req: Request| async move {
            let mut response = Response::new();
            response.set_content(format!("path: {}", req.path()));
            Ok::<_, BoxError>(response)
        }));

        let request = "GET /first HTTP/1.1\r\nHost: localhost\r\n\r\nGET /second HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let response = run(request, handler, None).await;
        assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 2, "{response}");
        assert!(response.contains("path: /first"), "{response}");
        assert!(response.contains("path: /second"), "{response}");
    }
}
