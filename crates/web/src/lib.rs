//! A minimal async HTTP request/response toolkit.
//!
//! This crate normalizes inbound HTTP transactions into structured
//! [`protocol::Request`] values and serializes handler-built
//! [`protocol::Response`] values back to the wire. The interesting parts live
//! in the protocol layer:
//!
//! - Query-string parsing with bracket notation (`b[]=1`, `zz[q1]=x`)
//! - Content-type-driven body decoding: url-encoded, multipart, JSON, raw
//! - Content-type inference for responses from the shape of their content
//!
//! The transport side is deliberately small: an HTTP/1.1 connection loop that
//! buffers complete `Content-Length` bodies before the handler runs. No
//! HTTP/2, no TLS, no routing, no cookies.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use plume_web::handler::{BoxError, make_handler};
//! use plume_web::protocol::{Request, Response};
//! use plume_web::server::WebServer;
//! use serde_json::json;
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let handler = Arc::new(make_handler(hello));
//!     if let Err(e) = WebServer::new(8080).start(handler).await {
//!         eprintln!("server error: {e}");
//!     }
//! }
//!
//! async fn hello(request: Request) -> Result<Response, BoxError> {
//!     let mut response = Response::new();
//!     response.set_content(json!({ "path": request.path() }));
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: the request normalizer, response builder and sink contract
//! - [`connection`]: per-connection processing and wire serialization
//! - [`handler`]: the handler trait and the error-handler callback
//! - [`server`]: the accept loop
//!
//! # Limitations
//!
//! - HTTP/1.1 only, `Content-Length` bodies only (no chunked requests)
//! - Maximum header size: 8KB; maximum number of headers: 64
//! - Multipart decoding targets the everyday browser form case, not full
//!   RFC 2388

pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
