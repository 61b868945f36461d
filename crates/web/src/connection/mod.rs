//! Transport adapter: connection processing and wire serialization.

mod http_connection;
mod sink;

pub use http_connection::HttpConnection;
pub use sink::WireSink;
