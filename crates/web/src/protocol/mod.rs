//! Protocol types: the request normalizer, the response builder and their
//! supporting pieces.

mod body;
mod error;
mod multipart;
mod query;
mod request;
mod response;

pub use body::ParsedBody;
pub use error::{HttpError, ParseError, SendError};
pub use request::Request;
pub use response::{Content, Header, Response, ResponseSink};
