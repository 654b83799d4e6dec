//! Minimal HTTP/1.1 message framing over plain TCP streams.
//!
//! The crate parses one request per connection, renders responses through an
//! order enforcing [`response::ResponseWriter`] and dispatches connections to a
//! [`server::Handler`].
pub mod chunked;
pub mod error;
pub mod headers;
pub mod lines;
mod parse;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

#[cfg(feature = "bin")]
#[doc(hidden)]
pub mod app;
