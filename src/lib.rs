//! Client-side authentication negotiation for building-automation
//! data-exchange servers speaking an RFC 7235-style handshake over HTTP.
//!
//! A server challenges an unauthenticated request through `WWW-Authenticate`;
//! this crate selects a compatible scheme, runs the scheme-specific handshake
//! and leaves the session holding a bearer credential for all subsequent
//! calls. Two schemes are built in: SCRAM (RFC 5802, PBKDF2 + HMAC-SHA-256)
//! and a fallback Basic scheme, together with detection heuristics for legacy
//! servers that never issue a proper challenge.
//!
//! The crate is transport-agnostic: you supply a single capability, "perform
//! a GET with a given `Authorization` header against a fixed endpoint and
//! return status, headers and body", either blocking ([`Transport`]) or
//! async ([`AsyncTransport`]). The protocol logic is implemented once, as
//! the sans-io [`Negotiation`] machine; both drivers pump the same machine.
//!
//! # Examples
//!
//! ```no_run
//! use hayauth::{authenticate, AuthSession, HttpRequest, HttpResponse, Transport};
//!
//! // This type represents your HTTP client integration.
//! struct MyTransport;
//!
//! impl Transport for MyTransport {
//!     fn call(&mut self, request: &HttpRequest) -> hayauth::Result<HttpResponse> {
//!         unimplemented!()
//!     }
//! }
//!
//! let session = AuthSession::new("https://plant.example/api/about", "alice", "hunter2");
//! let session = authenticate(&mut MyTransport, session).unwrap();
//!
//! // Attach these to every request made through this connection.
//! for (name, value) in session.persisted_headers() {
//!     println!("{}: {}", name, value);
//! }
//! ```
//!
//! The password and all per-attempt scratch state are wiped when the attempt
//! concludes, whether it succeeded or not.

mod basic;
mod error;
mod message;
mod negotiate;
pub mod scheme;
mod scram;
mod session;
mod transport;

pub use crate::basic::Basic;
pub use crate::error::{Error, Result};
pub use crate::message::{is_token, split_list, AuthMessage};
pub use crate::negotiate::{authenticate, authenticate_async, Negotiation, Step};
pub use crate::scheme::Scheme;
pub use crate::scram::Scram;
pub use crate::session::{AuthSession, SessionConfig};
pub use crate::transport::{
    AsyncTransport, Headers, HttpMethod, HttpRequest, HttpResponse, Transport,
};

/// Parse a `WWW-Authenticate` value and return its first challenge.
/// Convenience for [`AuthMessage::parse()`].
pub fn parse(header: &str) -> Result<AuthMessage> {
    AuthMessage::parse(header)
}

#[test]
fn test_parse_convenience() {
    let challenge = parse("SCRAM hash=SHA-256, handshakeToken=aabb").unwrap();
    assert_eq!(challenge.scheme(), "scram");
    assert_eq!(challenge.param("handshaketoken"), Some("aabb"));
}
