use std::fmt::{self, Display, Formatter};
use std::result;

/// Errors produced while negotiating authentication.
///
/// The taxonomy keeps three failure families apart so callers can tell them
/// from one another: malformed messages and protocol violations (fatal to the
/// attempt, never retried), generic HTTP failures, and credential rejection.
#[derive(Debug)]
pub enum Error {
    /// A scheme name, parameter key or value contains characters outside the
    /// RFC 7235 token charset.
    InvalidToken(String),
    /// A header segment could not be decoded (e.g. parameter without `=`).
    InvalidHeaderSyntax(String),
    /// A required parameter was absent from an auth message.
    MissingParam(String),
    /// A required response header was absent.
    MissingHeader(&'static str),
    /// The challenge named a scheme the registry doesn't know.
    UnknownScheme(String),
    /// The exchange violated the expected protocol flow.
    Protocol(String),
    /// The server nonce does not extend the client nonce.
    InvalidNonce,
    /// Key derivation or MAC computation failed, with the cause attached.
    Crypto(String),
    /// The standard challenge loop exceeded its round budget.
    LoopCountExceeded,
    /// The server rejected the credentials.
    Rejected { status: u16, body: String },
    /// No registered scheme could handle the server's response.
    NoSuitableScheme { status: u16, server: String },
    /// An HTTP-level failure outside the negotiation grammar.
    Http { status: u16, body: String },
    /// The underlying transport failed.
    Transport(Box<dyn std::error::Error + Send + Sync>),
    /// The transport call was cancelled before a response arrived.
    Cancelled,
}

pub type Result<T> = result::Result<T, Error>;

use Error::*;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidToken(ctx) => write!(f, "Invalid token: {}", ctx),
            InvalidHeaderSyntax(ctx) => write!(f, "Invalid header syntax: {}", ctx),
            MissingParam(name) => write!(f, "Parameter not found: {}", name),
            MissingHeader(name) => write!(f, "Missing required header: {}", name),
            UnknownScheme(name) => write!(f, "Unknown auth scheme: {}", name),
            Protocol(ctx) => write!(f, "Auth protocol error: {}", ctx),
            InvalidNonce => write!(f, "Server nonce does not extend client nonce"),
            Crypto(ctx) => write!(f, "Crypto failure: {}", ctx),
            LoopCountExceeded => write!(f, "Loop count exceeded"),
            Rejected { status, body } => {
                write!(f, "Authentication rejected: {} {}", status, body)
            }
            NoSuitableScheme { status, server } => {
                write!(f, "No suitable auth scheme for: {} {}", status, server)
            }
            Http { status, body } => write!(f, "HTTP error: {} {}", status, body),
            Transport(err) => write!(f, "Transport failure: {}", err),
            Cancelled => write!(f, "Authentication cancelled"),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Crypto(format!("invalid iteration count: {}", err))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
