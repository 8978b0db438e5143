use crate::basic::Basic;
use crate::message::AuthMessage;
use crate::scram::Scram;
use crate::session::AuthSession;
use crate::transport::HttpResponse;
use crate::{Error, Result};

/// A pluggable authentication scheme.
///
/// Each variant covers the same capability set: answering a standard
/// RFC 7235 challenge, detecting servers that never issue one, and the
/// success callback that persists the final credential.
#[derive(Debug, Clone, Copy)]
pub enum Scheme {
    Scram(Scram),
    Basic(Basic),
}

impl Scheme {
    /// Lowercase registry key.
    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Scram(_) => Scram::NAME,
            Scheme::Basic(_) => Basic::NAME,
        }
    }

    /// Answer a challenge inside the standard loop.
    pub(crate) fn respond(
        &self,
        challenge: &AuthMessage,
        session: &mut AuthSession,
    ) -> Result<AuthMessage> {
        match self {
            Scheme::Scram(scram) => scram.respond(challenge, session),
            // Basic is only reachable through non-standard detection
            Scheme::Basic(_) => Err(Error::Protocol(
                "basic cannot answer a standard challenge".into(),
            )),
        }
    }

    /// Whether this scheme claims a response that fell outside the standard
    /// RFC 7235 loop. Detection never fails; what can't be evaluated doesn't
    /// apply.
    pub(crate) fn use_non_standard(&self, response: &HttpResponse, body: Option<&str>) -> bool {
        match self {
            Scheme::Scram(_) => false,
            Scheme::Basic(basic) => basic.detect(response, body),
        }
    }

    /// The `Authorization` value for the scheme's one-shot fallback call,
    /// when it has one.
    pub(crate) fn fallback_authorization(&self, session: &AuthSession) -> Option<String> {
        match self {
            Scheme::Scram(_) => None,
            Scheme::Basic(basic) => Some(basic.authorization(session)),
        }
    }

    /// Success callback on the terminal 200.
    pub(crate) fn on_success(
        &self,
        response: &HttpResponse,
        session: &mut AuthSession,
    ) -> Result<()> {
        match self {
            Scheme::Scram(scram) => scram.on_success(response, session),
            Scheme::Basic(basic) => {
                basic.on_success(session);
                Ok(())
            }
        }
    }
}

/// The fixed scheme registry. Immutable and shared; the order is the scan
/// order for non-standard detection.
pub const REGISTRY: &[Scheme] = &[Scheme::Scram(Scram), Scheme::Basic(Basic)];

/// Case-insensitive lookup of a scheme by name.
pub fn find(name: &str) -> Result<&'static Scheme> {
    REGISTRY
        .iter()
        .find(|scheme| scheme.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownScheme(name.to_string()))
}

/// All registered schemes in detection-scan order.
pub fn list() -> &'static [Scheme] {
    REGISTRY
}
