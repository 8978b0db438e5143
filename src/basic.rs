//! Basic authentication plus the detection heuristics for servers that
//! never issue a proper RFC 7235 challenge.

use base64::prelude::*;

use crate::session::AuthSession;
use crate::transport::HttpResponse;

pub(crate) fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Body substring of a known server-side bug that positively identifies
/// Basic-only legacy servers.
const QUIRK_BODY_SIGNATURE: &str = "wrong 4-byte ending";

/// The `basic` scheme. It doesn't fit the restricted header grammar, so it
/// never takes part in the standard challenge loop; it is reached through
/// non-standard detection only.
#[derive(Debug, Clone, Copy)]
pub struct Basic;

impl Basic {
    pub const NAME: &'static str = "basic";

    /// Decide whether the server should be authenticated against with
    /// Basic. Evaluated in order:
    ///
    /// 1. 401 with a `WWW-Authenticate` starting with `basic`.
    /// 2. A `Server` header starting with `niagara`, or a 401 carrying
    ///    neither `WWW-Authenticate` nor `Server` (legacy building-
    ///    automation servers answer with incomplete headers).
    /// 3. 500 whose body contains the known bug signature.
    ///
    /// Anything that cannot be evaluated counts as "does not apply".
    pub fn detect(&self, response: &HttpResponse, body: Option<&str>) -> bool {
        let www = response.headers.get("WWW-Authenticate").unwrap_or("");
        let server = response.headers.get("Server").unwrap_or("");

        if response.status == 401 && starts_with_ignore_ascii_case(www, "basic") {
            return true;
        }
        if starts_with_ignore_ascii_case(server, "niagara")
            || (response.status == 401 && www.is_empty() && server.is_empty())
        {
            return true;
        }
        if response.status == 500 {
            return body.is_some_and(|b| b.contains(QUIRK_BODY_SIGNATURE));
        }
        false
    }

    /// The `Authorization` value for the single fallback GET.
    pub fn authorization(&self, session: &AuthSession) -> String {
        let joined = format!("{}:{}", session.username(), session.password());
        format!("Basic {}", BASE64_STANDARD.encode(joined))
    }

    /// The fallback GET answered 200: persist the credential for subsequent
    /// calls.
    pub fn on_success(&self, session: &mut AuthSession) {
        let credential = self.authorization(session);
        session.persist_authorization(credential);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        let headers: Headers = headers.iter().copied().collect();
        HttpResponse::new(status, headers, Vec::new())
    }

    #[test]
    fn test_detect_basic_challenge() {
        let r = response(401, &[("WWW-Authenticate", "Basic realm=\"x\"")]);
        assert!(Basic.detect(&r, None));
    }

    #[test]
    fn test_detect_niagara_server() {
        let r = response(401, &[("Server", "Niagara Web Server/3.8")]);
        assert!(Basic.detect(&r, None));
    }

    #[test]
    fn test_detect_empty_headers_401() {
        assert!(Basic.detect(&response(401, &[]), None));
        // a Server header alone disqualifies the empty-headers rule
        assert!(!Basic.detect(&response(401, &[("Server", "nginx")]), None));
    }

    #[test]
    fn test_detect_known_bug_signature() {
        let r = response(500, &[]);
        assert!(Basic.detect(&r, Some("err: wrong 4-byte ending in frame")));
        assert!(!Basic.detect(&r, Some("some other error")));
        assert!(!Basic.detect(&r, None));
    }

    #[test]
    fn test_detect_rejects_plain_403() {
        assert!(!Basic.detect(&response(403, &[]), None));
    }

    #[test]
    fn test_authorization_value() {
        let session = AuthSession::new("http://x/about", "alice", "secret");
        assert_eq!(
            Basic.authorization(&session),
            format!("Basic {}", BASE64_STANDARD.encode("alice:secret"))
        );
    }
}
