use std::time::Duration;

use crate::scram::ScramRoundState;
use crate::transport::HttpResponse;

/// Timeouts applied by the transport adapter to every negotiation call.
///
/// The engine itself never enforces them; they are plumbed through on each
/// [`HttpRequest`](crate::HttpRequest) for the adapter to honor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

/// State of one authentication attempt against one endpoint.
///
/// Created per connection attempt and driven by the negotiation engine; the
/// password and the per-attempt scratch state are wiped when the attempt
/// reaches a terminal state, success or failure. The persisted headers
/// survive the attempt and must be attached to all subsequent calls made
/// through this connection.
#[derive(Debug)]
pub struct AuthSession {
    endpoint: String,
    username: String,
    password: String,
    config: SessionConfig,
    /// SCRAM scratch carried between the first and the final round.
    pub(crate) scram: Option<ScramRoundState>,
    /// Cookies collected from `Set-Cookie` during the handshake, by name.
    cookies: Vec<(String, String)>,
    authorization: Option<String>,
    cookie_header: Option<String>,
    authenticated: bool,
}

impl AuthSession {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        AuthSession {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            config: SessionConfig::default(),
            scram: None,
            cookies: Vec::new(),
            authorization: None,
            cookie_header: None,
            authenticated: false,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password under negotiation; empty once the attempt concluded.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the attempt reached the authenticated terminal state.
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// The persisted `Authorization` value to attach to subsequent calls.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// The persisted `Cookie` value, if the server set cookies during the
    /// handshake.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie_header.as_deref()
    }

    /// Headers to attach to every call made after a successful negotiation.
    pub fn persisted_headers(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.authorization
            .as_deref()
            .map(|v| ("Authorization", v))
            .into_iter()
            .chain(self.cookie_header.as_deref().map(|v| ("Cookie", v)))
    }

    pub(crate) fn persist_authorization(&mut self, value: String) {
        self.authorization = Some(value);
    }

    /// Record `Set-Cookie` values from a handshake response, keeping only
    /// the `name=value` pair and letting later responses win per name.
    pub(crate) fn absorb_cookies(&mut self, response: &HttpResponse) {
        for value in response.headers.get_all("Set-Cookie") {
            let pair = value.split(';').next().unwrap_or("").trim();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim().to_string();
            let value = value.trim().to_string();
            match self.cookies.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => self.cookies.push((name, value)),
            }
        }
    }

    /// Move to the terminal state: publish collected cookies on success and
    /// wipe the password and per-attempt scratch either way.
    pub(crate) fn conclude(&mut self, authenticated: bool) {
        if authenticated && !self.cookies.is_empty() {
            let joined = self
                .cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; ");
            self.cookie_header = Some(joined);
        }
        self.authenticated = authenticated;
        self.wipe();
    }

    fn wipe(&mut self) {
        // overwrite before dropping so the allocation doesn't keep the
        // secret bytes around
        let mut taken = std::mem::take(&mut self.password).into_bytes();
        for byte in taken.iter_mut() {
            *byte = 0;
        }
        self.scram = None;
        self.cookies.clear();
    }
}
