//! The negotiation engine: one protocol implementation, pumped with
//! responses through [`Negotiation::handle`]. The blocking and async drivers
//! are thin loops over the same machine, so the two scheduling models cannot
//! drift apart; suspension happens only at the transport boundary.

use base64::prelude::*;
use tracing::{debug, trace};

use crate::basic::starts_with_ignore_ascii_case;
use crate::message::AuthMessage;
use crate::scheme::{self, Scheme};
use crate::session::AuthSession;
use crate::transport::{AsyncTransport, Headers, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::{Error, Result};

/// Highest allowed round index in the standard challenge loop; at most six
/// requests are sent before the attempt fails with
/// [`Error::LoopCountExceeded`].
const MAX_ROUND: u32 = 5;

/// What the engine wants next.
#[must_use]
#[derive(Debug)]
pub enum Step {
    /// Perform this call and feed the response back into
    /// [`Negotiation::handle`].
    Send(HttpRequest),
    /// Terminal state reached; collect the session with
    /// [`Negotiation::finish`].
    Finished,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Hello,
    Standard { round: u32 },
    Fallback,
    Done,
}

/// One authentication attempt as a sans-io state machine.
///
/// [`begin`](Self::begin) yields the initial identification call; every
/// response is fed to [`handle`](Self::handle) until it returns
/// [`Step::Finished`] or an error. Either way the session's password and
/// scratch state are wiped before control returns.
#[derive(Debug)]
pub struct Negotiation {
    session: AuthSession,
    state: State,
    active: Option<&'static Scheme>,
}

impl Negotiation {
    pub fn new(session: AuthSession) -> Self {
        Negotiation {
            session,
            state: State::Hello,
            active: None,
        }
    }

    /// The unauthenticated identification call that opens the exchange.
    pub fn begin(&mut self) -> HttpRequest {
        let username = BASE64_URL_SAFE_NO_PAD.encode(self.session.username());
        // base64url output stays inside the token charset, so this is
        // always a well-formed auth message
        self.request(format!("hello username={}", username))
    }

    /// Advance the machine with the response to the previously issued call.
    pub fn handle(&mut self, response: &HttpResponse) -> Result<Step> {
        match self.advance(response) {
            Ok(step) => Ok(step),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Abandon the attempt (transport failure, cancellation). Secrets are
    /// wiped as on any other terminal state.
    pub fn abort(&mut self) {
        self.fail();
    }

    fn fail(&mut self) {
        if !matches!(self.state, State::Done) {
            self.session.conclude(false);
            self.state = State::Done;
        }
    }

    /// Hand the session back once a terminal state was reached.
    pub fn finish(self) -> AuthSession {
        self.session
    }

    fn advance(&mut self, response: &HttpResponse) -> Result<Step> {
        self.session.absorb_cookies(response);
        match self.state {
            State::Hello => {
                if response.status != 401 && response.status != 500 {
                    debug!(status = response.status, "no challenge, already authenticated");
                    return self.succeed(None, response);
                }
                let www = response.headers.get("WWW-Authenticate").unwrap_or("");
                if response.status == 401
                    && !www.is_empty()
                    && !starts_with_ignore_ascii_case(www, "basic")
                {
                    self.state = State::Standard { round: 0 };
                    self.standard_round(0, response)
                } else {
                    self.detect_fallback(response)
                }
            }
            State::Standard { round } => match response.status {
                200 => self.succeed(self.active, response),
                401 => {
                    self.state = State::Standard { round: round + 1 };
                    self.standard_round(round + 1, response)
                }
                status => Err(Error::Rejected {
                    status,
                    body: response.text().unwrap_or_default(),
                }),
            },
            State::Fallback => match response.status {
                // fallback success is strictly 200
                200 => self.succeed(self.active, response),
                status => Err(Error::Rejected {
                    status,
                    body: response.text().unwrap_or_default(),
                }),
            },
            State::Done => Err(Error::Protocol("negotiation already concluded".into())),
        }
    }

    /// One round of the standard RFC 7235 loop: parse the challenge list,
    /// resolve the scheme of its first entry and send the scheme's answer.
    fn standard_round(&mut self, round: u32, response: &HttpResponse) -> Result<Step> {
        if round > MAX_ROUND {
            return Err(Error::LoopCountExceeded);
        }
        let www = response
            .headers
            .get("WWW-Authenticate")
            .ok_or(Error::MissingHeader("WWW-Authenticate"))?;
        let challenge = AuthMessage::parse(www)?;
        let scheme = scheme::find(challenge.scheme())?;
        trace!(round, scheme = scheme.name(), "answering challenge");
        let reply = scheme.respond(&challenge, &mut self.session)?;
        self.active = Some(scheme);
        Ok(Step::Send(self.request(reply.encode())))
    }

    /// Scan the registry for a scheme claiming a response that fell outside
    /// the standard loop, and start its fallback handshake.
    fn detect_fallback(&mut self, response: &HttpResponse) -> Result<Step> {
        let body = response.text();
        for scheme in scheme::list() {
            if scheme.use_non_standard(response, body.as_deref()) {
                debug!(scheme = scheme.name(), "non-standard scheme detected");
                if let Some(authorization) = scheme.fallback_authorization(&self.session) {
                    self.active = Some(scheme);
                    self.state = State::Fallback;
                    return Ok(Step::Send(self.request(authorization)));
                }
            }
        }
        let status = response.status;
        if (400..600).contains(&status) {
            Err(Error::Http {
                status,
                body: body.unwrap_or_default(),
            })
        } else {
            Err(Error::NoSuitableScheme {
                status,
                server: response.headers.get("Server").unwrap_or("").to_string(),
            })
        }
    }

    fn succeed(&mut self, scheme: Option<&'static Scheme>, response: &HttpResponse) -> Result<Step> {
        if let Some(scheme) = scheme {
            scheme.on_success(response, &mut self.session)?;
        }
        debug!("authentication succeeded");
        self.session.conclude(true);
        self.state = State::Done;
        Ok(Step::Finished)
    }

    fn request(&self, authorization: String) -> HttpRequest {
        let mut headers = Headers::new();
        headers.insert("Authorization", authorization);
        let config = self.session.config();
        HttpRequest {
            method: HttpMethod::Get,
            endpoint: self.session.endpoint().to_string(),
            headers,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
        }
    }
}

/// Run a full negotiation over a blocking transport.
///
/// On success the returned session carries the persisted `Authorization`
/// (and `Cookie`) headers; on failure the error distinguishes credential
/// rejection from transport and HTTP-level trouble. The password is wiped
/// either way.
pub fn authenticate<T: Transport + ?Sized>(
    transport: &mut T,
    session: AuthSession,
) -> Result<AuthSession> {
    let mut negotiation = Negotiation::new(session);
    let mut request = negotiation.begin();
    loop {
        let response = match transport.call(&request) {
            Ok(response) => response,
            Err(err) => {
                negotiation.abort();
                return Err(err);
            }
        };
        match negotiation.handle(&response)? {
            Step::Send(next) => request = next,
            Step::Finished => return Ok(negotiation.finish()),
        }
    }
}

/// Run a full negotiation over an async transport. Behaves exactly like
/// [`authenticate`]; the protocol logic is shared.
pub async fn authenticate_async<T: AsyncTransport + ?Sized>(
    transport: &mut T,
    session: AuthSession,
) -> Result<AuthSession> {
    let mut negotiation = Negotiation::new(session);
    let mut request = negotiation.begin();
    loop {
        let response = match transport.call(&request).await {
            Ok(response) => response,
            Err(err) => {
                negotiation.abort();
                return Err(err);
            }
        };
        match negotiation.handle(&response)? {
            Step::Send(next) => request = next,
            Step::Finished => return Ok(negotiation.finish()),
        }
    }
}
