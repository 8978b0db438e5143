//! SCRAM client role per RFC 5802, SHA-256 variant, carried over the
//! RFC 7235 header grammar: each SCRAM message travels base64url-encoded in
//! the `data` parameter of a `scram` challenge or credential.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::message::AuthMessage;
use crate::session::AuthSession;
use crate::transport::HttpResponse;
use crate::{Error, Result};

/// Channel-binding prefix for "no channel binding, no authzid".
const GS2_HEADER: &str = "n,,";

/// Length of the client nonce in characters.
const NONCE_LEN: usize = 16;

const SHA256_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Scratch state set in the first round and consumed in the final round.
#[derive(Debug)]
pub(crate) struct ScramRoundState {
    pub client_nonce: String,
    pub client_first_bare: String,
}

/// Stretch a password into a 32-byte salted key (PBKDF2-HMAC-SHA-256).
pub fn salted_password(password: &str, salt: &[u8], iterations: u32) -> [u8; SHA256_LEN] {
    let mut out = [0u8; SHA256_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; SHA256_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| Error::Crypto(format!("bad HMAC key: {}", err)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Generate a nonce from the unreserved-base64 alphabet `[A-Za-z0-9_-]`.
///
/// Random bytes are base64-encoded, filtered to the allowed alphabet and
/// truncated; if a draw yields fewer usable characters than needed, more
/// bytes are drawn until the nonce is complete.
pub(crate) fn generate_nonce() -> String {
    nonce_from_rng(&mut rand::thread_rng())
}

fn nonce_from_rng<R: RngCore>(rng: &mut R) -> String {
    let mut nonce = String::with_capacity(NONCE_LEN);
    while nonce.len() < NONCE_LEN {
        let bytes: [u8; 16] = rng.gen();
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);
        nonce.extend(
            encoded
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                .take(NONCE_LEN - nonce.len()),
        );
    }
    nonce
}

/// Server-first-message fields: `r=<nonce>,s=<base64 salt>,i=<iterations>`.
struct ServerFirst<'a> {
    nonce: &'a str,
    salt: Vec<u8>,
    iterations: u32,
}

fn parse_server_first(message: &str) -> Result<ServerFirst<'_>> {
    let mut nonce = None;
    let mut salt = None;
    let mut iterations = None;
    for part in message.split(',') {
        match part.split_once('=') {
            Some(("r", value)) => nonce = Some(value),
            Some(("s", value)) => {
                let decoded = BASE64_STANDARD.decode(value).map_err(|err| {
                    Error::Protocol(format!("invalid salt in server message: {}", err))
                })?;
                salt = Some(decoded);
            }
            Some(("i", value)) => iterations = Some(value.parse::<u32>()?),
            _ => {}
        }
    }
    Ok(ServerFirst {
        nonce: nonce.ok_or_else(|| Error::Protocol("server message missing nonce".into()))?,
        salt: salt.ok_or_else(|| Error::Protocol("server message missing salt".into()))?,
        iterations: iterations
            .ok_or_else(|| Error::Protocol("server message missing iterations".into()))?,
    })
}

/// The `scram` scheme: a two-round salted challenge-response exchange.
#[derive(Debug, Clone, Copy)]
pub struct Scram;

impl Scram {
    pub const NAME: &'static str = "scram";

    /// Answer a standard challenge. A challenge without `data` starts the
    /// exchange; one with `data` carries the server-first-message and closes
    /// it.
    pub fn respond(&self, challenge: &AuthMessage, session: &mut AuthSession) -> Result<AuthMessage> {
        match challenge.param("data") {
            None => self.first_round(challenge, session),
            Some(data) => self.final_round(challenge, data, session),
        }
    }

    fn first_round(
        &self,
        challenge: &AuthMessage,
        session: &mut AuthSession,
    ) -> Result<AuthMessage> {
        let client_nonce = generate_nonce();
        let client_first_bare = format!("n={},r={}", session.username(), client_nonce);
        let data = BASE64_URL_SAFE_NO_PAD.encode(format!("{}{}", GS2_HEADER, client_first_bare));
        session.scram = Some(ScramRoundState {
            client_nonce,
            client_first_bare,
        });
        self.reply(challenge, data)
    }

    fn final_round(
        &self,
        challenge: &AuthMessage,
        data: &str,
        session: &mut AuthSession,
    ) -> Result<AuthMessage> {
        let state = session
            .scram
            .take()
            .ok_or_else(|| Error::Protocol("scram final round without first round".into()))?;

        let decoded = BASE64_URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|err| Error::Protocol(format!("invalid challenge data: {}", err)))?;
        let server_first = String::from_utf8(decoded)
            .map_err(|err| Error::Protocol(format!("invalid challenge data: {}", err)))?;
        let fields = parse_server_first(&server_first)?;
        if !fields.nonce.starts_with(&state.client_nonce) {
            return Err(Error::InvalidNonce);
        }

        let salted = salted_password(session.password(), &fields.salt, fields.iterations);
        let client_key = hmac_sha256(&salted, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);

        let client_final_no_proof = format!(
            "c={},r={}",
            BASE64_STANDARD.encode(GS2_HEADER),
            fields.nonce
        );
        let auth_message = format!(
            "{},{},{}",
            state.client_first_bare, server_first, client_final_no_proof
        );
        let client_signature = hmac_sha256(stored_key.as_slice(), auth_message.as_bytes())?;

        let mut proof = [0u8; SHA256_LEN];
        for (p, (k, s)) in proof
            .iter_mut()
            .zip(client_key.iter().zip(client_signature.iter()))
        {
            *p = k ^ s;
        }

        let client_final = format!(
            "{},p={}",
            client_final_no_proof,
            BASE64_STANDARD.encode(proof)
        );
        self.reply(challenge, BASE64_URL_SAFE_NO_PAD.encode(client_final))
    }

    /// Build the response message, carrying the handshake token through when
    /// the server issued one.
    fn reply(&self, challenge: &AuthMessage, data: String) -> Result<AuthMessage> {
        let mut params = vec![("data", data)];
        if let Some(token) = challenge.param("handshakeToken") {
            params.push(("handshakeToken", token.to_string()));
        }
        AuthMessage::new(Self::NAME, params)
    }

    /// Terminal 200: lift the bearer token out of `Authentication-Info` and
    /// persist the credential header for all subsequent calls.
    pub fn on_success(&self, response: &HttpResponse, session: &mut AuthSession) -> Result<()> {
        let info = response
            .headers
            .get("Authentication-Info")
            .ok_or(Error::MissingHeader("Authentication-Info"))?;
        let message = AuthMessage::parse(info)?;
        let token = message.required_param("authToken")?;
        let credential = AuthMessage::new("bearer", [("authToken", token)])?;
        session.persist_authorization(credential.encode());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;

    fn vector(password: &str, salt: &[u8], iterations: u32) -> String {
        hex::encode(salted_password(password, salt, iterations))
    }

    #[test]
    fn test_pbkdf2_golden_vectors() {
        assert_eq!(
            vector("password", b"salt", 1),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
        assert_eq!(
            vector("password", b"salt", 2),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
        assert_eq!(
            vector("password", b"salt", 4096),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn test_nonce_alphabet_and_length() {
        for _ in 0..64 {
            let nonce = generate_nonce();
            assert_eq!(nonce.len(), 16);
            assert!(nonce
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_first_round_message() {
        let mut session = AuthSession::new("http://x/about", "alice", "secret");
        let challenge =
            AuthMessage::new("scram", [("hash", "SHA-256"), ("handshakeToken", "tok1")]).unwrap();
        let reply = Scram.respond(&challenge, &mut session).unwrap();

        assert_eq!(reply.scheme(), "scram");
        assert_eq!(reply.param("handshakeToken"), Some("tok1"));
        let data = BASE64_URL_SAFE_NO_PAD
            .decode(reply.param("data").unwrap())
            .unwrap();
        let data = String::from_utf8(data).unwrap();
        let state = session.scram.as_ref().unwrap();
        assert_eq!(data, format!("n,,n=alice,r={}", state.client_nonce));
        assert_eq!(
            state.client_first_bare,
            format!("n=alice,r={}", state.client_nonce)
        );
    }

    /// RFC 7677 §3 example exchange (user "user", password "pencil").
    #[test]
    fn test_final_round_rfc7677_vector() {
        let client_nonce = "rOprNGfwEbeRWgbNEkqO";
        let server_nonce = "rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0";
        let server_first = format!("r={},s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096", server_nonce);

        let mut session = AuthSession::new("http://x/about", "user", "pencil");
        session.scram = Some(ScramRoundState {
            client_nonce: client_nonce.to_string(),
            client_first_bare: format!("n=user,r={}", client_nonce),
        });
        let challenge = AuthMessage::new(
            "scram",
            [("data", BASE64_URL_SAFE_NO_PAD.encode(&server_first))],
        )
        .unwrap();

        let reply = Scram.respond(&challenge, &mut session).unwrap();
        let client_final = String::from_utf8(
            BASE64_URL_SAFE_NO_PAD
                .decode(reply.param("data").unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            client_final,
            format!(
                "c=biws,r={},p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=",
                server_nonce
            )
        );
        // scratch consumed by the final round
        assert!(session.scram.is_none());
    }

    #[test]
    fn test_final_round_rejects_foreign_nonce() {
        let mut session = AuthSession::new("http://x/about", "user", "pencil");
        session.scram = Some(ScramRoundState {
            client_nonce: "AAAAAAAAAAAAAAAA".to_string(),
            client_first_bare: "n=user,r=AAAAAAAAAAAAAAAA".to_string(),
        });
        let server_first = "r=BBBBBBBBBBBBBBBBsrv,s=c2FsdA==,i=1000";
        let challenge = AuthMessage::new(
            "scram",
            [("data", BASE64_URL_SAFE_NO_PAD.encode(server_first))],
        )
        .unwrap();
        assert!(matches!(
            Scram.respond(&challenge, &mut session),
            Err(Error::InvalidNonce)
        ));
    }

    #[test]
    fn test_malformed_server_first() {
        let respond = |message: &str| {
            let mut session = AuthSession::new("http://x/about", "user", "pencil");
            session.scram = Some(ScramRoundState {
                client_nonce: "n".repeat(16),
                client_first_bare: format!("n=user,r={}", "n".repeat(16)),
            });
            let challenge =
                AuthMessage::new("scram", [("data", BASE64_URL_SAFE_NO_PAD.encode(message))])
                    .unwrap();
            Scram.respond(&challenge, &mut session)
        };
        let nonce = "n".repeat(16);
        assert!(respond(&format!("r={},i=4096", nonce)).is_err()); // no salt
        assert!(respond(&format!("r={},s=c2FsdA==", nonce)).is_err()); // no iterations
        assert!(respond("s=c2FsdA==,i=4096").is_err()); // no nonce
        assert!(matches!(
            respond(&format!("r={},s=c2FsdA==,i=lots", nonce)),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_success_callback_extracts_bearer() {
        let mut session = AuthSession::new("http://x/about", "alice", "secret");
        let headers: Headers = [("Authentication-Info", "bearer authToken=abc-123")]
            .into_iter()
            .collect();
        let response = HttpResponse::new(200, headers, Vec::new());
        Scram.on_success(&response, &mut session).unwrap();
        assert_eq!(session.authorization(), Some("bearer authtoken=abc-123"));
    }

    #[test]
    fn test_success_callback_requires_header() {
        let mut session = AuthSession::new("http://x/about", "alice", "secret");
        let response = HttpResponse::new(200, Headers::new(), Vec::new());
        assert!(matches!(
            Scram.on_success(&response, &mut session),
            Err(Error::MissingHeader("Authentication-Info"))
        ));
    }
}
