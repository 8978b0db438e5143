use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::{Error, Result};

/// Characters allowed in an RFC 7235 "token": visible ASCII minus the
/// separators. Scheme names, parameter keys and parameter values are all
/// restricted to this charset; anything richer (usernames, SCRAM payloads)
/// is base64url-encoded before it goes on the wire.
pub fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

/// One challenge or credential: a scheme name plus `key=value` parameters,
/// as carried by `Authorization` and `WWW-Authenticate` headers.
///
/// The scheme and parameter keys are lowercased on construction; parameter
/// values keep their original case. Serialization is canonical: parameters
/// in sorted key order, `scheme key1=val1, key2=val2`, no space around `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMessage {
    scheme: String,
    params: BTreeMap<String, String>,
}

impl AuthMessage {
    /// Construct a message, validating the token charset of the scheme and
    /// of every parameter key and value.
    pub fn new<I, K, V>(scheme: &str, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        if !is_token(scheme) {
            return Err(Error::InvalidToken(scheme.to_string()));
        }
        let mut map = BTreeMap::new();
        for (key, value) in params {
            let key = key.as_ref();
            let value = value.into();
            if !is_token(key) {
                return Err(Error::InvalidToken(key.to_string()));
            }
            if !is_token(&value) {
                return Err(Error::InvalidToken(value));
            }
            map.insert(key.to_ascii_lowercase(), value);
        }
        Ok(AuthMessage {
            scheme: scheme.to_ascii_lowercase(),
            params: map,
        })
    }

    /// Parse a header value and return its first challenge.
    pub fn parse(header: &str) -> Result<AuthMessage> {
        let mut list = Self::parse_list(header)?;
        if list.is_empty() {
            return Err(Error::InvalidHeaderSyntax(header.to_string()));
        }
        Ok(list.remove(0))
    }

    /// Parse a header value that may carry several comma-separated
    /// challenges (RFC 7235 allows a list at the top level).
    pub fn parse_list(header: &str) -> Result<Vec<AuthMessage>> {
        split_list(header)
            .iter()
            .map(|segment| Self::decode(segment))
            .collect()
    }

    /// Decode a single `scheme key=val,key=val` segment.
    fn decode(segment: &str) -> Result<AuthMessage> {
        let segment = segment.trim();
        let (scheme, rest) = match segment.find(' ') {
            Some(at) => (&segment[..at], segment[at + 1..].trim()),
            None => (segment, ""),
        };
        let mut pairs = Vec::new();
        if !rest.is_empty() {
            for part in rest.split(',') {
                let part = part.trim();
                let eq = part
                    .find('=')
                    .ok_or_else(|| Error::InvalidHeaderSyntax(part.to_string()))?;
                let key = part[..eq].trim();
                let value = part[eq + 1..].trim();
                pairs.push((key, value.to_string()));
            }
        }
        AuthMessage::new(scheme, pairs)
    }

    /// Canonical wire form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// The lowercased scheme name.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Case-insensitive parameter lookup.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Like [`param`](Self::param) but absence is an error.
    pub fn required_param(&self, name: &str) -> Result<&str> {
        self.param(name)
            .ok_or_else(|| Error::MissingParam(name.to_string()))
    }
}

impl Display for AuthMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scheme)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i == 0 {
                write!(f, " {}={}", key, value)?;
            } else {
                write!(f, ", {}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl FromStr for AuthMessage {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

/// Split a header value into its top-level challenge productions.
///
/// A comma opens a new challenge only when the word right after it (up to
/// the next space) is itself a valid token and it is not the very first word
/// of the header; `key=value` words stay attached to the current challenge.
/// So `"a b=c, d=e, f g=h"` splits into `["a b=c,d=e", "f g=h"]`.
pub fn split_list(header: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for (i, piece) in header.split(',').enumerate() {
        let piece = piece.trim();
        let first_word = piece.split(' ').next().unwrap_or("");
        if i > 0 && !is_token(first_word) {
            // continuation of the previous challenge's parameter list
            if let Some(last) = segments.last_mut() {
                last.push(',');
                last.push_str(piece);
                continue;
            }
        }
        segments.push(piece.to_string());
    }
    segments
}
