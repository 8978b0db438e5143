use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// HTTP method used for a negotiation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        })
    }
}

/// A small multi-valued header map with case-insensitive lookup.
///
/// The engine only ever needs a handful of headers per call, so this is a
/// plain vector rather than anything indexed.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    /// Append a header, keeping any existing values with the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.to_string(), value.into()));
    }

    /// First value of the named header, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of the named header, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Headers(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

/// One call the engine asks the transport to perform.
///
/// The endpoint is fixed for the whole negotiation; only the headers change
/// between rounds. Timeouts mirror the session configuration so adapters can
/// apply them without reaching back into the session.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub headers: Headers,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

/// Status, headers and body of a completed call.
///
/// Error statuses (401, 500, ...) are ordinary responses here, not transport
/// errors; the engine branches on them.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        HttpResponse {
            status,
            headers,
            body,
        }
    }

    /// The body as text, or `None` when the response carries no
    /// `Content-Type` (interpreting such bodies is not meaningful).
    pub fn text(&self) -> Option<String> {
        self.headers.get("Content-Type")?;
        Some(String::from_utf8_lossy(&self.body).into_owned())
    }
}

/// Blocking transport capability consumed by [`authenticate`].
///
/// Implementations wrap their own failures in [`Error::Transport`]; HTTP
/// error statuses must be returned as plain [`HttpResponse`] values.
///
/// [`authenticate`]: crate::authenticate
/// [`Error::Transport`]: crate::Error::Transport
pub trait Transport {
    fn call(&mut self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Async transport capability consumed by [`authenticate_async`].
///
/// The negotiation suspends only at this boundary; rounds are computed
/// strictly sequentially between calls.
///
/// [`authenticate_async`]: crate::authenticate_async
#[async_trait]
pub trait AsyncTransport {
    async fn call(&mut self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[cfg(feature = "http")]
mod http_convert {
    use super::Headers;

    impl From<&http::HeaderMap> for Headers {
        fn from(map: &http::HeaderMap) -> Self {
            let mut headers = Headers::new();
            for (name, value) in map {
                if let Ok(value) = value.to_str() {
                    headers.insert(name.as_str(), value);
                }
            }
            headers
        }
    }

    impl TryFrom<&Headers> for http::HeaderMap {
        type Error = http::Error;

        fn try_from(headers: &Headers) -> Result<Self, Self::Error> {
            let mut map = http::HeaderMap::new();
            for (name, value) in headers.iter() {
                map.append(
                    http::header::HeaderName::from_bytes(name.as_bytes())?,
                    http::header::HeaderValue::from_str(value)?,
                );
            }
            Ok(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("WWW-Authenticate", "scram");
        assert_eq!(headers.get("www-authenticate"), Some("scram"));
        assert_eq!(headers.get("server"), None);
    }

    #[test]
    fn test_headers_multi_value() {
        let mut headers = Headers::new();
        headers.insert("Set-Cookie", "a=1; Path=/");
        headers.insert("set-cookie", "b=2");
        let all: Vec<&str> = headers.get_all("Set-Cookie").collect();
        assert_eq!(all, vec!["a=1; Path=/", "b=2"]);
    }

    #[test]
    fn test_text_requires_content_type() {
        let response = HttpResponse::new(500, Headers::new(), b"oops".to_vec());
        assert_eq!(response.text(), None);

        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        let response = HttpResponse::new(500, headers, b"oops".to_vec());
        assert_eq!(response.text().as_deref(), Some("oops"));
    }
}
