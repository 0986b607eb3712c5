use std::time::Duration;

use bytes::Bytes;

use super::util::basic_auth_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    /// Time from sending the request to reading the whole body.
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            body,
            ..Self::new(http::Method::POST, url)
        }
    }

    /// POST with a `Content-Type: application/json` body.
    pub fn post_json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::post(url, body.into()).header("content-type", "application/json")
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        self.header("authorization", basic_auth_value(username, password))
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_json_sets_content_type_and_auth() {
        let req = HttpRequest::post_json("http://localhost/user-register", "{}")
            .basic_auth("admin", "pw")
            .timeout(Duration::from_secs(2));

        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.body, Bytes::from_static(b"{}"));
        assert_eq!(req.timeout, Some(Duration::from_secs(2)));
        assert_eq!(
            req.headers,
            vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("authorization".to_string(), basic_auth_value("admin", "pw")),
            ]
        );
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let res = HttpResponse {
            status: 200,
            body: Bytes::from_static(b"ok"),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            elapsed: Duration::ZERO,
        };
        assert_eq!(res.header("Content-Type"), Some("text/plain"));
        assert_eq!(res.body_utf8(), Some("ok"));
        assert!(res.is_success());
    }
}
