use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

/// `Authorization` header value for HTTP basic auth.
pub fn basic_auth_value(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_credentials() {
        assert_eq!(
            basic_auth_value("user_1_0", "qwerty123"),
            "Basic dXNlcl8xXzA6cXdlcnR5MTIz"
        );
        assert_eq!(
            basic_auth_value("admin", "superSecretAdminPassword123"),
            "Basic YWRtaW46c3VwZXJTZWNyZXRBZG1pblBhc3N3b3JkMTIz"
        );
    }

    #[test]
    fn host_header_keeps_explicit_port() -> Result<(), url::ParseError> {
        let with_port = url::Url::parse("http://127.0.0.1:8000/user-get?id=1")?;
        assert_eq!(host_header_value(&with_port).as_deref(), Some("127.0.0.1:8000"));

        let default_port = url::Url::parse("http://localhost/")?;
        assert_eq!(host_header_value(&default_port).as_deref(), Some("localhost"));
        Ok(())
    }

    #[test]
    fn header_lookup_ignores_case() {
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        assert!(has_header(&headers, "content-type"));
        assert!(!has_header(&headers, "authorization"));
    }
}
