// ============================================================================
// Credential Extraction
// ============================================================================
//
// Precedence when a client supplies the token in more than one place:
// 1. JSON body field (application/json)
// 2. Form field (application/x-www-form-urlencoded or multipart/form-data)
// 3. Dedicated header (X-CSRF-Token by default)
//
// The first non-empty value wins; later locations are not consulted.
// The token cookie is deliberately NOT a source: echoing the cookie back is
// what a forged cross-site request would do automatically.
//
// ============================================================================

use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, HeaderMap},
};
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    JsonBody,
    FormField,
    Header,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::JsonBody => "json-body",
            CredentialSource::FormField => "form-field",
            CredentialSource::Header => "header",
        }
    }
}

/// Field and header names the token is read from
#[derive(Debug, Clone)]
pub struct TokenLocations {
    pub field_name: String,
    pub header_name: String,
}

impl Default for TokenLocations {
    fn default() -> Self {
        Self {
            field_name: "csrf_token".to_string(),
            header_name: "X-CSRF-Token".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

/// Find the credential in a buffered request
pub async fn extract_credential(
    headers: &HeaderMap,
    body: &Bytes,
    locations: &TokenLocations,
) -> Option<Credential> {
    // Multipart boundaries are case-sensitive, so keep the raw header around
    let raw_content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let content_type = raw_content_type.to_ascii_lowercase();

    if is_json(&content_type) {
        if let Some(value) = json_field(body, &locations.field_name) {
            return Some(Credential {
                value,
                source: CredentialSource::JsonBody,
            });
        }
    }

    let form_value = if content_type.starts_with("application/x-www-form-urlencoded") {
        form_field(body, &locations.field_name)
    } else if content_type.starts_with("multipart/form-data") {
        multipart_field(raw_content_type, body.clone(), &locations.field_name).await
    } else {
        None
    };
    if let Some(value) = form_value {
        return Some(Credential {
            value,
            source: CredentialSource::FormField,
        });
    }

    headers
        .get(locations.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| Credential {
            value: v.to_string(),
            source: CredentialSource::Header,
        })
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn json_field(body: &[u8], field: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    // Non-object or unparsable bodies simply carry no token
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn form_field(body: &[u8], field: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, value)| key == field && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

/// First non-empty text part named `field`; file parts are skipped
async fn multipart_field(content_type: &str, body: Bytes, field: &str) -> Option<String> {
    let boundary = multer::parse_boundary(content_type).ok()?;
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Ok(Some(part)) = multipart.next_field().await {
        let is_token_field = part.name() == Some(field) && part.file_name().is_none();
        if !is_token_field {
            continue;
        }
        if let Ok(text) = part.text().await {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: Option<&str>, token_header: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        if let Some(t) = token_header {
            headers.insert("x-csrf-token", HeaderValue::from_str(t).unwrap());
        }
        headers
    }

    async fn extract(h: &HeaderMap, body: &str) -> Option<Credential> {
        extract_credential(h, &Bytes::from(body.to_string()), &TokenLocations::default()).await
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str(&format!("--{}\r\n", boundary));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", boundary));
        body
    }

    #[tokio::test]
    async fn test_json_body_wins_over_header() {
        let h = headers(Some("application/json"), Some("from-header"));
        let found = extract(&h, r#"{"csrf_token":"from-body"}"#).await.unwrap();
        assert_eq!(found.value, "from-body");
        assert_eq!(found.source, CredentialSource::JsonBody);
    }

    #[tokio::test]
    async fn test_form_field_wins_over_header() {
        let h = headers(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            Some("from-header"),
        );
        let found = extract(&h, "name=x&csrf_token=from%2Dform").await.unwrap();
        assert_eq!(found.value, "from-form");
        assert_eq!(found.source, CredentialSource::FormField);
    }

    #[tokio::test]
    async fn test_empty_body_value_falls_through() {
        let h = headers(Some("application/json"), Some("from-header"));
        let found = extract(&h, r#"{"csrf_token":"  "}"#).await.unwrap();
        assert_eq!(found.value, "from-header");
        assert_eq!(found.source, CredentialSource::Header);
    }

    #[tokio::test]
    async fn test_non_string_or_invalid_json_falls_through() {
        let h = headers(Some("application/json"), Some("from-header"));
        for body in [r#"{"csrf_token":42}"#, "not json", "[1,2]"] {
            let found = extract(&h, body).await.unwrap();
            assert_eq!(found.value, "from-header", "{}", body);
        }
    }

    #[tokio::test]
    async fn test_body_ignored_without_matching_content_type() {
        let h = headers(Some("text/plain"), None);
        assert!(extract(&h, r#"{"csrf_token":"from-body"}"#).await.is_none());

        let h = headers(None, None);
        assert!(extract(&h, "csrf_token=from-form").await.is_none());
    }

    #[tokio::test]
    async fn test_vendor_json_content_type() {
        let h = headers(Some("application/vnd.api+json"), None);
        assert_eq!(extract(&h, r#"{"csrf_token":"t"}"#).await.unwrap().value, "t");
    }

    #[tokio::test]
    async fn test_header_only() {
        let h = headers(None, Some("from-header"));
        let found = extract(&h, "").await.unwrap();
        assert_eq!(found.source, CredentialSource::Header);
    }

    #[tokio::test]
    async fn test_nothing_anywhere() {
        let h = headers(Some("application/json"), Some(""));
        assert!(extract(&h, "{}").await.is_none());
    }

    #[tokio::test]
    async fn test_custom_locations() {
        let locations = TokenLocations {
            field_name: "_token".to_string(),
            header_name: "X-XSRF".to_string(),
        };
        let mut h = headers(Some("application/json"), None);
        h.insert("x-xsrf", HeaderValue::from_static("hdr"));
        let body = Bytes::from_static(br#"{"csrf_token":"ignored"}"#);
        let found = extract_credential(&h, &body, &locations).await.unwrap();
        assert_eq!(found.value, "hdr");
    }

    #[tokio::test]
    async fn test_multipart_form_field() {
        let h = headers(
            Some("multipart/form-data; boundary=XyZ"),
            Some("from-header"),
        );
        let body = multipart_body(
            "XyZ",
            &[
                ("document", Some("notes.pdf"), "%PDF-1.4 csrf_token"),
                ("csrf_token", None, "TOKENVALUE"),
                ("title", None, "Notes"),
            ],
        );
        let found = extract(&h, &body).await.unwrap();
        assert_eq!(found.value, "TOKENVALUE");
        assert_eq!(found.source, CredentialSource::FormField);
    }

    #[tokio::test]
    async fn test_multipart_boundary_case_preserved() {
        let h = headers(Some("multipart/form-data; boundary=AbCdEf"), None);
        let body = multipart_body("AbCdEf", &[("csrf_token", None, "t")]);
        assert_eq!(extract(&h, &body).await.unwrap().value, "t");
    }

    #[tokio::test]
    async fn test_multipart_without_token_falls_through() {
        let h = headers(
            Some("multipart/form-data; boundary=XyZ"),
            Some("from-header"),
        );
        let body = multipart_body(
            "XyZ",
            &[
                ("csrf_token", Some("csrf_token.txt"), "file-not-field"),
                ("csrf_token", None, "   "),
            ],
        );
        let found = extract(&h, &body).await.unwrap();
        assert_eq!(found.source, CredentialSource::Header);

        // Garbage or missing boundary carries no token
        let h = headers(Some("multipart/form-data"), None);
        assert!(extract(&h, &body).await.is_none());
        let h = headers(Some("multipart/form-data; boundary=XyZ"), None);
        assert!(extract(&h, "not multipart at all").await.is_none());
    }
}
