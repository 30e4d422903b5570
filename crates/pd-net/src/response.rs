//! Response metadata delivered to the loader before any body bytes.

use crate::http::HeaderMap;
use crate::http::HttpStatusCode;
use mime::Mime;
use url::Url;

/// Metadata for a received response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    pub url: Url,
    /// `None` for responses that did not come over HTTP (about:, data:, archives).
    pub status: Option<HttpStatusCode>,
    /// Lower-cased MIME essence, e.g. `text/html`.
    pub mime_type: String,
    pub text_encoding: Option<String>,
    pub headers: HeaderMap,
    pub expected_content_length: Option<u64>,
    /// Non-zero when the response was served from an application cache.
    pub app_cache_id: u64,
    pub app_cache_manifest_url: Option<Url>,
}

impl ResourceResponse {
    /// Builds a response that was not produced by the network.
    pub fn synthetic(
        url: Url,
        mime_type: &str,
        expected_content_length: Option<u64>,
        text_encoding: Option<&str>,
    ) -> Self {
        Self {
            url,
            status: None,
            mime_type: mime_type.to_ascii_lowercase(),
            text_encoding: text_encoding.map(str::to_owned),
            headers: HeaderMap::new(),
            expected_content_length,
            app_cache_id: 0,
            app_cache_manifest_url: None,
        }
    }

    /// Builds an HTTP response, deriving MIME type, charset and length from headers.
    pub fn http(url: Url, status: HttpStatusCode, headers: HeaderMap) -> Self {
        let (mime_type, text_encoding) = headers
            .get("Content-Type")
            .map(parse_content_type)
            .unwrap_or_default();
        let expected_content_length = headers
            .get("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok());

        Self {
            url,
            status: Some(status),
            mime_type,
            text_encoding,
            headers,
            expected_content_length,
            app_cache_id: 0,
            app_cache_manifest_url: None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.status.is_some()
    }

    /// Status as a bare number; `0` for non-HTTP responses.
    pub fn http_status_code(&self) -> u16 {
        self.status.map(HttpStatusCode::as_u16).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

/// Splits a `Content-Type` value into lower-cased essence and optional charset.
pub fn parse_content_type(value: &str) -> (String, Option<String>) {
    match value.trim().parse::<Mime>() {
        Ok(parsed) => {
            let charset = parsed
                .get_param(mime::CHARSET)
                .map(|charset| charset.as_str().trim_matches('"').to_owned());
            (parsed.essence_str().to_ascii_lowercase(), charset)
        }
        Err(_) => {
            let essence = value.split(';').next().unwrap_or_default().trim();
            (essence.to_ascii_lowercase(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceResponse;
    use super::parse_content_type;
    use crate::http::HeaderMap;
    use crate::http::HttpStatusCode;
    use crate::url::parse_url;

    #[test]
    fn content_type_splits_essence_and_charset() {
        let (essence, charset) = parse_content_type("Text/HTML; charset=Shift_JIS");
        assert_eq!(essence, "text/html");
        assert!(charset.is_some_and(|value| value.eq_ignore_ascii_case("shift_jis")));

        let (essence, charset) = parse_content_type("garbage ;;");
        assert_eq!(essence, "garbage");
        assert!(charset.is_none());
    }

    #[test]
    fn http_response_reads_length_and_type_from_headers() {
        let url = match parse_url("https://example.com/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let mut headers = HeaderMap::new();
        assert!(headers.set("Content-Type", "text/html; charset=utf-8").is_ok());
        assert!(headers.set("Content-Length", "42").is_ok());

        let response = ResourceResponse::http(url, HttpStatusCode::OK, headers);
        assert!(response.is_http());
        assert_eq!(response.http_status_code(), 200);
        assert_eq!(response.mime_type, "text/html");
        assert!(
            response
                .text_encoding
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case("utf-8"))
        );
        assert_eq!(response.expected_content_length, Some(42));
    }
}
