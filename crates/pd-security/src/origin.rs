//! Security origins and the access checks derived from them.

use crate::scheme_registry::SchemeRegistry;
use core::fmt;
use url::Url;

/// Scheme/host/port tuple, or an opaque origin.
///
/// Opaque (unique) origins are only ever same-origin with themselves, which
/// is checked by identity in [`SecurityOrigin::can_access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityOrigin {
    scheme: String,
    host: String,
    port: Option<u16>,
    unique: bool,
    local: bool,
}

impl SecurityOrigin {
    pub fn create(url: &Url, registry: &SchemeRegistry) -> Self {
        let scheme = url.scheme().to_ascii_lowercase();
        if registry.should_treat_url_scheme_as_no_access(&scheme)
            || matches!(scheme.as_str(), "about" | "javascript")
        {
            return Self::create_unique();
        }

        if registry.should_treat_url_scheme_as_local(&scheme) {
            return Self {
                scheme,
                host: String::new(),
                port: None,
                unique: false,
                local: true,
            };
        }

        match url.origin() {
            url::Origin::Tuple(scheme, host, port) => Self {
                scheme,
                host: host.to_string().to_ascii_lowercase(),
                port: Some(port),
                unique: false,
                local: false,
            },
            url::Origin::Opaque(_) => Self::create_unique(),
        }
    }

    pub fn create_unique() -> Self {
        Self {
            scheme: String::new(),
            host: String::new(),
            port: None,
            unique: true,
            local: false,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn is_same_scheme_host_port(&self, other: &SecurityOrigin) -> bool {
        !self.unique
            && !other.unique
            && self.scheme == other.scheme
            && self.host == other.host
            && self.port == other.port
    }

    /// Whether script in `self` may touch objects from `other`.
    pub fn can_access(&self, other: &SecurityOrigin) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.is_same_scheme_host_port(other)
    }

    /// Whether `url` may be read by content of this origin.
    pub fn can_request(&self, url: &Url, registry: &SchemeRegistry) -> bool {
        if self.unique {
            return false;
        }
        self.is_same_scheme_host_port(&SecurityOrigin::create(url, registry))
    }

    /// Whether content of this origin may display (embed or navigate to) `url`.
    pub fn can_display(&self, url: &Url, registry: &SchemeRegistry) -> bool {
        let scheme = url.scheme();
        if registry.can_display_only_if_can_request(scheme) {
            return self.can_request(url, registry);
        }

        if registry.should_treat_url_scheme_as_display_isolated(scheme) {
            return self.scheme.eq_ignore_ascii_case(scheme);
        }

        if registry.should_treat_url_scheme_as_local(scheme) {
            return self.local;
        }

        true
    }
}

impl fmt::Display for SecurityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            return f.write_str("null");
        }
        if self.local {
            return write!(f, "{}://", self.scheme);
        }
        let default_port = match self.scheme.as_str() {
            "http" | "ws" => Some(80),
            "https" | "wss" => Some(443),
            _ => None,
        };
        match self.port {
            Some(port) if Some(port) != default_port => {
                write!(f, "{}://{}:{port}", self.scheme, self.host)
            }
            _ => write!(f, "{}://{}", self.scheme, self.host),
        }
    }
}

/// Whether fetching `url` is secure in the sense of mixed-content checks.
pub fn is_secure_url(url: &Url, registry: &SchemeRegistry) -> bool {
    if registry.should_treat_url_scheme_as_secure(url.scheme()) {
        return true;
    }

    if url.scheme() == "blob" || url.scheme() == "filesystem" {
        if let Ok(inner) = Url::parse(url.path()) {
            return registry.should_treat_url_scheme_as_secure(inner.scheme());
        }
    }

    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

#[cfg(test)]
mod tests {
    use super::SecurityOrigin;
    use super::is_secure_url;
    use crate::scheme_registry::SchemeRegistry;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn tuple_origins_compare_by_scheme_host_port() {
        let registry = SchemeRegistry::new();
        let a = SecurityOrigin::create(&url("https://example.com/a"), &registry);
        let b = SecurityOrigin::create(&url("https://EXAMPLE.com:443/b"), &registry);
        let c = SecurityOrigin::create(&url("http://example.com/"), &registry);

        assert!(a.can_access(&b));
        assert!(!a.can_access(&c));
        assert_eq!(a.to_string(), "https://example.com");
    }

    #[test]
    fn unique_origins_only_access_themselves() {
        let unique = SecurityOrigin::create_unique();
        let copy = unique.clone();
        assert!(unique.can_access(&unique));
        assert!(!unique.can_access(&copy));
        assert_eq!(unique.to_string(), "null");
    }

    #[test]
    fn data_urls_get_unique_origins() {
        let registry = SchemeRegistry::new();
        let origin = SecurityOrigin::create(&url("data:text/html,hi"), &registry);
        assert!(origin.is_unique());
    }

    #[test]
    fn local_resources_need_local_origin() {
        let registry = SchemeRegistry::new();
        let web = SecurityOrigin::create(&url("https://example.com/"), &registry);
        let file = SecurityOrigin::create(&url("file:///tmp/a.html"), &registry);
        assert!(file.is_local());
        assert!(!web.is_local());

        assert!(!web.can_display(&url("file:///etc/passwd"), &registry));
        assert!(file.can_display(&url("file:///tmp/b.html"), &registry));
        assert!(web.can_display(&url("https://other.example/"), &registry));
    }

    #[test]
    fn secure_url_classification() {
        let registry = SchemeRegistry::new();
        assert!(is_secure_url(&url("https://example.com/"), &registry));
        assert!(is_secure_url(&url("http://localhost:8080/"), &registry));
        assert!(!is_secure_url(&url("http://example.com/"), &registry));
    }
}
