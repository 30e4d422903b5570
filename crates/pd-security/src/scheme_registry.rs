//! Scheme classification consulted by origin and loader checks.

use std::collections::BTreeSet;

/// Per-context registry of scheme properties.
///
/// Owned by the loading context rather than a process-wide table so that
/// embedders can register schemes per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRegistry {
    local: BTreeSet<String>,
    empty_document: BTreeSet<String>,
    display_isolated: BTreeSet<String>,
    secure: BTreeSet<String>,
    cors_enabled: BTreeSet<String>,
    no_access: BTreeSet<String>,
    display_only_if_can_request: BTreeSet<String>,
    bypass_content_security_policy: BTreeSet<String>,
}

fn set_of(schemes: &[&str]) -> BTreeSet<String> {
    schemes.iter().map(|scheme| (*scheme).to_owned()).collect()
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self {
            local: set_of(&["file"]),
            empty_document: set_of(&["about"]),
            display_isolated: BTreeSet::new(),
            secure: set_of(&["https", "about", "data", "wss"]),
            cors_enabled: set_of(&["http", "https", "data"]),
            no_access: set_of(&["data"]),
            display_only_if_can_request: set_of(&["blob", "filesystem"]),
            bypass_content_security_policy: BTreeSet::new(),
        }
    }
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_url_scheme_as_local(&mut self, scheme: &str) {
        self.local.insert(scheme.to_ascii_lowercase());
    }

    pub fn register_url_scheme_as_empty_document(&mut self, scheme: &str) {
        self.empty_document.insert(scheme.to_ascii_lowercase());
    }

    pub fn register_url_scheme_as_display_isolated(&mut self, scheme: &str) {
        self.display_isolated.insert(scheme.to_ascii_lowercase());
    }

    pub fn register_url_scheme_as_secure(&mut self, scheme: &str) {
        self.secure.insert(scheme.to_ascii_lowercase());
    }

    pub fn register_url_scheme_as_cors_enabled(&mut self, scheme: &str) {
        self.cors_enabled.insert(scheme.to_ascii_lowercase());
    }

    pub fn register_url_scheme_as_bypassing_content_security_policy(&mut self, scheme: &str) {
        self.bypass_content_security_policy
            .insert(scheme.to_ascii_lowercase());
    }

    pub fn should_treat_url_scheme_as_local(&self, scheme: &str) -> bool {
        contains(&self.local, scheme)
    }

    pub fn should_load_url_scheme_as_empty_document(&self, scheme: &str) -> bool {
        contains(&self.empty_document, scheme)
    }

    pub fn should_treat_url_scheme_as_display_isolated(&self, scheme: &str) -> bool {
        contains(&self.display_isolated, scheme)
    }

    pub fn should_treat_url_scheme_as_secure(&self, scheme: &str) -> bool {
        contains(&self.secure, scheme)
    }

    pub fn should_treat_url_scheme_as_cors_enabled(&self, scheme: &str) -> bool {
        contains(&self.cors_enabled, scheme)
    }

    pub fn should_treat_url_scheme_as_no_access(&self, scheme: &str) -> bool {
        contains(&self.no_access, scheme)
    }

    pub fn can_display_only_if_can_request(&self, scheme: &str) -> bool {
        contains(&self.display_only_if_can_request, scheme)
    }

    pub fn scheme_should_bypass_content_security_policy(&self, scheme: &str) -> bool {
        contains(&self.bypass_content_security_policy, scheme)
    }
}

fn contains(set: &BTreeSet<String>, scheme: &str) -> bool {
    if scheme.bytes().any(|byte| byte.is_ascii_uppercase()) {
        return set.contains(&scheme.to_ascii_lowercase());
    }
    set.contains(scheme)
}

#[cfg(test)]
mod tests {
    use super::SchemeRegistry;

    #[test]
    fn defaults_cover_builtin_schemes() {
        let registry = SchemeRegistry::new();
        assert!(registry.should_treat_url_scheme_as_local("file"));
        assert!(registry.should_load_url_scheme_as_empty_document("ABOUT"));
        assert!(registry.should_treat_url_scheme_as_secure("https"));
        assert!(!registry.should_treat_url_scheme_as_secure("http"));
        assert!(registry.can_display_only_if_can_request("blob"));
    }

    #[test]
    fn registration_is_case_insensitive() {
        let mut registry = SchemeRegistry::new();
        registry.register_url_scheme_as_local("Chrome-Extension");
        assert!(registry.should_treat_url_scheme_as_local("chrome-extension"));
    }

    #[test]
    fn embedder_schemes_gain_each_registered_trait() {
        let mut registry = SchemeRegistry::new();
        registry.register_url_scheme_as_empty_document("Blank");
        registry.register_url_scheme_as_display_isolated("isolated");
        registry.register_url_scheme_as_secure("app");
        registry.register_url_scheme_as_cors_enabled("app");
        registry.register_url_scheme_as_bypassing_content_security_policy("devtools");

        assert!(registry.should_load_url_scheme_as_empty_document("blank"));
        assert!(registry.should_treat_url_scheme_as_display_isolated("isolated"));
        assert!(registry.should_treat_url_scheme_as_secure("app"));
        assert!(registry.should_treat_url_scheme_as_cors_enabled("APP"));
        assert!(registry.scheme_should_bypass_content_security_policy("devtools"));
        assert!(!registry.scheme_should_bypass_content_security_policy("app"));
    }
}
