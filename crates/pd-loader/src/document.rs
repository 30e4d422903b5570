//! The committed document as far as loading is concerned.
//!
//! Parsing and the DOM live elsewhere; this keeps the URL, origin, policies
//! and lifecycle flags the loader reads and writes.

use encoding_rs::Encoding;
use pd_core::BrowserResult;
use pd_net::ClientHintsPreferences;
use pd_net::mime_registry::is_html_mime_type;
use pd_net::mime_registry::is_supported_image_mime_type;
use pd_net::mime_registry::is_supported_media_mime_type;
use pd_net::url::complete_url;
use pd_security::ContentSecurityPolicy;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use std::collections::BTreeSet;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Xhtml,
    Xml,
    Svg,
    Text,
    Image,
    Media,
    Plugin,
}

impl DocumentKind {
    pub fn for_mime_type(mime_type: &str, plugin_supported: bool) -> Self {
        match mime_type {
            "application/xhtml+xml" => Self::Xhtml,
            "image/svg+xml" => Self::Svg,
            "text/xml" | "application/xml" | "text/xsl" => Self::Xml,
            _ if is_html_mime_type(mime_type) => Self::Html,
            _ if is_supported_image_mime_type(mime_type) => Self::Image,
            _ if is_supported_media_mime_type(mime_type) => Self::Media,
            _ if plugin_supported => Self::Plugin,
            _ if mime_type.starts_with("text/") => Self::Text,
            _ => Self::Html,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub url: Url,
    pub base_url_override: Option<Url>,
    pub kind: DocumentKind,
    pub mime_type: String,
    pub encoding: Option<&'static Encoding>,
    pub security_origin: SecurityOrigin,
    pub content_security_policy: ContentSecurityPolicy,
    pub sandbox_flags: SandboxFlags,
    pub ready_state: DocumentReadyState,
    pub parsing: bool,
    pub load_event_finished: bool,
    pub has_app_cache_manifest: bool,
    pub content_language: Option<String>,
    pub dns_prefetch_enabled: bool,
    dns_prefetch_explicitly_disabled: bool,
    pub client_hints: ClientHintsPreferences,
    pub upgrade_insecure_requests: bool,
    pub block_all_mixed_content: bool,
    pub insecure_navigations_to_upgrade: BTreeSet<String>,
    pub referrer: Option<Url>,
    pub state_object: Option<String>,
    /// Decoded markup written so far.
    pub text: String,
}

impl Document {
    pub fn new(url: Url, mime_type: &str, security_origin: SecurityOrigin) -> Self {
        let dns_prefetch_enabled = matches!(security_origin.protocol(), "http");
        Self {
            kind: DocumentKind::for_mime_type(mime_type, false),
            url,
            base_url_override: None,
            mime_type: mime_type.to_owned(),
            encoding: None,
            security_origin,
            content_security_policy: ContentSecurityPolicy::new(),
            sandbox_flags: SandboxFlags::empty(),
            ready_state: DocumentReadyState::Loading,
            parsing: true,
            load_event_finished: false,
            has_app_cache_manifest: false,
            content_language: None,
            dns_prefetch_enabled,
            dns_prefetch_explicitly_disabled: false,
            client_hints: ClientHintsPreferences::default(),
            upgrade_insecure_requests: false,
            block_all_mixed_content: false,
            insecure_navigations_to_upgrade: BTreeSet::new(),
            referrer: None,
            state_object: None,
            text: String::new(),
        }
    }

    /// Applies sandbox flags; a sandboxed origin becomes unique.
    pub fn enforce_sandbox_flags(&mut self, flags: SandboxFlags) {
        self.sandbox_flags |= flags;
        if self.sandbox_flags.contains(SandboxFlags::ORIGIN) && !self.security_origin.is_unique() {
            self.security_origin = SecurityOrigin::create_unique();
        }
    }

    pub fn is_sandboxed(&self, flags: SandboxFlags) -> bool {
        self.sandbox_flags.intersects(flags)
    }

    pub fn apply_content_security_policy(&mut self, policy: ContentSecurityPolicy) {
        self.upgrade_insecure_requests |= policy.upgrade_insecure_requests();
        self.block_all_mixed_content |= policy.block_all_mixed_content();
        let sandbox = policy.sandbox_flags();
        self.content_security_policy = policy;
        if !sandbox.is_empty() {
            self.enforce_sandbox_flags(sandbox);
        }
        if self.upgrade_insecure_requests && let Some(host) = self.url.host_str() {
            self.insecure_navigations_to_upgrade.insert(host.to_owned());
        }
    }

    /// `X-DNS-Prefetch-Control`: only `on` keeps prefetching, and an explicit
    /// `off` is sticky.
    pub fn parse_dns_prefetch_control_header(&mut self, value: &str) {
        if value.trim().eq_ignore_ascii_case("on") && !self.dns_prefetch_explicitly_disabled {
            self.dns_prefetch_enabled = true;
            return;
        }
        self.dns_prefetch_enabled = false;
        self.dns_prefetch_explicitly_disabled = true;
    }

    pub fn set_content_language(&mut self, value: &str) {
        let first = value.split(',').next().unwrap_or_default().trim();
        self.content_language = (!first.is_empty()).then(|| first.to_owned());
    }

    pub fn base_url(&self) -> &Url {
        self.base_url_override.as_ref().unwrap_or(&self.url)
    }

    pub fn complete_url(&self, input: &str) -> BrowserResult<Url> {
        complete_url(self.base_url(), input)
    }

    pub fn set_ready_state(&mut self, state: DocumentReadyState) {
        self.ready_state = state;
    }

    pub fn finish_parsing(&mut self) {
        self.parsing = false;
        if self.ready_state == DocumentReadyState::Loading {
            self.ready_state = DocumentReadyState::Interactive;
        }
    }

    pub fn stop_parsing(&mut self) {
        self.parsing = false;
    }

    pub fn is_media_document(&self) -> bool {
        self.kind == DocumentKind::Media
    }

    /// Looks for a `manifest` attribute on the root `<html>` start tag in
    /// the text decoded so far.
    pub fn manifest_declaration(&self) -> ManifestDeclaration {
        if self.kind != DocumentKind::Html {
            return ManifestDeclaration::Absent;
        }
        html_start_tag_manifest(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestDeclaration {
    /// The root start tag has not been fully received yet.
    Pending,
    Absent,
    Present(String),
}

fn html_start_tag_manifest(text: &str) -> ManifestDeclaration {
    let mut rest = text.trim_start();
    loop {
        let skipped = if rest.starts_with("<!--") {
            rest.find("-->").map(|end| end + 3)
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            rest.find('>').map(|end| end + 1)
        } else {
            break;
        };
        let Some(skipped) = skipped else {
            return ManifestDeclaration::Pending;
        };
        rest = rest[skipped..].trim_start();
    }

    if rest.len() < 6 && "<html".starts_with(&rest.to_ascii_lowercase()) {
        return ManifestDeclaration::Pending;
    }
    let is_html_tag = rest
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<html"))
        && rest[5..]
            .chars()
            .next()
            .is_some_and(|next| next.is_ascii_whitespace() || next == '>' || next == '/');
    if !is_html_tag {
        return ManifestDeclaration::Absent;
    }
    let Some(end) = rest.find('>') else {
        return ManifestDeclaration::Pending;
    };
    match attribute_value(&rest[5..end], "manifest") {
        Some(value) if !value.trim().is_empty() => {
            ManifestDeclaration::Present(value.trim().to_owned())
        }
        _ => ManifestDeclaration::Absent,
    }
}

fn attribute_value<'a>(attributes: &'a str, wanted: &str) -> Option<&'a str> {
    let mut rest = attributes;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();
        let mut value = "";
        if let Some(after_equals) = rest.strip_prefix('=') {
            let after_equals = after_equals.trim_start();
            let (parsed, remainder) = match after_equals.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_equals[1..];
                    let close = body.find(quote).unwrap_or(body.len());
                    (&body[..close], body.get(close + 1..).unwrap_or_default())
                }
                _ => {
                    let close = after_equals
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_equals.len());
                    (&after_equals[..close], &after_equals[close..])
                }
            };
            value = parsed;
            rest = remainder;
        }
        if name.eq_ignore_ascii_case(wanted) {
            return Some(value);
        }
    }
}
