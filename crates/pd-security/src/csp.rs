//! Content Security Policy: header parsing, source matching and the
//! per-directive checks the loader consults.

use crate::sandbox::SandboxFlags;
use crate::sandbox::parse_sandbox_policy;
use log::warn;
use std::cell::RefCell;
use url::Url;

/// Whether a policy blocks or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDisposition {
    Enforce,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStatus {
    DidRedirect,
    DidNotRedirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingStatus {
    SendReport,
    SuppressReport,
}

/// Directives the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    DefaultSrc,
    ScriptSrc,
    StyleSrc,
    ImgSrc,
    FontSrc,
    MediaSrc,
    ObjectSrc,
    ConnectSrc,
    ManifestSrc,
    ChildSrc,
    FrameSrc,
    FormAction,
    FrameAncestors,
    BaseUri,
}

impl Directive {
    pub fn name(self) -> &'static str {
        match self {
            Self::DefaultSrc => "default-src",
            Self::ScriptSrc => "script-src",
            Self::StyleSrc => "style-src",
            Self::ImgSrc => "img-src",
            Self::FontSrc => "font-src",
            Self::MediaSrc => "media-src",
            Self::ObjectSrc => "object-src",
            Self::ConnectSrc => "connect-src",
            Self::ManifestSrc => "manifest-src",
            Self::ChildSrc => "child-src",
            Self::FrameSrc => "frame-src",
            Self::FormAction => "form-action",
            Self::FrameAncestors => "frame-ancestors",
            Self::BaseUri => "base-uri",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let directive = match name {
            "default-src" => Self::DefaultSrc,
            "script-src" => Self::ScriptSrc,
            "style-src" => Self::StyleSrc,
            "img-src" => Self::ImgSrc,
            "font-src" => Self::FontSrc,
            "media-src" => Self::MediaSrc,
            "object-src" => Self::ObjectSrc,
            "connect-src" => Self::ConnectSrc,
            "manifest-src" => Self::ManifestSrc,
            "child-src" => Self::ChildSrc,
            "frame-src" => Self::FrameSrc,
            "form-action" => Self::FormAction,
            "frame-ancestors" => Self::FrameAncestors,
            "base-uri" => Self::BaseUri,
            _ => return None,
        };
        Some(directive)
    }

    /// Directives consulted, most specific first.
    fn lookup_chain(self) -> &'static [Directive] {
        match self {
            Self::FrameSrc => &[Self::FrameSrc, Self::ChildSrc, Self::DefaultSrc],
            Self::FormAction => &[Self::FormAction],
            Self::FrameAncestors => &[Self::FrameAncestors],
            Self::BaseUri => &[Self::BaseUri],
            Self::DefaultSrc => &[Self::DefaultSrc],
            Self::ScriptSrc => &[Self::ScriptSrc, Self::DefaultSrc],
            Self::StyleSrc => &[Self::StyleSrc, Self::DefaultSrc],
            Self::ImgSrc => &[Self::ImgSrc, Self::DefaultSrc],
            Self::FontSrc => &[Self::FontSrc, Self::DefaultSrc],
            Self::MediaSrc => &[Self::MediaSrc, Self::DefaultSrc],
            Self::ObjectSrc => &[Self::ObjectSrc, Self::DefaultSrc],
            Self::ConnectSrc => &[Self::ConnectSrc, Self::DefaultSrc],
            Self::ManifestSrc => &[Self::ManifestSrc, Self::DefaultSrc],
            Self::ChildSrc => &[Self::ChildSrc, Self::DefaultSrc],
        }
    }
}

/// A blocked or reported load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspViolation {
    pub directive: &'static str,
    pub blocked_url: String,
    pub disposition: PolicyDisposition,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelfSource {
    scheme: String,
    host: String,
    port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceExpression {
    scheme: String,
    host: String,
    host_wildcard: bool,
    port: Option<u16>,
    port_wildcard: bool,
    path: String,
}

impl SourceExpression {
    fn is_scheme_only(&self) -> bool {
        self.host.is_empty()
    }

    fn matches(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        self_source: Option<&SelfSource>,
    ) -> bool {
        if !self.scheme_matches(url, self_source) {
            return false;
        }
        if self.is_scheme_only() {
            return true;
        }
        self.host_matches(url) && self.port_matches(url) && self.path_matches(url, redirect)
    }

    fn scheme_matches(&self, url: &Url, self_source: Option<&SelfSource>) -> bool {
        if self.scheme.is_empty() {
            return protocol_matches_self(url, self_source);
        }
        if self.scheme == "http" {
            return matches!(url.scheme(), "http" | "https");
        }
        url.scheme().eq_ignore_ascii_case(&self.scheme)
    }

    fn host_matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.host_wildcard {
            return host.eq_ignore_ascii_case(&self.host);
        }
        host.to_ascii_lowercase()
            .ends_with(&format!(".{}", self.host))
    }

    fn port_matches(&self, url: &Url) -> bool {
        if self.port_wildcard {
            return true;
        }

        let url_default = default_port(url.scheme());
        let url_port = url.port().or(url_default);
        match self.port {
            None => url.port().is_none() || url_port == url_default,
            Some(port) => {
                url_port == Some(port)
                    || (port == 80 && url.scheme() == "https" && url_port == Some(443))
            }
        }
    }

    fn path_matches(&self, url: &Url, redirect: RedirectStatus) -> bool {
        if self.path.is_empty() || redirect == RedirectStatus::DidRedirect {
            return true;
        }
        let path = url.path();
        if self.path.ends_with('/') {
            return path.starts_with(&self.path);
        }
        path == self.path
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn protocol_matches_self(url: &Url, self_source: Option<&SelfSource>) -> bool {
    let Some(self_source) = self_source else {
        return false;
    };
    if self_source.scheme == "http" {
        return matches!(url.scheme(), "http" | "https");
    }
    url.scheme().eq_ignore_ascii_case(&self_source.scheme)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SourceList {
    sources: Vec<SourceExpression>,
    allow_self: bool,
    allow_star: bool,
    allow_inline: bool,
    allow_eval: bool,
}

impl SourceList {
    fn parse(value: &str) -> Self {
        let mut list = Self::default();
        for token in value.split_ascii_whitespace() {
            let lower = token.to_ascii_lowercase();
            match lower.as_str() {
                "'none'" => return Self::default(),
                "'self'" => list.allow_self = true,
                "*" => list.allow_star = true,
                "'unsafe-inline'" => list.allow_inline = true,
                "'unsafe-eval'" => list.allow_eval = true,
                _ if lower.starts_with('\'') => {}
                _ => {
                    if let Some(source) = parse_source_expression(&lower) {
                        list.sources.push(source);
                    }
                }
            }
        }
        list
    }

    fn matches(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        self_source: Option<&SelfSource>,
    ) -> bool {
        if self.allow_star {
            if matches!(url.scheme(), "http" | "https" | "ftp" | "ws" | "wss")
                || protocol_matches_self(url, self_source)
            {
                return true;
            }
        }

        if self.allow_self {
            if let Some(self_source) = self_source {
                let expression = SourceExpression {
                    scheme: self_source.scheme.clone(),
                    host: self_source.host.clone(),
                    host_wildcard: false,
                    port: self_source.port,
                    port_wildcard: false,
                    path: String::new(),
                };
                if !expression.host.is_empty()
                    && expression.matches(url, redirect, Some(self_source))
                {
                    return true;
                }
            }
        }

        self.sources
            .iter()
            .any(|source| source.matches(url, redirect, self_source))
    }
}

fn parse_source_expression(token: &str) -> Option<SourceExpression> {
    let (scheme, rest) = match token.find("://") {
        Some(index) => (&token[..index], &token[index + 3..]),
        None => match token.strip_suffix(':') {
            Some(scheme) if !scheme.is_empty() && scheme.bytes().all(is_scheme_char) => {
                return Some(SourceExpression {
                    scheme: scheme.to_owned(),
                    host: String::new(),
                    host_wildcard: false,
                    port: None,
                    port_wildcard: false,
                    path: String::new(),
                });
            }
            _ => ("", token),
        },
    };

    if !scheme.bytes().all(is_scheme_char) {
        return None;
    }

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, ""),
    };

    let (host_part, port_part) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };

    let (host, host_wildcard) = match host_part.strip_prefix("*.") {
        Some(host) => (host, true),
        None => (host_part, false),
    };
    if host.is_empty() || host.contains('*') {
        return None;
    }

    let (port, port_wildcard) = match port_part {
        None => (None, false),
        Some("*") => (None, true),
        Some(port) => (Some(port.parse::<u16>().ok()?), false),
    };

    Some(SourceExpression {
        scheme: scheme.to_owned(),
        host: host.to_owned(),
        host_wildcard,
        port,
        port_wildcard,
        path: path.to_owned(),
    })
}

fn is_scheme_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'-' | b'.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DirectiveList {
    header: String,
    disposition: PolicyDisposition,
    directives: Vec<(Directive, SourceList)>,
    sandbox: Option<SandboxFlags>,
    upgrade_insecure_requests: bool,
    block_all_mixed_content: bool,
    report_endpoints: Vec<String>,
}

impl DirectiveList {
    fn parse(header: &str, disposition: PolicyDisposition) -> Self {
        let mut list = Self {
            header: header.to_owned(),
            disposition,
            directives: Vec::new(),
            sandbox: None,
            upgrade_insecure_requests: false,
            block_all_mixed_content: false,
            report_endpoints: Vec::new(),
        };

        for raw in header.split(';') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (name, value) = match raw.find(|ch: char| ch.is_ascii_whitespace()) {
                Some(index) => (&raw[..index], raw[index..].trim()),
                None => (raw, ""),
            };
            let name = name.to_ascii_lowercase();

            match name.as_str() {
                "sandbox" => {
                    if disposition == PolicyDisposition::Report {
                        warn!("the 'sandbox' directive is ignored in report-only policies");
                    } else if list.sandbox.is_none() {
                        list.sandbox = Some(parse_sandbox_policy(value).flags);
                    }
                }
                "upgrade-insecure-requests" => {
                    if disposition == PolicyDisposition::Enforce {
                        list.upgrade_insecure_requests = true;
                    }
                }
                "block-all-mixed-content" => list.block_all_mixed_content = true,
                "report-uri" => {
                    list.report_endpoints
                        .extend(value.split_ascii_whitespace().map(str::to_owned));
                }
                _ => match Directive::from_name(&name) {
                    Some(directive) => {
                        if list.directives.iter().any(|(existing, _)| *existing == directive) {
                            warn!("ignoring duplicate Content Security Policy directive '{name}'");
                            continue;
                        }
                        list.directives.push((directive, SourceList::parse(value)));
                    }
                    None => warn!("unrecognized Content Security Policy directive '{name}'"),
                },
            }
        }

        list
    }

    fn effective(&self, directive: Directive) -> Option<(Directive, &SourceList)> {
        directive.lookup_chain().iter().find_map(|candidate| {
            self.directives
                .iter()
                .find(|(name, _)| name == candidate)
                .map(|(name, list)| (*name, list))
        })
    }
}

/// The set of policies that apply to one document.
#[derive(Debug, Clone, Default)]
pub struct ContentSecurityPolicy {
    policies: Vec<DirectiveList>,
    self_source: Option<SelfSource>,
    violations: RefCell<Vec<CspViolation>>,
}

impl ContentSecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `'self'` to the origin of `url`.
    pub fn bind_to_url(&mut self, url: &Url) {
        self.self_source = match url.origin() {
            url::Origin::Tuple(scheme, host, port) => Some(SelfSource {
                scheme,
                host: host.to_string(),
                port: if Some(port) == default_port(url.scheme()) {
                    None
                } else {
                    Some(port)
                },
            }),
            url::Origin::Opaque(_) => Some(SelfSource {
                scheme: url.scheme().to_owned(),
                host: String::new(),
                port: None,
            }),
        };
    }

    /// Adds every comma-separated policy in one header value.
    pub fn did_receive_header(&mut self, value: &str, disposition: PolicyDisposition) {
        for policy in value.split(',') {
            let policy = policy.trim();
            if policy.is_empty() {
                continue;
            }
            self.policies.push(DirectiveList::parse(policy, disposition));
        }
    }

    pub fn is_active(&self) -> bool {
        !self.policies.is_empty()
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, PolicyDisposition)> {
        self.policies
            .iter()
            .map(|policy| (policy.header.as_str(), policy.disposition))
    }

    pub fn allow_script_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::ScriptSrc, url, redirect, reporting)
    }

    pub fn allow_style_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::StyleSrc, url, redirect, reporting)
    }

    pub fn allow_image_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::ImgSrc, url, redirect, reporting)
    }

    pub fn allow_font_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::FontSrc, url, redirect, reporting)
    }

    pub fn allow_media_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::MediaSrc, url, redirect, reporting)
    }

    pub fn allow_manifest_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::ManifestSrc, url, redirect, reporting)
    }

    /// `frame-src`, falling back to `child-src` then `default-src`.
    pub fn allow_child_frame_from_source(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::FrameSrc, url, redirect, reporting)
    }

    pub fn allow_form_action(
        &self,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        self.allow_from_source(Directive::FormAction, url, redirect, reporting)
    }

    /// Checks `frame-ancestors` against every ancestor document URL.
    ///
    /// Only enforced policies can block; report-only policies record violations.
    pub fn allow_ancestors(
        &self,
        url: &Url,
        ancestors: &[Url],
        reporting: ReportingStatus,
    ) -> bool {
        let mut allowed = true;
        for policy in &self.policies {
            let Some((_, list)) = policy.effective(Directive::FrameAncestors) else {
                continue;
            };
            let blocked = ancestors.iter().find(|ancestor| {
                !list.matches(ancestor, RedirectStatus::DidNotRedirect, self.self_source.as_ref())
            });
            if let Some(ancestor) = blocked {
                if reporting == ReportingStatus::SendReport {
                    self.report(
                        Directive::FrameAncestors,
                        url,
                        policy,
                        format!(
                            "Refused to display '{url}' in a frame because an ancestor violates the following Content Security Policy directive: \"frame-ancestors\". The ancestor '{ancestor}' is not allowed."
                        ),
                    );
                }
                if policy.disposition == PolicyDisposition::Enforce {
                    allowed = false;
                }
            }
        }
        allowed
    }

    /// Whether any enforced policy governs loads of `directive`'s type.
    pub fn governs(&self, directive: Directive) -> bool {
        self.policies.iter().any(|policy| {
            policy.disposition == PolicyDisposition::Enforce && policy.effective(directive).is_some()
        })
    }

    pub fn upgrade_insecure_requests(&self) -> bool {
        self.policies
            .iter()
            .any(|policy| policy.upgrade_insecure_requests)
    }

    pub fn block_all_mixed_content(&self) -> bool {
        self.policies.iter().any(|policy| {
            policy.disposition == PolicyDisposition::Enforce && policy.block_all_mixed_content
        })
    }

    /// Union of enforced `sandbox` directives.
    pub fn sandbox_flags(&self) -> SandboxFlags {
        self.policies
            .iter()
            .filter_map(|policy| policy.sandbox)
            .fold(SandboxFlags::empty(), |acc, flags| acc | flags)
    }

    pub fn report_endpoints(&self) -> impl Iterator<Item = &str> {
        self.policies
            .iter()
            .flat_map(|policy| policy.report_endpoints.iter().map(String::as_str))
    }

    pub fn take_violations(&self) -> Vec<CspViolation> {
        std::mem::take(&mut *self.violations.borrow_mut())
    }

    fn allow_from_source(
        &self,
        directive: Directive,
        url: &Url,
        redirect: RedirectStatus,
        reporting: ReportingStatus,
    ) -> bool {
        let mut allowed = true;
        for policy in &self.policies {
            let Some((effective, list)) = policy.effective(directive) else {
                continue;
            };
            if list.matches(url, redirect, self.self_source.as_ref()) {
                continue;
            }

            if reporting == ReportingStatus::SendReport {
                let verb = match policy.disposition {
                    PolicyDisposition::Enforce => "Refused to load",
                    PolicyDisposition::Report => "[Report Only] Refused to load",
                };
                self.report(
                    effective,
                    url,
                    policy,
                    format!(
                        "{verb} '{url}' because it violates the following Content Security Policy directive: \"{}\".",
                        effective.name()
                    ),
                );
            }
            if policy.disposition == PolicyDisposition::Enforce {
                allowed = false;
            }
        }
        allowed
    }

    fn report(&self, directive: Directive, url: &Url, policy: &DirectiveList, message: String) {
        warn!("{message}");
        self.violations.borrow_mut().push(CspViolation {
            directive: directive.name(),
            blocked_url: url.to_string(),
            disposition: policy.disposition,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::ContentSecurityPolicy;
    use super::Directive;
    use super::PolicyDisposition;
    use super::RedirectStatus;
    use super::ReportingStatus;
    use crate::sandbox::SandboxFlags;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn policy(header: &str, disposition: PolicyDisposition) -> ContentSecurityPolicy {
        let mut csp = ContentSecurityPolicy::new();
        csp.bind_to_url(&url("https://example.com/index.html"));
        csp.did_receive_header(header, disposition);
        csp
    }

    const NO_REDIRECT: RedirectStatus = RedirectStatus::DidNotRedirect;
    const REPORT: ReportingStatus = ReportingStatus::SendReport;

    #[test]
    fn empty_policy_allows_everything() {
        let csp = ContentSecurityPolicy::new();
        assert!(!csp.is_active());
        assert!(csp.allow_script_from_source(&url("https://evil.example/x.js"), NO_REDIRECT, REPORT));
    }

    #[test]
    fn self_and_host_sources_match() {
        let csp = policy(
            "script-src 'self' https://cdn.example.com/lib/ *.static.example",
            PolicyDisposition::Enforce,
        );
        assert!(csp.allow_script_from_source(&url("https://example.com/app.js"), NO_REDIRECT, REPORT));
        assert!(csp.allow_script_from_source(&url("https://cdn.example.com/lib/a.js"), NO_REDIRECT, REPORT));
        assert!(!csp.allow_script_from_source(&url("https://cdn.example.com/other/a.js"), NO_REDIRECT, REPORT));
        assert!(csp.allow_script_from_source(&url("https://a.static.example/x.js"), NO_REDIRECT, REPORT));
        assert!(!csp.allow_script_from_source(&url("https://static.example/x.js"), NO_REDIRECT, REPORT));
        assert_eq!(csp.take_violations().len(), 2);
    }

    #[test]
    fn paths_are_ignored_after_redirect() {
        let csp = policy("img-src https://cdn.example.com/img/", PolicyDisposition::Enforce);
        let target = url("https://cdn.example.com/elsewhere.png");
        assert!(!csp.allow_image_from_source(&target, NO_REDIRECT, REPORT));
        assert!(csp.allow_image_from_source(&target, RedirectStatus::DidRedirect, REPORT));
    }

    #[test]
    fn default_src_is_the_fallback() {
        let csp = policy("default-src 'none'; style-src *", PolicyDisposition::Enforce);
        assert!(csp.allow_style_from_source(&url("https://a.example/s.css"), NO_REDIRECT, REPORT));
        assert!(!csp.allow_font_from_source(&url("https://a.example/f.woff"), NO_REDIRECT, REPORT));
        assert!(csp.governs(Directive::FontSrc));
    }

    #[test]
    fn frame_src_falls_back_to_child_src() {
        let csp = policy("child-src https://frames.example", PolicyDisposition::Enforce);
        assert!(csp.allow_child_frame_from_source(&url("https://frames.example/"), NO_REDIRECT, REPORT));
        assert!(!csp.allow_child_frame_from_source(&url("https://other.example/"), NO_REDIRECT, REPORT));
    }

    #[test]
    fn report_only_policies_never_block() {
        let csp = policy("script-src 'none'", PolicyDisposition::Report);
        assert!(csp.allow_script_from_source(&url("https://a.example/x.js"), NO_REDIRECT, REPORT));
        let violations = csp.take_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].disposition, PolicyDisposition::Report);
    }

    #[test]
    fn suppressed_reports_record_nothing() {
        let csp = policy("script-src 'none'", PolicyDisposition::Enforce);
        assert!(!csp.allow_script_from_source(
            &url("https://a.example/x.js"),
            NO_REDIRECT,
            ReportingStatus::SuppressReport
        ));
        assert!(csp.take_violations().is_empty());
    }

    #[test]
    fn frame_ancestors_checks_every_ancestor() {
        let csp = policy("frame-ancestors 'self' https://partner.example", PolicyDisposition::Enforce);
        let framed = url("https://example.com/widget");
        assert!(csp.allow_ancestors(
            &framed,
            &[url("https://partner.example/page"), url("https://example.com/")],
            REPORT
        ));
        assert!(!csp.allow_ancestors(
            &framed,
            &[url("https://example.com/inner"), url("https://evil.example/")],
            REPORT
        ));
    }

    #[test]
    fn scheme_sources_and_upgrade_flags() {
        let csp = policy(
            "form-action https:; upgrade-insecure-requests; sandbox allow-scripts",
            PolicyDisposition::Enforce,
        );
        assert!(csp.allow_form_action(&url("https://a.example/post"), NO_REDIRECT, REPORT));
        assert!(!csp.allow_form_action(&url("ftp://a.example/post"), NO_REDIRECT, REPORT));
        assert!(csp.upgrade_insecure_requests());
        assert!(csp.sandbox_flags().contains(SandboxFlags::ORIGIN));
        assert!(!csp.sandbox_flags().contains(SandboxFlags::SCRIPTS));
    }

    #[test]
    fn multiple_policies_in_one_header_all_apply() {
        let csp = policy("script-src *, script-src 'self'", PolicyDisposition::Enforce);
        assert!(!csp.allow_script_from_source(&url("https://other.example/x.js"), NO_REDIRECT, REPORT));
        assert!(csp.allow_script_from_source(&url("https://example.com/x.js"), NO_REDIRECT, REPORT));
    }
}
