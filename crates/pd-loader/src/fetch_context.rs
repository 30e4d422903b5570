//! Fetch policy for one frame: cache behaviour, security gates and the
//! request headers every fetch picks up.

use crate::client::FrameClients;
use crate::console::ConsoleMessage;
use crate::context::LoaderContext;
use crate::document::Document;
use crate::frame_load_request::FrameLoadType;
use crate::frame_tree::FrameTree;
use crate::mixed_content::MixedContentChecker;
use log::debug;
use log::warn;
use pd_core::FrameId;
use pd_net::CachePolicy;
use pd_net::FetchContext;
use pd_net::FetchRequest;
use pd_net::FrameType;
use pd_net::HttpMethod;
use pd_net::MemoryCachePolicy;
use pd_net::OriginRestriction;
use pd_net::RequestContext;
use pd_net::ResourceLoaderOptions;
use pd_net::ResourceRequest;
use pd_net::ResourceType;
use pd_net::Scheme;
use pd_net::fetch::ContentSecurityPolicyDisposition;
use pd_net::url::strip_fragment;
use pd_net::url::upgrade_to_https;
use pd_security::RedirectStatus;
use pd_security::ReportingStatus;
use url::Url;

const DEFAULT_ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

pub struct FrameFetchContext<'a> {
    frame: FrameId,
    context: &'a LoaderContext,
    clients: &'a FrameClients,
    load_type: FrameLoadType,
    /// The frame's current document; consulted while a navigation has no
    /// document of its own yet.
    frame_document: Option<&'a Document>,
    /// The document this fetcher loads subresources for. `None` for main
    /// resource fetches.
    document: Option<&'a Document>,
    loader_request: Option<&'a ResourceRequest>,
}

impl<'a> FrameFetchContext<'a> {
    pub fn for_main_resource(
        frame: FrameId,
        context: &'a LoaderContext,
        clients: &'a FrameClients,
        load_type: FrameLoadType,
        frame_document: Option<&'a Document>,
        loader_request: Option<&'a ResourceRequest>,
    ) -> Self {
        Self {
            frame,
            context,
            clients,
            load_type,
            frame_document,
            document: None,
            loader_request,
        }
    }

    pub fn for_document(
        frame: FrameId,
        context: &'a LoaderContext,
        clients: &'a FrameClients,
        load_type: FrameLoadType,
        document: &'a Document,
        loader_request: Option<&'a ResourceRequest>,
    ) -> Self {
        Self {
            frame,
            context,
            clients,
            load_type,
            frame_document: Some(document),
            document: Some(document),
            loader_request,
        }
    }

    fn policy_document(&self) -> Option<&'a Document> {
        self.document.or(self.frame_document)
    }

    fn print_access_denied_message(&self, url: &Url) {
        let Some(document) = self.document else {
            return;
        };
        let message = ConsoleMessage::security_error(format!(
            "Unsafe attempt to load URL {url} from frame with URL {}. Domains, protocols and ports must match.",
            document.url
        ));
        message.log();
        self.clients.lifecycle.did_add_console_message(self.frame, &message);
    }

    fn can_request_by_content_security_policy(
        &self,
        resource_type: ResourceType,
        request: &ResourceRequest,
        url: &Url,
        options: &ResourceLoaderOptions,
        for_preload: bool,
    ) -> bool {
        let Some(document) = self.policy_document() else {
            return true;
        };
        let bypass_csp = options.content_security_policy == ContentSecurityPolicyDisposition::DoNotCheck
            || self
                .context
                .scheme_registry()
                .scheme_should_bypass_content_security_policy(url.scheme());
        let policy = &document.content_security_policy;
        let reporting = if for_preload {
            ReportingStatus::SuppressReport
        } else {
            ReportingStatus::SendReport
        };
        let redirect = if request.followed_redirect {
            RedirectStatus::DidRedirect
        } else {
            RedirectStatus::DidNotRedirect
        };
        let settings = self.context.settings();
        let permission = &self.clients.permission;

        let allowed = match resource_type {
            ResourceType::XslStyleSheet => {
                bypass_csp || policy.allow_script_from_source(url, redirect, reporting)
            }
            ResourceType::Script | ResourceType::ImportResource => {
                (bypass_csp || policy.allow_script_from_source(url, redirect, reporting))
                    && permission.allow_script_from_source(self.frame, settings.scripts_enabled, url)
            }
            ResourceType::CssStyleSheet => {
                bypass_csp || policy.allow_style_from_source(url, redirect, reporting)
            }
            ResourceType::SvgDocument | ResourceType::Image => {
                (bypass_csp || policy.allow_image_from_source(url, redirect, reporting))
                    && permission.allow_image(self.frame, settings.images_enabled, url)
            }
            ResourceType::Font => bypass_csp || policy.allow_font_from_source(url, redirect, reporting),
            ResourceType::Media | ResourceType::TextTrack => {
                (bypass_csp || policy.allow_media_from_source(url, redirect, reporting))
                    && permission.allow_media(self.frame, url)
            }
            ResourceType::Manifest => {
                bypass_csp || policy.allow_manifest_from_source(url, redirect, reporting)
            }
            ResourceType::MainResource
            | ResourceType::Raw
            | ResourceType::LinkPrefetch
            | ResourceType::LinkSubresource => true,
        };
        if !allowed {
            return false;
        }

        if request.request_context == RequestContext::Manifest
            && resource_type != ResourceType::Manifest
        {
            return bypass_csp || policy.allow_manifest_from_source(url, redirect, reporting);
        }
        true
    }
}

impl FetchContext for FrameFetchContext<'_> {
    fn cache_policy(&self) -> MemoryCachePolicy {
        if self.document.is_some_and(|document| document.load_event_finished) {
            return MemoryCachePolicy::Verify;
        }
        if self.load_type == FrameLoadType::ReloadFromOrigin {
            return MemoryCachePolicy::Reload;
        }

        let parent_policy = {
            let tree = self.context.frame_tree();
            tree.parent(self.frame)
                .map(|parent| snapshot_cache_policy(&tree, parent))
        };
        if let Some(policy) = parent_policy
            && policy != MemoryCachePolicy::Verify
        {
            return policy;
        }

        if self.load_type == FrameLoadType::Reload {
            return MemoryCachePolicy::Revalidate;
        }
        if self
            .loader_request
            .is_some_and(|request| request.cache_policy == CachePolicy::ReturnCacheDataElseLoad)
        {
            return MemoryCachePolicy::HistoryBuffer;
        }
        MemoryCachePolicy::Verify
    }

    fn resource_request_cache_policy(
        &self,
        request: &ResourceRequest,
        resource_type: ResourceType,
    ) -> CachePolicy {
        if resource_type == ResourceType::MainResource {
            let is_post = request.method == HttpMethod::Post;
            if is_post && self.load_type == FrameLoadType::BackForward {
                return CachePolicy::ReturnCacheDataDontLoad;
            }
            if self.load_type == FrameLoadType::Same || request.is_conditional() || is_post {
                return CachePolicy::ReloadIgnoringCacheData;
            }

            let ancestor_load_types: Vec<FrameLoadType> = {
                let tree = self.context.frame_tree();
                tree.ancestors(self.frame)
                    .into_iter()
                    .filter_map(|ancestor| tree.snapshot(ancestor).map(|snapshot| snapshot.load_type))
                    .collect()
            };
            for load_type in std::iter::once(self.load_type).chain(ancestor_load_types) {
                match load_type {
                    FrameLoadType::BackForward => return CachePolicy::ReturnCacheDataElseLoad,
                    FrameLoadType::ReloadFromOrigin => return CachePolicy::ReloadBypassingCache,
                    FrameLoadType::Reload => return CachePolicy::ReloadIgnoringCacheData,
                    _ => {}
                }
            }
            return CachePolicy::UseProtocolCachePolicy;
        }

        if request.is_conditional() {
            return CachePolicy::ReloadIgnoringCacheData;
        }

        if self.document.is_some_and(|document| !document.load_event_finished) {
            if let Some(main_request) = self.loader_request
                && main_request.method == HttpMethod::Post
            {
                // Form resubmission protection on the main resource is not
                // inherited by subresources.
                return if main_request.cache_policy == CachePolicy::ReturnCacheDataDontLoad {
                    CachePolicy::ReturnCacheDataElseLoad
                } else {
                    CachePolicy::UseProtocolCachePolicy
                };
            }
            return self.cache_policy().to_request_cache_policy();
        }
        CachePolicy::UseProtocolCachePolicy
    }

    fn can_request(
        &self,
        resource_type: ResourceType,
        request: &ResourceRequest,
        url: &Url,
        options: &ResourceLoaderOptions,
        for_preload: bool,
        origin_restriction: OriginRestriction,
    ) -> bool {
        let registry = self.context.scheme_registry();

        if let Some(document) = self.document {
            let origin = &document.security_origin;
            if origin_restriction != OriginRestriction::NoRestriction
                && !origin.can_display(url, registry)
            {
                if !for_preload {
                    let message = ConsoleMessage::security_error(format!(
                        "Not allowed to load local resource: {url}"
                    ));
                    message.log();
                    self.clients.lifecycle.did_add_console_message(self.frame, &message);
                }
                debug!("{url} cannot be displayed by {origin}");
                return false;
            }

            let same_origin_only = matches!(
                resource_type,
                ResourceType::XslStyleSheet | ResourceType::SvgDocument
            ) || origin_restriction == OriginRestriction::RestrictToSameOrigin;
            if same_origin_only && !origin.can_request(url, registry) {
                self.print_access_denied_message(url);
                return false;
            }
        }

        if !self.can_request_by_content_security_policy(resource_type, request, url, options, for_preload) {
            return false;
        }

        // Mixed content runs last so a CSP block does not also warn.
        let checker = MixedContentChecker::new(self.context, self.clients);
        !checker.should_block_fetch(self.frame, request.request_context, request.frame_type, url)
    }

    fn upgrade_insecure_request(&self, fetch_request: &mut FetchRequest) {
        let request = &mut fetch_request.resource_request;
        if request.frame_type != FrameType::None {
            set_header(request, "Upgrade-Insecure-Requests", "1");
        }

        let Some(document) = self.policy_document() else {
            return;
        };
        if !document.upgrade_insecure_requests || request.url.scheme() != "http" {
            return;
        }

        let host_listed = request
            .url
            .host_str()
            .is_some_and(|host| document.insecure_navigations_to_upgrade.contains(host));
        let should_upgrade = matches!(request.frame_type, FrameType::None | FrameType::Nested)
            || request.request_context == RequestContext::Form
            || host_listed;
        if should_upgrade && let Some(upgraded) = upgrade_to_https(&request.url) {
            debug!("upgrading insecure request {} to {upgraded}", request.url);
            request.url = upgraded;
        }
    }

    fn add_client_hints_if_necessary(&self, fetch_request: &mut FetchRequest) {
        let settings = self.context.settings();
        if !settings.client_hints_enabled {
            return;
        }
        let Some(document) = self.document else {
            return;
        };
        let preferences = document.client_hints.merged(fetch_request.client_hints);
        let device_pixel_ratio = settings.device_pixel_ratio;
        let request = &mut fetch_request.resource_request;

        if preferences.send_dpr {
            set_header(request, "DPR", &device_pixel_ratio.to_string());
        }
        if preferences.send_resource_width
            && let Some(width) = fetch_request.resource_width
        {
            let physical_width = (width * device_pixel_ratio).ceil();
            set_header(request, "Width", &physical_width.to_string());
        }
        if preferences.send_viewport_width
            && let Some(viewport_width) = settings.viewport_width
        {
            set_header(request, "Viewport-Width", &viewport_width.to_string());
        }
    }

    fn add_csp_header_if_necessary(&self, resource_type: ResourceType, fetch_request: &mut FetchRequest) {
        let Some(document) = self.document else {
            return;
        };
        if resource_type != ResourceType::MainResource && document.content_security_policy.is_active() {
            set_header(&mut fetch_request.resource_request, "CSP", "active");
        }
    }

    fn add_additional_request_headers(&self, request: &mut ResourceRequest, resource_type: ResourceType) {
        let is_main_resource = resource_type == ResourceType::MainResource;
        if !is_main_resource && let Some(document) = self.document {
            if request.referrer.is_none() {
                request.referrer = generate_referrer(&document.url, &request.url);
            }
            if request.method != HttpMethod::Get && !request.headers.contains("Origin") {
                let origin = document.security_origin.to_string();
                set_header(request, "Origin", &origin);
            }
        }

        if request.first_party_for_cookies.is_none() {
            let top = self.context.frame_tree().top(self.frame);
            request.first_party_for_cookies = self
                .context
                .frame_tree()
                .snapshot(top)
                .map(|snapshot| snapshot.url.clone());
        }

        if !Scheme::of(&request.url).is_http_family() {
            return;
        }

        let user_agent = self.context.settings().user_agent.clone();
        set_header(request, "User-Agent", &user_agent);

        if request.cache_policy == CachePolicy::ReloadIgnoringCacheData
            && self.load_type == FrameLoadType::Reload
        {
            set_header(request, "Cache-Control", "max-age=0");
        } else if self.load_type == FrameLoadType::ReloadFromOrigin {
            if !request.is_conditional() {
                set_header(request, "Cache-Control", "no-cache");
            }
            set_header(request, "Pragma", "no-cache");
        }

        if is_main_resource {
            set_header(request, "Accept", DEFAULT_ACCEPT_HEADER);
        }
    }
}

/// Memory cache policy of an ancestor frame, from its published snapshot.
fn snapshot_cache_policy(tree: &FrameTree, frame: FrameId) -> MemoryCachePolicy {
    let Some(snapshot) = tree.snapshot(frame) else {
        return MemoryCachePolicy::Verify;
    };
    if snapshot.load_event_finished {
        return MemoryCachePolicy::Verify;
    }
    if snapshot.load_type == FrameLoadType::ReloadFromOrigin {
        return MemoryCachePolicy::Reload;
    }
    if let Some(parent) = tree.parent(frame) {
        let parent_policy = snapshot_cache_policy(tree, parent);
        if parent_policy != MemoryCachePolicy::Verify {
            return parent_policy;
        }
    }
    if snapshot.load_type == FrameLoadType::Reload {
        return MemoryCachePolicy::Revalidate;
    }
    if snapshot.request_cache_policy == CachePolicy::ReturnCacheDataElseLoad {
        return MemoryCachePolicy::HistoryBuffer;
    }
    MemoryCachePolicy::Verify
}

/// `no-referrer-when-downgrade`: secure pages send nothing to insecure URLs.
fn generate_referrer(document_url: &Url, target: &Url) -> Option<Url> {
    if !Scheme::of(document_url).is_http_family() {
        return None;
    }
    if document_url.scheme() == "https" && target.scheme() != "https" {
        return None;
    }
    let mut referrer = strip_fragment(document_url);
    if referrer.set_username("").is_err() || referrer.set_password(None).is_err() {
        return None;
    }
    Some(referrer)
}

fn set_header(request: &mut ResourceRequest, name: &str, value: &str) {
    if let Err(error) = request.headers.set(name, value) {
        warn!("dropping request header {name}: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::FrameFetchContext;
    use crate::client::FrameClients;
    use crate::config::LoaderSettings;
    use crate::context::LoaderContext;
    use crate::document::Document;
    use crate::frame_load_request::FrameLoadType;
    use crate::frame_tree::FrameOwner;
    use crate::frame_tree::FrameOwnerKind;
    use crate::frame_tree::FrameSnapshot;
    use pd_core::BrowserResult;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::CachePolicy;
    use pd_net::FetchContext;
    use pd_net::FetchRequest;
    use pd_net::FrameType;
    use pd_net::HttpMethod;
    use pd_net::MemoryCachePolicy;
    use pd_net::NetworkBackend;
    use pd_net::OriginRestriction;
    use pd_net::RequestContext;
    use pd_net::ResourceLoaderOptions;
    use pd_net::ResourceRequest;
    use pd_net::ResourceType;
    use pd_security::ContentSecurityPolicy;
    use pd_security::PolicyDisposition;
    use pd_security::SchemeRegistry;
    use pd_security::SecurityOrigin;
    use std::rc::Rc;
    use url::Url;

    struct NullBackend;

    impl NetworkBackend for NullBackend {
        fn start(&self, _identifier: ResourceId, _request: &ResourceRequest) -> BrowserResult<()> {
            Ok(())
        }

        fn cancel(&self, _identifier: ResourceId) {}
    }

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn context(settings: LoaderSettings) -> Rc<LoaderContext> {
        let context = match LoaderContext::new(settings, Rc::new(NullBackend), Rc::new(ManualClock::new())) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        {
            let mut tree = context.frame_tree_mut();
            assert!(tree.insert_main_frame(FrameId::new(1)).is_ok());
            assert!(
                tree.insert_child_frame(
                    FrameId::new(1),
                    FrameId::new(2),
                    "",
                    FrameOwner::new(FrameOwnerKind::Iframe),
                )
                .is_ok()
            );
            let top = url("https://a.example/");
            let origin = SecurityOrigin::create(&top, &SchemeRegistry::default());
            tree.set_snapshot(FrameId::new(1), FrameSnapshot::new(top.clone(), origin.clone()));
            tree.set_snapshot(FrameId::new(2), FrameSnapshot::new(top, origin));
        }
        context
    }

    fn document(input: &str) -> Document {
        let url = url(input);
        let origin = SecurityOrigin::create(&url, &SchemeRegistry::default());
        Document::new(url, "text/html", origin)
    }

    #[test]
    fn parent_reload_is_inherited() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        context
            .frame_tree_mut()
            .update_snapshot(FrameId::new(1), |snapshot| snapshot.load_type = FrameLoadType::Reload);
        let document = document("https://a.example/child");
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(2),
            &context,
            &clients,
            FrameLoadType::Standard,
            &document,
            None,
        );
        assert_eq!(fetch_context.cache_policy(), MemoryCachePolicy::Revalidate);

        let request = ResourceRequest::new(url("https://a.example/img.png"));
        assert_eq!(
            fetch_context.resource_request_cache_policy(&request, ResourceType::Image),
            CachePolicy::ReloadIgnoringCacheData
        );
    }

    #[test]
    fn main_resource_policy_follows_load_type() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let request = ResourceRequest::new(url("https://a.example/"));

        let back_forward = FrameFetchContext::for_main_resource(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::BackForward,
            None,
            None,
        );
        assert_eq!(
            back_forward.resource_request_cache_policy(&request, ResourceType::MainResource),
            CachePolicy::ReturnCacheDataElseLoad
        );
        let post = request.clone().with_method(HttpMethod::Post);
        assert_eq!(
            back_forward.resource_request_cache_policy(&post, ResourceType::MainResource),
            CachePolicy::ReturnCacheDataDontLoad
        );

        let from_origin = FrameFetchContext::for_main_resource(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::ReloadFromOrigin,
            None,
            None,
        );
        assert_eq!(
            from_origin.resource_request_cache_policy(&request, ResourceType::MainResource),
            CachePolicy::ReloadBypassingCache
        );
    }

    #[test]
    fn post_main_resource_is_not_inherited_by_subresources() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let document = document("https://a.example/");
        let main = ResourceRequest::new(url("https://a.example/"))
            .with_method(HttpMethod::Post)
            .with_cache_policy(CachePolicy::ReturnCacheDataDontLoad);
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::BackForward,
            &document,
            Some(&main),
        );
        let request = ResourceRequest::new(url("https://a.example/app.css"));
        assert_eq!(
            fetch_context.resource_request_cache_policy(&request, ResourceType::CssStyleSheet),
            CachePolicy::ReturnCacheDataElseLoad
        );
    }

    #[test]
    fn csp_blocks_disallowed_scripts() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let mut document = document("https://a.example/");
        let mut policy = ContentSecurityPolicy::new();
        policy.bind_to_url(&url("https://a.example/"));
        policy.did_receive_header("script-src 'self'", PolicyDisposition::Enforce);
        document.apply_content_security_policy(policy);

        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::Standard,
            &document,
            None,
        );
        let options = ResourceLoaderOptions::default();
        let allowed = url("https://a.example/app.js");
        let blocked = url("https://evil.example/app.js");
        let request = ResourceRequest::new(allowed.clone());
        assert!(fetch_context.can_request(
            ResourceType::Script,
            &request,
            &allowed,
            &options,
            false,
            OriginRestriction::UseDefaultForType,
        ));
        assert!(!fetch_context.can_request(
            ResourceType::Script,
            &request,
            &blocked,
            &options,
            false,
            OriginRestriction::UseDefaultForType,
        ));
        assert!(fetch_context.can_request(
            ResourceType::Image,
            &request,
            &blocked,
            &options,
            false,
            OriginRestriction::UseDefaultForType,
        ));
    }

    #[test]
    fn svg_documents_are_same_origin_only() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let document = document("https://a.example/");
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::Standard,
            &document,
            None,
        );
        let other = url("https://b.example/icon.svg");
        let request = ResourceRequest::new(other.clone());
        assert!(!fetch_context.can_request(
            ResourceType::SvgDocument,
            &request,
            &other,
            &ResourceLoaderOptions::default(),
            false,
            OriginRestriction::UseDefaultForType,
        ));
    }

    #[test]
    fn insecure_subresources_are_upgraded_on_opt_in() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let mut document = document("https://a.example/");
        document.upgrade_insecure_requests = true;
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::Standard,
            &document,
            None,
        );

        let mut subresource = FetchRequest::new(ResourceRequest::new(url("http://cdn.example:80/a.js")));
        fetch_context.upgrade_insecure_request(&mut subresource);
        assert_eq!(subresource.url().as_str(), "https://cdn.example/a.js");
        assert!(subresource.resource_request.header("Upgrade-Insecure-Requests").is_none());

        let mut navigation = FetchRequest::new(
            ResourceRequest::new(url("http://other.example/")).with_frame_type(FrameType::TopLevel),
        );
        fetch_context.upgrade_insecure_request(&mut navigation);
        assert_eq!(navigation.url().scheme(), "http");
        assert_eq!(
            navigation.resource_request.header("Upgrade-Insecure-Requests"),
            Some("1")
        );

        let mut form = FetchRequest::new(
            ResourceRequest::new(url("http://other.example/submit"))
                .with_frame_type(FrameType::TopLevel)
                .with_request_context(RequestContext::Form),
        );
        fetch_context.upgrade_insecure_request(&mut form);
        assert_eq!(form.url().scheme(), "https");
    }

    #[test]
    fn client_hints_follow_document_preferences() {
        let settings = LoaderSettings {
            device_pixel_ratio: 2.0,
            viewport_width: Some(800),
            ..LoaderSettings::default()
        };
        let context = context(settings);
        let clients = FrameClients::default();
        let mut document = document("https://a.example/");
        document
            .client_hints
            .update_from_accept_client_hints_header("DPR, Width, Viewport-Width");
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::Standard,
            &document,
            None,
        );
        let mut request = FetchRequest::new(ResourceRequest::new(url("https://a.example/a.png")));
        request.resource_width = Some(100.4);
        fetch_context.add_client_hints_if_necessary(&mut request);
        assert_eq!(request.resource_request.header("DPR"), Some("2"));
        assert_eq!(request.resource_request.header("Width"), Some("201"));
        assert_eq!(request.resource_request.header("Viewport-Width"), Some("800"));
    }

    #[test]
    fn additional_headers_for_http_requests() {
        let context = context(LoaderSettings::default());
        let clients = FrameClients::default();
        let document = document("https://a.example/page#top");
        let fetch_context = FrameFetchContext::for_document(
            FrameId::new(1),
            &context,
            &clients,
            FrameLoadType::ReloadFromOrigin,
            &document,
            None,
        );

        let mut request = ResourceRequest::new(url("https://a.example/api")).with_method(HttpMethod::Post);
        fetch_context.add_additional_request_headers(&mut request, ResourceType::Raw);
        assert_eq!(request.referrer.as_ref().map(Url::as_str), Some("https://a.example/page"));
        assert_eq!(request.header("Origin"), Some("https://a.example"));
        assert_eq!(request.header("Pragma"), Some("no-cache"));
        assert!(request.header("User-Agent").is_some());
        assert!(request.header("Accept").is_none());
        assert_eq!(
            request.first_party_for_cookies.as_ref().map(Url::as_str),
            Some("https://a.example/")
        );

        let mut downgrade = ResourceRequest::new(url("http://b.example/x"));
        fetch_context.add_additional_request_headers(&mut downgrade, ResourceType::Image);
        assert!(downgrade.referrer.is_none());
    }
}
