//! One attempt at loading a frame's main resource.
//!
//! A `DocumentLoader` owns what belongs to that attempt: the requests, the
//! redirect chain, the response, its fetcher and application cache host,
//! and, once bytes arrive, the document and its writer. Frame-wide
//! transitions (commit, history, completion) stay in `FrameLoader`, which
//! drives these methods and acts on the `LoadStep` they return.

use crate::appcache::ApplicationCacheHost;
use crate::client::FrameClients;
use crate::client::NavigationPolicy;
use crate::client::NavigationPolicyInfo;
use crate::client::NavigationType;
use crate::console::ConsoleMessage;
use crate::context::LoaderContext;
use crate::document::Document;
use crate::document::DocumentKind;
use crate::document::ManifestDeclaration;
use crate::fetch_context::FrameFetchContext;
use crate::frame_load_request::FrameLoadType;
use crate::frame_load_request::SubstituteData;
use crate::frame_tree::FrameRef;
use crate::mhtml::ArchiveResource;
use crate::mhtml::MhtmlArchive;
use crate::timing::DocumentLoadTiming;
use crate::writer::DocumentWriter;
use log::debug;
use log::info;
use log::warn;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::FrameId;
use pd_core::LoaderId;
use pd_core::ResourceId;
use pd_net::CachePolicy;
use pd_net::FetchRequest;
use pd_net::HttpMethod;
use pd_net::HttpStatusCode;
use pd_net::RequestContext;
use pd_net::ResourceError;
use pd_net::ResourceFetcher;
use pd_net::ResourceLoaderOptions;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use pd_net::ResourceType;
use pd_net::http::ContentDispositionType;
use pd_net::http::content_disposition_type;
use pd_net::mime_registry::is_archive_mime_type;
use pd_net::mime_registry::is_supported_mime_type;
use pd_net::url::about_blank;
use pd_net::url::is_about_blank;
use pd_security::ContentSecurityPolicy;
use pd_security::Directive;
use pd_security::PolicyDisposition;
use pd_security::RedirectStatus;
use pd_security::ReportingStatus;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use pd_security::XFrameOptionsDisposition;
use pd_security::parse_x_frame_options_header;
use std::rc::Rc;
use std::time::Instant;
use url::Url;

/// The frame a loader works for, plus the shared state it may touch.
#[derive(Clone, Copy)]
pub struct LoadScope<'a> {
    pub frame: FrameRef,
    pub context: &'a Rc<LoaderContext>,
    pub clients: &'a FrameClients,
}

impl LoadScope<'_> {
    pub fn id(&self) -> FrameId {
        self.frame.id
    }

    /// False once script detached or replaced the frame.
    pub fn is_live(&self) -> bool {
        self.context.frame_tree().is_live(self.frame)
    }

    pub fn is_main_frame(&self) -> bool {
        self.context.frame_tree().is_main_frame(self.frame.id)
    }

    pub fn add_console_message(&self, message: ConsoleMessage) {
        message.log();
        self.clients
            .lifecycle
            .did_add_console_message(self.frame.id, &message);
    }
}

/// What the frame loader does after a main-resource callback.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStep {
    Continue,
    /// The frame went away or the failure was already reported; stop quietly.
    Abandoned,
    /// The main resource was cancelled or failed. Report it through
    /// `FrameLoader::received_main_resource_error`.
    Failed(ResourceError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MainResourceStart {
    Fetching(ResourceId),
    /// Nothing to fetch. The synthesized response is in place and the load
    /// can commit and finish right away.
    Empty,
    /// Substitute data stands in for the network.
    Substitute {
        response: ResourceResponse,
        data: Vec<u8>,
    },
    Abandoned,
    Failed(ResourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivedData {
    /// Archive bytes, held until the load finishes.
    Buffered,
    /// The loader has to be committed before the bytes can be written.
    NeedsCommit,
    Ready,
}

pub struct DocumentLoader {
    id: LoaderId,
    original_request: ResourceRequest,
    request: ResourceRequest,
    response: Option<ResourceResponse>,
    substitute_data: Option<SubstituteData>,
    requester_origin: Option<SecurityOrigin>,
    navigation_type: NavigationType,
    is_client_redirect: bool,
    replaces_current_history_item: bool,
    redirect_chain: Vec<Url>,
    main_document_error: Option<ResourceError>,
    main_resource_identifier: Option<ResourceId>,
    loading_main_resource: bool,
    committed: bool,
    fetcher: ResourceFetcher,
    application_cache_host: ApplicationCacheHost,
    application_cache_selected: bool,
    application_cache_reload_needed: bool,
    timing: DocumentLoadTiming,
    time_of_last_data_received: Option<Instant>,
    content_security_policy: Option<ContentSecurityPolicy>,
    archive_data: Vec<u8>,
    archive: Option<MhtmlArchive>,
    document: Option<Document>,
    writer: Option<DocumentWriter>,
}

impl DocumentLoader {
    pub fn new(
        context: &LoaderContext,
        request: ResourceRequest,
        substitute_data: Option<SubstituteData>,
    ) -> Self {
        Self {
            id: context.identifiers().next_loader(),
            original_request: request.clone(),
            request,
            response: None,
            substitute_data,
            requester_origin: None,
            navigation_type: NavigationType::Other,
            is_client_redirect: false,
            replaces_current_history_item: false,
            redirect_chain: Vec::new(),
            main_document_error: None,
            main_resource_identifier: None,
            loading_main_resource: false,
            committed: false,
            fetcher: ResourceFetcher::new(context.backend()),
            application_cache_host: ApplicationCacheHost::new(),
            application_cache_selected: false,
            application_cache_reload_needed: false,
            timing: DocumentLoadTiming::default(),
            time_of_last_data_received: None,
            content_security_policy: None,
            archive_data: Vec::new(),
            archive: None,
            document: None,
            writer: None,
        }
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn original_request(&self) -> &ResourceRequest {
        &self.original_request
    }

    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    pub fn url(&self) -> &Url {
        &self.request.url
    }

    pub fn response(&self) -> Option<&ResourceResponse> {
        self.response.as_ref()
    }

    pub fn substitute_data(&self) -> Option<&SubstituteData> {
        self.substitute_data.as_ref()
    }

    /// The URL whose load failed, for error pages.
    pub fn unreachable_url(&self) -> Option<&Url> {
        self.substitute_data
            .as_ref()
            .and_then(|data| data.failing_url.as_ref())
    }

    /// The URL history records: the unreachable URL for error pages.
    pub fn url_for_history(&self) -> &Url {
        self.unreachable_url().unwrap_or(&self.request.url)
    }

    pub fn main_document_error(&self) -> Option<&ResourceError> {
        self.main_document_error.as_ref()
    }

    pub fn main_resource_identifier(&self) -> Option<ResourceId> {
        self.main_resource_identifier
    }

    pub fn is_loading_main_resource(&self) -> bool {
        self.loading_main_resource
    }

    /// True while the main resource, any subresource or the parser is busy.
    pub fn is_loading(&self) -> bool {
        self.document.as_ref().is_some_and(|document| document.parsing)
            || self.loading_main_resource
            || self.fetcher.is_fetching()
    }

    pub fn set_committed(&mut self) {
        self.committed = true;
    }

    pub fn navigation_type(&self) -> NavigationType {
        self.navigation_type
    }

    pub fn set_navigation_type(&mut self, navigation_type: NavigationType) {
        self.navigation_type = navigation_type;
    }

    pub fn is_client_redirect(&self) -> bool {
        self.is_client_redirect
    }

    pub fn set_is_client_redirect(&mut self, value: bool) {
        self.is_client_redirect = value;
    }

    pub fn replaces_current_history_item(&self) -> bool {
        self.replaces_current_history_item
    }

    pub fn set_replaces_current_history_item(&mut self, value: bool) {
        self.replaces_current_history_item = value;
    }

    /// The origin of the document that asked for this navigation. An
    /// `about:blank` load inherits it.
    pub fn set_requester_origin(&mut self, origin: Option<SecurityOrigin>) {
        self.requester_origin = origin;
    }

    pub fn redirect_chain(&self) -> &[Url] {
        &self.redirect_chain
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect_chain.len() > 1
    }

    pub fn append_redirect(&mut self, url: Url) {
        self.redirect_chain.push(url);
    }

    pub fn timing(&self) -> &DocumentLoadTiming {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut DocumentLoadTiming {
        &mut self.timing
    }

    pub fn time_of_last_data_received(&self) -> Option<Instant> {
        self.time_of_last_data_received
    }

    pub fn application_cache_host(&self) -> &ApplicationCacheHost {
        &self.application_cache_host
    }

    pub fn application_cache_host_mut(&mut self) -> &mut ApplicationCacheHost {
        &mut self.application_cache_host
    }

    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut ResourceFetcher {
        &mut self.fetcher
    }

    pub fn archive(&self) -> Option<&MhtmlArchive> {
        self.archive.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    /// Begins the main resource: the empty-document shortcut, substitute
    /// data, or a real fetch after one pass through `will_send_request`.
    pub fn start_loading_main_resource(
        &mut self,
        scope: LoadScope<'_>,
        mut frame_document: Option<&mut Document>,
        load_type: FrameLoadType,
    ) -> MainResourceStart {
        let now = scope.context.now();
        self.timing.mark_navigation_start(now);
        self.loading_main_resource = true;

        let backend = scope
            .clients
            .application_cache
            .create_application_cache_backend(scope.id());
        self.application_cache_host
            .will_start_loading_main_resource(backend, &mut self.request);

        if let Some(substitute) = &self.substitute_data {
            let response = ResourceResponse::synthetic(
                self.request.url.clone(),
                &substitute.mime_type,
                Some(substitute.data.len() as u64),
                Some(&substitute.text_encoding),
            );
            return MainResourceStart::Substitute {
                response,
                data: substitute.data.clone(),
            };
        }
        if self.should_load_empty(scope) {
            self.load_empty();
            return MainResourceStart::Empty;
        }

        self.timing.mark_fetch_start(now);
        let identifier = scope.context.identifiers().next_resource();
        self.main_resource_identifier = Some(identifier);

        let mut request = self.request.clone();
        match self.will_send_request(scope, frame_document.as_deref_mut(), &mut request, None) {
            LoadStep::Continue => {}
            LoadStep::Abandoned => return MainResourceStart::Abandoned,
            LoadStep::Failed(error) => return MainResourceStart::Failed(error),
        }

        let fetch_context = FrameFetchContext::for_main_resource(
            scope.id(),
            scope.context,
            scope.clients,
            load_type,
            frame_document.as_deref(),
            Some(&self.request),
        );
        let result = self
            .fetcher
            .fetch_main_resource(identifier, FetchRequest::new(request), &fetch_context);
        match result {
            Ok(prepared) => {
                debug!(
                    "frame {} fetching main resource {identifier}: {} {}",
                    scope.id(),
                    prepared.method.as_str(),
                    prepared.url
                );
                self.request = prepared;
                MainResourceStart::Fetching(identifier)
            }
            Err(error) => {
                warn!(
                    "frame {} could not fetch {}: {error}",
                    scope.id(),
                    self.request.url
                );
                // The appcache host saw the refused request; start it over.
                self.main_resource_identifier = None;
                self.request = ResourceRequest::new(about_blank());
                self.application_cache_host = ApplicationCacheHost::new();
                self.load_empty();
                MainResourceStart::Empty
            }
        }
    }

    fn should_load_empty(&self, scope: LoadScope<'_>) -> bool {
        self.substitute_data.is_none()
            && (is_about_blank(&self.request.url)
                || scope
                    .context
                    .scheme_registry()
                    .should_load_url_scheme_as_empty_document(self.request.url.scheme()))
    }

    fn load_empty(&mut self) {
        self.response = Some(ResourceResponse::synthetic(
            self.request.url.clone(),
            "text/html",
            Some(0),
            None,
        ));
    }

    /// Vets a request before it goes out, for the first leg and for every
    /// redirect.
    pub fn will_send_request(
        &mut self,
        scope: LoadScope<'_>,
        frame_document: Option<&mut Document>,
        new_request: &mut ResourceRequest,
        redirect_response: Option<&ResourceResponse>,
    ) -> LoadStep {
        let redirect_status = match redirect_response {
            Some(_) => RedirectStatus::DidRedirect,
            None => RedirectStatus::DidNotRedirect,
        };
        if new_request.request_context == RequestContext::Form
            && let Some(document) = frame_document.as_deref()
            && !document.content_security_policy.allow_form_action(
                &new_request.url,
                redirect_status,
                ReportingStatus::SendReport,
            )
        {
            report_csp_violations(scope, &document.content_security_policy);
            return self.cancel_step(ResourceError::cancelled(&new_request.url));
        }

        if let Some(identifier) = self.main_resource_identifier {
            scope.clients.navigation.dispatch_will_send_request(
                scope.id(),
                identifier,
                new_request,
                redirect_response,
            );
            if !scope.is_live() {
                return LoadStep::Abandoned;
            }
        }

        if let Some(redirect) = redirect_response {
            let registry = scope.context.scheme_registry();
            let redirecting_origin = SecurityOrigin::create(&redirect.url, registry);
            if !redirecting_origin.can_display(&new_request.url, registry) {
                scope.add_console_message(ConsoleMessage::security_error(format!(
                    "Not allowed to load local resource: {}",
                    new_request.url
                )));
                return self.cancel_step(ResourceError::cancelled(&new_request.url));
            }
            self.timing
                .add_redirect(&redirect.url, &new_request.url, registry, scope.context.now());
        }

        // A redirected POST must not be answered from cache.
        if new_request.cache_policy == CachePolicy::UseProtocolCachePolicy
            && self.is_redirect_after_post(redirect_response)
        {
            new_request.cache_policy = CachePolicy::ReloadBypassingCache;
        }

        self.request = new_request.clone();
        LoadStep::Continue
    }

    fn is_redirect_after_post(&self, redirect_response: Option<&ResourceResponse>) -> bool {
        let Some(response) = redirect_response else {
            return false;
        };
        matches!(response.http_status_code(), 301..=303 | 307)
            && self.original_request.method == HttpMethod::Post
    }

    /// A server redirect for the main resource. On `Continue` the caller
    /// follows `new_request` as rewritten here.
    pub fn redirect_received(
        &mut self,
        scope: LoadScope<'_>,
        mut frame_document: Option<&mut Document>,
        load_type: FrameLoadType,
        new_request: &mut ResourceRequest,
        redirect_response: &ResourceResponse,
    ) -> LoadStep {
        let allowed = {
            let fetch_context = FrameFetchContext::for_main_resource(
                scope.id(),
                scope.context,
                scope.clients,
                load_type,
                frame_document.as_deref(),
                Some(&self.request),
            );
            self.fetcher.can_access_redirect(
                ResourceType::MainResource,
                new_request,
                &ResourceLoaderOptions::default(),
                &fetch_context,
            )
        };
        if !allowed {
            return self.cancel_step(ResourceError::cancelled(&new_request.url));
        }

        match self.will_send_request(
            scope,
            frame_document.as_deref_mut(),
            new_request,
            Some(redirect_response),
        ) {
            LoadStep::Continue => {}
            other => return other,
        }

        self.append_redirect(new_request.url.clone());
        scope
            .clients
            .lifecycle
            .dispatch_did_receive_server_redirect_for_provisional_load(scope.id(), &new_request.url);
        if !scope.is_live() {
            return LoadStep::Abandoned;
        }

        let check = NavigationPolicyCheck {
            request: new_request,
            has_substitute_data: false,
            check_content_security_policy: true,
            navigation_type: self.navigation_type,
            policy: NavigationPolicy::CurrentTab,
            replaces_current_history_item: self.replaces_current_history_item,
            is_redirect: true,
        };
        if !should_continue_for_navigation_policy(scope, frame_document, &check) {
            if !scope.is_live() {
                return LoadStep::Abandoned;
            }
            return self.cancel_step(ResourceError::cancelled(&new_request.url));
        }
        LoadStep::Continue
    }

    /// Applies every check a main-resource response must pass before its
    /// body may replace the frame's document.
    pub fn response_received(
        &mut self,
        scope: LoadScope<'_>,
        frame_document: Option<&mut Document>,
        response: ResourceResponse,
    ) -> LoadStep {
        self.application_cache_host
            .did_receive_response_for_main_resource(&response);
        // The memory cache does not know appcache rules.
        if response.app_cache_id != 0 && scope.context.memory_cache_mut().remove(&response.url) {
            debug!("evicted appcache response {} from the memory cache", response.url);
        }

        let mut policy = ContentSecurityPolicy::new();
        policy.bind_to_url(&response.url);
        for value in response.headers.get_all("Content-Security-Policy") {
            policy.did_receive_header(value, PolicyDisposition::Enforce);
        }
        for value in response.headers.get_all("Content-Security-Policy-Report-Only") {
            policy.did_receive_header(value, PolicyDisposition::Report);
        }

        // `frame-ancestors` supersedes `X-Frame-Options`.
        if !policy.governs(Directive::FrameAncestors)
            && let Some(value) = response.header("X-Frame-Options")
            && self.should_interrupt_load_for_x_frame_options(scope, value, &response.url)
        {
            let message = ConsoleMessage::security_error(format!(
                "Refused to display '{}' in a frame because it set 'X-Frame-Options' to '{value}'.",
                response.url
            ));
            scope.add_console_message(match self.main_resource_identifier {
                Some(identifier) => message.with_request_identifier(identifier),
                None => message,
            });
            return self.cancel_load_after_frame_denied(scope, frame_document);
        }

        let ancestors = ancestor_urls(scope);
        let ancestors_allowed =
            policy.allow_ancestors(&response.url, &ancestors, ReportingStatus::SendReport);
        report_csp_violations(scope, &policy);
        if !ancestors_allowed {
            return self.cancel_load_after_frame_denied(scope, frame_document);
        }

        self.content_security_policy = Some(policy);
        self.response = Some(response);

        if !self.should_continue_for_response(scope) {
            info!(
                "frame {} leaves its document in place for {}",
                scope.id(),
                self.request.url
            );
            let url = self.request.url.clone();
            return self.cancel_step(ResourceError::cancelled(&url));
        }

        if let Some(response) = &self.response
            && response.is_http()
            && !(200..300).contains(&response.http_status_code())
        {
            let rendered = scope
                .context
                .frame_tree_mut()
                .owner_mut(scope.id())
                .is_some_and(|owner| owner.render_fallback_content());
            if rendered {
                debug!(
                    "frame {} owner renders fallback content for status {}",
                    scope.id(),
                    response.http_status_code()
                );
            }
        }
        LoadStep::Continue
    }

    /// Whether the response body should become the frame's next document.
    pub fn should_continue_for_response(&self, scope: LoadScope<'_>) -> bool {
        if self.substitute_data.is_some() {
            return true;
        }
        let Some(response) = &self.response else {
            return false;
        };

        if response.status.is_some_and(HttpStatusCode::is_no_content) {
            return false;
        }
        if let Some(value) = response.header("Content-Disposition")
            && content_disposition_type(value) == ContentDispositionType::Attachment
        {
            return false;
        }
        if !can_show_mime_type(scope, &response.mime_type) {
            return false;
        }
        // Remote archives could claim to be from any origin.
        if is_archive_mime_type(&response.mime_type)
            && !scope
                .context
                .scheme_registry()
                .should_treat_url_scheme_as_local(self.request.url.scheme())
        {
            return false;
        }
        true
    }

    fn should_interrupt_load_for_x_frame_options(
        &self,
        scope: LoadScope<'_>,
        content: &str,
        url: &Url,
    ) -> bool {
        if !scope.context.settings().security.enforce_frame_options {
            return false;
        }
        let top = scope.context.frame_tree().top(scope.id());
        if top == scope.id() {
            return false;
        }

        match parse_x_frame_options_header(content) {
            XFrameOptionsDisposition::SameOrigin => {
                let origin = SecurityOrigin::create(url, scope.context.scheme_registry());
                let tree = scope.context.frame_tree();
                let top_matches = tree
                    .snapshot(top)
                    .is_some_and(|snapshot| origin.is_same_scheme_host_port(&snapshot.security_origin));
                if !top_matches {
                    return true;
                }
                let cross_origin_ancestor = tree.ancestors(scope.id()).into_iter().find(|ancestor| {
                    tree.snapshot(*ancestor)
                        .is_none_or(|snapshot| !origin.is_same_scheme_host_port(&snapshot.security_origin))
                });
                if let Some(ancestor) = cross_origin_ancestor {
                    debug!("SAMEORIGIN framing of {url} allowed although frame {ancestor} is cross-origin");
                }
                false
            }
            XFrameOptionsDisposition::Deny => true,
            XFrameOptionsDisposition::AllowAll => false,
            XFrameOptionsDisposition::Conflict => {
                scope.add_console_message(ConsoleMessage::security_error(format!(
                    "Multiple 'X-Frame-Options' headers with conflicting values ('{content}') encountered when loading '{url}'. Falling back to 'DENY'."
                )));
                true
            }
            XFrameOptionsDisposition::Invalid => {
                scope.add_console_message(ConsoleMessage::security_error(format!(
                    "Invalid 'X-Frame-Options' header encountered when loading '{url}': '{content}' is not a recognized directive. The header will be ignored."
                )));
                false
            }
        }
    }

    fn cancel_load_after_frame_denied(
        &mut self,
        scope: LoadScope<'_>,
        frame_document: Option<&mut Document>,
    ) -> LoadStep {
        block_frame_load(scope, frame_document);
        // The owner's load handler may have detached the frame.
        if !scope.is_live() {
            return LoadStep::Abandoned;
        }
        let url = self.request.url.clone();
        self.cancel_step(ResourceError::cancelled(&url))
    }

    /// Bookkeeping for a chunk of the main resource body.
    pub fn data_received(&mut self, data: &[u8], now: Instant) -> ReceivedData {
        self.application_cache_host.main_resource_data_received(data);
        self.time_of_last_data_received = Some(now);
        if self
            .response
            .as_ref()
            .is_some_and(|response| is_archive_mime_type(&response.mime_type))
        {
            self.archive_data.extend_from_slice(data);
            return ReceivedData::Buffered;
        }
        if self.committed {
            ReceivedData::Ready
        } else {
            ReceivedData::NeedsCommit
        }
    }

    /// Writes body bytes, creating the document on first use. Returns true
    /// when this call created it.
    pub fn commit_data(&mut self, scope: LoadScope<'_>, data: &[u8]) -> bool {
        let began = self.ensure_writer(scope, None);
        if let (Some(writer), Some(document)) = (self.writer.as_mut(), self.document.as_mut()) {
            writer.add_data(document, data);
        }
        self.select_application_cache(false);
        began
    }

    /// Picks the application cache once the root start tag is known. With
    /// `at_end` a still-pending declaration counts as no manifest.
    fn select_application_cache(&mut self, at_end: bool) {
        if self.application_cache_selected {
            return;
        }
        let Some(document) = self.document.as_mut() else {
            return;
        };
        let manifest = match document.manifest_declaration() {
            ManifestDeclaration::Pending if !at_end => return,
            ManifestDeclaration::Pending | ManifestDeclaration::Absent => None,
            ManifestDeclaration::Present(value) => match document.complete_url(&value) {
                Ok(url) => Some(url),
                Err(error) => {
                    warn!("ignoring manifest of {}: {error}", document.url);
                    None
                }
            },
        };
        self.application_cache_selected = true;
        let Some(manifest_url) = manifest else {
            self.application_cache_host.select_cache_without_manifest();
            return;
        };
        document.has_app_cache_manifest = true;
        if !self
            .application_cache_host
            .select_cache_with_manifest(&manifest_url)
        {
            info!("application cache refused {}; reloading from the network", document.url);
            self.application_cache_reload_needed = true;
        }
    }

    /// True once after the application cache asked for a network reload.
    pub fn take_application_cache_reload(&mut self) -> bool {
        std::mem::take(&mut self.application_cache_reload_needed)
    }

    fn ensure_writer(&mut self, scope: LoadScope<'_>, archive_main: Option<&ArchiveResource>) -> bool {
        if self.writer.is_some() {
            return false;
        }

        let (mime_type, charset) = match (archive_main, &self.response) {
            (Some(main), _) => (main.mime_type.clone(), main.text_encoding.clone()),
            (None, Some(response)) => (response.mime_type.clone(), response.text_encoding.clone()),
            (None, None) => ("text/html".to_owned(), None),
        };
        let url = self.request.url.clone();
        let security_origin = self.document_security_origin(scope, &url);
        let mut document = Document::new(url, &mime_type, security_origin);
        if !is_supported_mime_type(&mime_type) && plugin_supports(scope, &mime_type) {
            document.kind = DocumentKind::Plugin;
        }

        let (inherited_flags, inherited_policy) = inherited_frame_state(scope, &document.url);
        if !inherited_flags.is_empty() {
            document.enforce_sandbox_flags(inherited_flags);
        }
        match self.content_security_policy.take() {
            Some(policy) => document.apply_content_security_policy(policy),
            None => {
                if let Some(policy) = inherited_policy {
                    document.apply_content_security_policy(policy);
                }
            }
        }

        let settings = scope.context.settings();
        if let Some(response) = &self.response {
            if settings.client_hints_enabled
                && let Some(value) = response.header("Accept-CH")
            {
                document.client_hints.update_from_accept_client_hints_header(value);
            }
            if let Some(value) = response.header("X-DNS-Prefetch-Control") {
                document.parse_dns_prefetch_control_header(value);
            }
            if let Some(value) = response.header("Content-Language") {
                document.set_content_language(value);
            }
        }
        document.referrer = self.request.referrer.clone();
        if let Some(main) = archive_main {
            document.base_url_override = Some(main.url.clone());
        }

        let writer = DocumentWriter::new(
            charset.as_deref(),
            settings.default_encoding(),
            document.kind == DocumentKind::Html,
        );
        debug!(
            "frame {} began {:?} document for {}",
            scope.id(),
            document.kind,
            document.url
        );
        self.document = Some(document);
        self.writer = Some(writer);
        true
    }

    fn document_security_origin(&self, scope: LoadScope<'_>, url: &Url) -> SecurityOrigin {
        if self.unreachable_url().is_some() {
            return SecurityOrigin::create_unique();
        }
        if is_about_blank(url) {
            if let Some(origin) = &self.requester_origin {
                return origin.clone();
            }
            let tree = scope.context.frame_tree();
            if let Some(parent) = tree.parent(scope.id())
                && let Some(snapshot) = tree.snapshot(parent)
            {
                return snapshot.security_origin.clone();
            }
        }
        SecurityOrigin::create(url, scope.context.scheme_registry())
    }

    /// Finishes the main resource on a committed loader. Returns true when
    /// this call created the document.
    pub fn finished_loading(&mut self, scope: LoadScope<'_>, finish_time: Instant) -> bool {
        self.timing.set_response_end(finish_time);

        // Even an empty body gets a document.
        let began = match self.maybe_create_archive(scope) {
            Some(began) => began,
            None => self.ensure_writer(scope, None),
        };
        if let (Some(writer), Some(document)) = (self.writer.as_mut(), self.document.as_mut()) {
            writer.end(document);
            document.finish_parsing();
        }
        if self.main_document_error.is_some() {
            return began;
        }
        self.clear_main_resource_loader();
        self.select_application_cache(true);

        // A manifest means the appcache should get the next load.
        if self
            .document
            .as_ref()
            .is_some_and(|document| document.has_app_cache_manifest)
            && let Some(response) = &self.response
            && scope.context.memory_cache_mut().remove(&response.url)
        {
            debug!("evicted manifest document {} from the memory cache", response.url);
        }
        self.application_cache_host.finished_loading_main_resource();
        began
    }

    /// `Some(began)` when the buffered body was a usable archive for the
    /// top-level frame.
    fn maybe_create_archive(&mut self, scope: LoadScope<'_>) -> Option<bool> {
        if !scope.is_main_frame() {
            return None;
        }
        let response_url = match &self.response {
            Some(response) if is_archive_mime_type(&response.mime_type) => response.url.clone(),
            _ => return None,
        };
        let archive = match MhtmlArchive::parse(&response_url, &self.archive_data) {
            Ok(archive) => archive,
            Err(error) => {
                warn!("treating {response_url} as an empty document: {error}");
                return None;
            }
        };

        let main = archive.main_resource().clone();
        let began = self.ensure_writer(scope, Some(&main));
        if let (Some(writer), Some(document)) = (self.writer.as_mut(), self.document.as_mut()) {
            document.enforce_sandbox_flags(SandboxFlags::all());
            writer.add_data(document, &main.data);
        }
        self.archive_data.clear();
        self.archive = Some(archive);
        Some(began)
    }

    fn clear_main_resource_loader(&mut self) {
        self.loading_main_resource = false;
        if let Some(identifier) = self.main_resource_identifier {
            self.fetcher.did_complete(identifier);
        }
    }

    /// Every cancellation path ends here. Returns the error to report, or
    /// `None` when a failure was already reported for this load.
    pub fn cancel_main_resource_load(&mut self, error: ResourceError) -> Option<ResourceError> {
        if let Some(identifier) = self.fetcher.cancel_main_resource() {
            debug!("cancelled main resource {identifier}: {error}");
        }
        self.main_received_error(error)
    }

    pub fn main_received_error(&mut self, error: ResourceError) -> Option<ResourceError> {
        if self.main_document_error.is_some() {
            return None;
        }
        self.application_cache_host.failed_loading_main_resource();
        self.loading_main_resource = false;
        self.main_document_error = Some(error.clone());
        Some(error)
    }

    fn cancel_step(&mut self, error: ResourceError) -> LoadStep {
        match self.cancel_main_resource_load(error) {
            Some(error) => LoadStep::Failed(error),
            None => LoadStep::Abandoned,
        }
    }

    /// Cancels the main resource if anything is still loading, then every
    /// subresource.
    pub fn stop_loading(&mut self) -> Option<ResourceError> {
        let error = if self.is_loading() {
            let url = self.request.url.clone();
            self.cancel_main_resource_load(ResourceError::cancelled(&url))
        } else {
            None
        };
        let stopped = self.fetcher.stop_fetching();
        if !stopped.is_empty() {
            debug!("loader {} stopped {} subresource fetches", self.id, stopped.len());
        }
        error
    }

    pub fn detach_from_frame(&mut self) -> Option<ResourceError> {
        let error = self.stop_loading();
        self.application_cache_host.detach_from_document_loader();
        error
    }

    /// Rebases the loader onto a same-document URL change.
    pub fn update_for_same_document_navigation(&mut self, new_url: Url, from_history_api: bool) {
        let old_url = std::mem::replace(&mut self.request.url, new_url.clone());
        self.original_request.url = new_url.clone();
        if from_history_api {
            self.request.method = HttpMethod::Get;
            self.request.body = None;
        }
        self.redirect_chain.clear();
        if self.is_client_redirect {
            self.redirect_chain.push(old_url);
        }
        self.redirect_chain.push(new_url.clone());
        if let Some(document) = self.document.as_mut() {
            document.url = new_url;
        }
    }

    /// Starts a subresource fetch on behalf of the committed document.
    pub fn request_subresource(
        &mut self,
        scope: LoadScope<'_>,
        load_type: FrameLoadType,
        resource_type: ResourceType,
        request: FetchRequest,
    ) -> BrowserResult<(ResourceId, ResourceRequest)> {
        let Some(document) = self.document.as_ref() else {
            return Err(BrowserError::new(
                "loader.no_document",
                format!("loader {} has no document to fetch {} for", self.id, request.url()),
            ));
        };
        let identifier = scope.context.identifiers().next_resource();
        let fetch_context = FrameFetchContext::for_document(
            scope.id(),
            scope.context,
            scope.clients,
            load_type,
            document,
            Some(&self.request),
        );
        let prepared = self
            .fetcher
            .request_resource(identifier, resource_type, request, &fetch_context)?;
        Ok((identifier, prepared))
    }

    /// Re-checks a subresource redirect against the document's policies.
    pub fn subresource_redirect_allowed(
        &mut self,
        scope: LoadScope<'_>,
        load_type: FrameLoadType,
        identifier: ResourceId,
        new_request: &mut ResourceRequest,
        redirect_response: &ResourceResponse,
    ) -> bool {
        let (Some(resource_type), Some(document)) =
            (self.fetcher.resource_type(identifier), self.document.as_ref())
        else {
            return false;
        };
        scope.clients.navigation.dispatch_will_send_request(
            scope.id(),
            identifier,
            new_request,
            Some(redirect_response),
        );
        if new_request.is_null {
            return false;
        }
        let fetch_context = FrameFetchContext::for_document(
            scope.id(),
            scope.context,
            scope.clients,
            load_type,
            document,
            Some(&self.request),
        );
        self.fetcher.can_access_redirect(
            resource_type,
            new_request,
            &ResourceLoaderOptions::default(),
            &fetch_context,
        )
    }
}

/// Inputs to the navigation policy decision.
pub(crate) struct NavigationPolicyCheck<'a> {
    pub request: &'a ResourceRequest,
    pub has_substitute_data: bool,
    pub check_content_security_policy: bool,
    pub navigation_type: NavigationType,
    pub policy: NavigationPolicy,
    pub replaces_current_history_item: bool,
    pub is_redirect: bool,
}

/// The parent's `frame-src`, the frame's `form-action` and then the
/// embedder. `false` means the navigation must not proceed in this frame.
pub(crate) fn should_continue_for_navigation_policy(
    scope: LoadScope<'_>,
    frame_document: Option<&mut Document>,
    check: &NavigationPolicyCheck<'_>,
) -> bool {
    if check.has_substitute_data {
        return true;
    }
    let redirect_status = if check.request.followed_redirect {
        RedirectStatus::DidRedirect
    } else {
        RedirectStatus::DidNotRedirect
    };

    if check.check_content_security_policy {
        let (allowed, violations) = {
            let tree = scope.context.frame_tree();
            match tree.parent(scope.id()).and_then(|parent| tree.snapshot(parent)) {
                Some(parent) => {
                    let policy = &parent.content_security_policy;
                    let allowed = policy.allow_child_frame_from_source(
                        &check.request.url,
                        redirect_status,
                        ReportingStatus::SendReport,
                    );
                    (allowed, policy.take_violations())
                }
                None => (true, Vec::new()),
            }
        };
        for violation in violations {
            scope.add_console_message(ConsoleMessage::security_error(violation.message));
        }
        if !allowed {
            // Blocked frames still fire a load event, like any cross-origin load.
            block_frame_load(scope, frame_document);
            return false;
        }
    }

    if check.navigation_type.is_form_submission()
        && let Some(document) = frame_document.as_deref()
        && !document.content_security_policy.allow_form_action(
            &check.request.url,
            redirect_status,
            ReportingStatus::SendReport,
        )
    {
        report_csp_violations(scope, &document.content_security_policy);
        return false;
    }

    let info = NavigationPolicyInfo {
        frame: scope.id(),
        request: check.request,
        navigation_type: check.navigation_type,
        default_policy: check.policy,
        replaces_current_history_item: check.replaces_current_history_item,
        is_redirect: check.is_redirect,
    };
    match scope.clients.navigation.decide_policy_for_navigation(&info) {
        NavigationPolicy::CurrentTab => true,
        NavigationPolicy::Ignore => false,
        policy => {
            debug!(
                "frame {} hands {} to the embedder as {policy:?}",
                scope.id(),
                check.request.url
            );
            scope
                .clients
                .navigation
                .load_url_externally(scope.id(), check.request, policy);
            false
        }
    }
}

/// Leaves the frame on a sandboxed copy of its current document and fires
/// the owner's load event once.
pub(crate) fn block_frame_load(scope: LoadScope<'_>, frame_document: Option<&mut Document>) {
    if let Some(document) = frame_document {
        document.enforce_sandbox_flags(SandboxFlags::ORIGIN);
    }
    let has_owner = {
        let mut tree = scope.context.frame_tree_mut();
        tree.update_snapshot(scope.id(), |snapshot| {
            snapshot.sandbox_flags |= SandboxFlags::ORIGIN;
            if !snapshot.security_origin.is_unique() {
                snapshot.security_origin = SecurityOrigin::create_unique();
            }
        });
        match tree.owner_mut(scope.id()) {
            Some(owner) => {
                owner.dispatch_load();
                true
            }
            None => false,
        }
    };
    if has_owner {
        scope.clients.lifecycle.dispatch_owner_load_event(scope.id());
    }
}

pub(crate) fn report_csp_violations(scope: LoadScope<'_>, policy: &ContentSecurityPolicy) {
    for violation in policy.take_violations() {
        scope.add_console_message(ConsoleMessage::security_error(violation.message));
    }
}

fn ancestor_urls(scope: LoadScope<'_>) -> Vec<Url> {
    let tree = scope.context.frame_tree();
    tree.ancestors(scope.id())
        .into_iter()
        .filter_map(|ancestor| tree.snapshot(ancestor).map(|snapshot| snapshot.url.clone()))
        .collect()
}

/// Sandbox flags from the owner element and parent document, plus the
/// parent's policy for `about:blank` children.
fn inherited_frame_state(
    scope: LoadScope<'_>,
    url: &Url,
) -> (SandboxFlags, Option<ContentSecurityPolicy>) {
    let tree = scope.context.frame_tree();
    let mut flags = tree
        .owner(scope.id())
        .map(|owner| owner.sandbox_flags)
        .unwrap_or_else(SandboxFlags::empty);
    let mut policy = None;
    if let Some(parent) = tree.parent(scope.id())
        && let Some(snapshot) = tree.snapshot(parent)
    {
        flags |= snapshot.sandbox_flags;
        if is_about_blank(url) {
            policy = Some(snapshot.content_security_policy.clone());
        }
    }
    (flags, policy)
}

fn can_show_mime_type(scope: LoadScope<'_>, mime_type: &str) -> bool {
    if is_supported_mime_type(mime_type) {
        return true;
    }
    !mime_type.is_empty() && plugin_supports(scope, mime_type)
}

fn plugin_supports(scope: LoadScope<'_>, mime_type: &str) -> bool {
    let permission = &scope.clients.permission;
    permission.supports_plugin_mime_type(mime_type)
        && permission.allow_plugins(scope.id(), scope.context.settings().plugins_enabled)
}
