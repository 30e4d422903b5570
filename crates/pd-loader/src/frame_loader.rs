//! Navigation for one frame.
//!
//! A `FrameLoader` picks the load type and moves a `DocumentLoader` from the
//! policy slot to the provisional slot, then commits it on first data. It
//! records history on commit and handles same-document navigations. It also
//! runs the completion check that fires `load` events. Anything that touches
//! another frame goes through the shared `LoaderContext`.

use crate::appcache::ApplicationCacheEvent;
use crate::appcache::ApplicationCacheEventTarget;
use crate::client::FrameClients;
use crate::client::NavigationPolicy;
use crate::client::NavigationType;
use crate::console::ConsoleMessage;
use crate::context::FrameTask;
use crate::context::LoaderContext;
use crate::context::NavigationDisablerForBeforeUnload;
use crate::context::UserGestureIndicator;
use crate::document::Document;
use crate::document::DocumentReadyState;
use crate::document_loader::DocumentLoader;
use crate::document_loader::LoadScope;
use crate::document_loader::LoadStep;
use crate::document_loader::MainResourceStart;
use crate::document_loader::NavigationPolicyCheck;
use crate::document_loader::ReceivedData;
use crate::document_loader::should_continue_for_navigation_policy;
use crate::frame_load_request::ClientRedirectPolicy;
use crate::frame_load_request::FormSubmission;
use crate::frame_load_request::FrameLoadRequest;
use crate::frame_load_request::FrameLoadType;
use crate::frame_load_request::SubstituteData;
use crate::frame_tree::FrameRef;
use crate::frame_tree::FrameSnapshot;
use crate::history::HistoryCommitType;
use crate::history::HistoryItem;
use crate::history::HistoryLoadType;
use crate::history::HistoryNavigationType;
use crate::mhtml::ArchiveResource;
use crate::progress::ProgressTracker;
use crate::scheduler::NavigationScheduler;
use crate::scheduler::ScheduledNavigation;
use crate::scheduler::ScheduledNavigationKind;
use crate::scheduler::redirect_delay;
use crate::scheduler::should_schedule_navigation;
use crate::state_machine::FrameLoaderState;
use crate::state_machine::FrameLoaderStateMachine;
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
use pd_net::FrameType;
use pd_net::HttpMethod;
use pd_net::RequestContext;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use pd_net::ResourceType;
use pd_net::http::parse_refresh;
use pd_net::url::about_blank;
use pd_net::url::equal_ignoring_fragment;
use pd_net::url::has_fragment;
use pd_net::url::is_javascript_url;
use pd_net::url::strip_fragment;
use pd_security::SecurityOrigin;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::rc::Weak;
use std::time::Instant;
use url::Url;

/// The three stages a navigation's loader passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    Committed,
    Provisional,
    Policy,
}

impl LoaderPhase {
    fn index(self) -> usize {
        match self {
            Self::Committed => 0,
            Self::Provisional => 1,
            Self::Policy => 2,
        }
    }
}

/// How a subresource request was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum SubresourceLoad {
    Fetching(ResourceId),
    /// Served from the committed document's web archive.
    Archived(ArchiveResource),
}

/// One slot per phase. Promotion moves a loader between slots, so a frame
/// never holds two committed loaders.
#[derive(Default)]
struct LoaderSlots {
    slots: [Option<DocumentLoader>; 3],
}

impl LoaderSlots {
    fn get(&self, phase: LoaderPhase) -> Option<&DocumentLoader> {
        self.slots[phase.index()].as_ref()
    }

    fn get_mut(&mut self, phase: LoaderPhase) -> Option<&mut DocumentLoader> {
        self.slots[phase.index()].as_mut()
    }

    fn take(&mut self, phase: LoaderPhase) -> Option<DocumentLoader> {
        self.slots[phase.index()].take()
    }

    fn set(&mut self, phase: LoaderPhase, loader: DocumentLoader) -> Option<DocumentLoader> {
        self.slots[phase.index()].replace(loader)
    }

    /// The loader in `phase` and the frame's current document, which the
    /// committed loader owns.
    fn split(&mut self, phase: LoaderPhase) -> Option<(&mut DocumentLoader, Option<&mut Document>)> {
        let [committed, provisional, policy] = &mut self.slots;
        match phase {
            LoaderPhase::Committed => committed.as_mut().map(|loader| (loader, None)),
            LoaderPhase::Provisional => {
                let document = committed.as_mut().and_then(DocumentLoader::document_mut);
                provisional.as_mut().map(|loader| (loader, document))
            }
            LoaderPhase::Policy => {
                let document = committed.as_mut().and_then(DocumentLoader::document_mut);
                policy.as_mut().map(|loader| (loader, document))
            }
        }
    }
}

struct FrameHandle {
    frame: FrameRef,
    context: Rc<LoaderContext>,
    clients: FrameClients,
}

impl FrameHandle {
    fn scope(&self) -> LoadScope<'_> {
        LoadScope {
            frame: self.frame,
            context: &self.context,
            clients: &self.clients,
        }
    }
}

pub struct FrameLoader {
    handle: FrameHandle,
    loaders: LoaderSlots,
    state_machine: FrameLoaderStateMachine,
    progress: ProgressTracker,
    scheduler: NavigationScheduler,
    load_type: FrameLoadType,
    current_item: Option<HistoryItem>,
    provisional_item: Option<HistoryItem>,
    in_stop_all_loaders: bool,
    awaiting_response: BTreeSet<ResourceId>,
    finish_notified: Option<LoaderId>,
}

impl FrameLoader {
    pub fn new(frame: FrameRef, context: Rc<LoaderContext>, clients: FrameClients) -> Self {
        let progress = ProgressTracker::new(frame.id, Rc::clone(&clients.lifecycle), context.clock());
        Self {
            handle: FrameHandle {
                frame,
                context,
                clients,
            },
            loaders: LoaderSlots::default(),
            state_machine: FrameLoaderStateMachine::new(),
            progress,
            scheduler: NavigationScheduler::new(frame.id),
            load_type: FrameLoadType::Standard,
            current_item: None,
            provisional_item: None,
            in_stop_all_loaders: false,
            awaiting_response: BTreeSet::new(),
            finish_notified: None,
        }
    }

    /// Gives the frame its initial `about:blank` document. The embedder
    /// hears nothing about it.
    pub fn init(&mut self) {
        let request = ResourceRequest::new(about_blank())
            .with_request_context(RequestContext::Internal)
            .with_frame_type(self.frame_type());
        let mut loader = DocumentLoader::new(&self.handle.context, request, None);
        let scope = self.handle.scope();
        match loader.start_loading_main_resource(scope, None, FrameLoadType::Standard) {
            MainResourceStart::Empty => {}
            other => warn!("initial document of frame {} started as {other:?}", scope.id()),
        }
        loader.set_committed();
        loader.finished_loading(scope, scope.context.now());
        if let Some(document) = loader.document_mut() {
            document.load_event_finished = true;
            document.set_ready_state(DocumentReadyState::Complete);
        }
        self.current_item = Some(HistoryItem::new(
            loader.url_for_history().clone(),
            scope.context.identifiers(),
        ));
        self.finish_notified = Some(loader.id());
        self.loaders.set(LoaderPhase::Committed, loader);
        self.state_machine
            .advance_to(FrameLoaderState::DisplayingInitialEmptyDocument);
        self.publish_snapshot();
    }

    pub fn id(&self) -> FrameId {
        self.handle.frame.id
    }

    pub fn frame(&self) -> FrameRef {
        self.handle.frame
    }

    pub fn context(&self) -> &Rc<LoaderContext> {
        &self.handle.context
    }

    pub fn document(&self) -> Option<&Document> {
        self.loaders
            .get(LoaderPhase::Committed)
            .and_then(DocumentLoader::document)
    }

    fn document_mut(&mut self) -> Option<&mut Document> {
        self.loaders
            .get_mut(LoaderPhase::Committed)
            .and_then(DocumentLoader::document_mut)
    }

    pub fn document_loader(&self) -> Option<&DocumentLoader> {
        self.loaders.get(LoaderPhase::Committed)
    }

    pub fn provisional_document_loader(&self) -> Option<&DocumentLoader> {
        self.loaders.get(LoaderPhase::Provisional)
    }

    pub fn policy_document_loader(&self) -> Option<&DocumentLoader> {
        self.loaders.get(LoaderPhase::Policy)
    }

    pub fn state_machine(&self) -> &FrameLoaderStateMachine {
        &self.state_machine
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn scheduler(&self) -> &NavigationScheduler {
        &self.scheduler
    }

    pub fn load_type(&self) -> FrameLoadType {
        self.load_type
    }

    pub fn current_item(&self) -> Option<&HistoryItem> {
        self.current_item.as_ref()
    }

    /// A provisional load, or anything the committed document still waits for.
    pub fn is_loading(&self) -> bool {
        self.loaders.get(LoaderPhase::Provisional).is_some()
            || self
                .loaders
                .get(LoaderPhase::Committed)
                .is_some_and(DocumentLoader::is_loading)
    }

    /// Nothing pending and the document reached `complete`.
    pub fn is_load_complete(&self) -> bool {
        self.loaders.get(LoaderPhase::Provisional).is_none()
            && self
                .document()
                .is_some_and(|document| document.ready_state == DocumentReadyState::Complete)
    }

    pub fn did_first_layout(&mut self) {
        self.progress.did_first_layout();
    }

    /// The single navigation entry point.
    pub fn load(
        &mut self,
        request: FrameLoadRequest,
        load_type: Option<FrameLoadType>,
        history_item: Option<HistoryItem>,
        history_load_type: HistoryLoadType,
    ) {
        if self.in_stop_all_loaders || !self.handle.scope().is_live() {
            return;
        }
        let url = request.url().clone();
        if is_javascript_url(url.as_str()) {
            let source = url.as_str().split_once(':').map_or("", |(_, source)| source);
            self.handle
                .clients
                .navigation
                .run_javascript_url(self.id(), source);
            return;
        }
        if let Some(origin) = &request.origin
            && !origin.can_display(&url, self.handle.context.scheme_registry())
        {
            self.handle.scope().add_console_message(ConsoleMessage::security_error(format!(
                "Not allowed to load local resource: {url}"
            )));
            return;
        }
        let policy = request.navigation_policy();
        if policy != NavigationPolicy::CurrentTab {
            self.handle.clients.navigation.load_url_externally(
                self.id(),
                &request.resource_request,
                policy,
            );
            return;
        }

        let load_type = load_type.unwrap_or_else(|| self.determine_frame_load_type(&request));
        let history_item = match (history_load_type, history_item) {
            (HistoryLoadType::SameDocument, Some(item)) => {
                let state_object = item.state_object().map(<[u8]>::to_vec);
                self.load_in_same_document(url, state_object, load_type, request.client_redirect, Some(item));
                return;
            }
            (_, item) => item,
        };
        let is_post_form =
            request.form.is_some() && request.resource_request.method == HttpMethod::Post;
        if self.should_perform_fragment_navigation(is_post_form, load_type, &url) {
            self.load_in_same_document(url, None, load_type, request.client_redirect, None);
            return;
        }
        self.start_load(request, load_type, history_item);
    }

    fn determine_frame_load_type(&self, request: &FrameLoadRequest) -> FrameLoadType {
        let has_parent = self
            .handle
            .context
            .frame_tree()
            .parent(self.id())
            .is_some();
        if has_parent && !self.state_machine.committed_first_real_document_load() {
            return FrameLoadType::InitialInChildFrame;
        }
        if !has_parent && self.handle.context.back_forward_list().is_empty() {
            return FrameLoadType::Standard;
        }
        let failing_url = request
            .substitute_data
            .as_ref()
            .and_then(|data| data.failing_url.as_ref());
        if self.load_type == FrameLoadType::BackForward
            && let Some(provisional) = self.loaders.get(LoaderPhase::Provisional)
            && failing_url == Some(provisional.url())
        {
            return FrameLoadType::BackForward;
        }
        match request.resource_request.cache_policy {
            CachePolicy::ReloadIgnoringCacheData => return FrameLoadType::Reload,
            CachePolicy::ReloadBypassingCache => return FrameLoadType::ReloadFromOrigin,
            _ => {}
        }
        if request.lock_back_forward_list {
            return FrameLoadType::RedirectWithLockedBackForwardList;
        }
        let url_for_history = self
            .loaders
            .get(LoaderPhase::Committed)
            .map(DocumentLoader::url_for_history);
        if request.origin.is_none() && url_for_history == Some(request.url()) {
            return FrameLoadType::Same;
        }
        if failing_url.is_some() && failing_url == url_for_history && self.load_type == FrameLoadType::Reload {
            return FrameLoadType::Reload;
        }
        FrameLoadType::Standard
    }

    fn should_perform_fragment_navigation(&self, is_post_form: bool, load_type: FrameLoadType, url: &Url) -> bool {
        !is_post_form
            && !load_type.is_reload()
            && !load_type.is_back_forward()
            && load_type != FrameLoadType::Same
            && has_fragment(url)
            && self
                .document()
                .is_some_and(|document| equal_ignoring_fragment(&document.url, url))
    }

    fn frame_type(&self) -> FrameType {
        if self.handle.scope().is_main_frame() {
            FrameType::TopLevel
        } else {
            FrameType::Nested
        }
    }

    fn first_party_for_cookies(&self, url: &Url) -> Url {
        let tree = self.handle.context.frame_tree();
        let top = tree.top(self.id());
        if top == self.id() {
            return url.clone();
        }
        tree.snapshot(top)
            .map_or_else(|| url.clone(), |snapshot| snapshot.url.clone())
    }

    fn start_load(&mut self, request: FrameLoadRequest, load_type: FrameLoadType, history_item: Option<HistoryItem>) {
        let FrameLoadRequest {
            origin,
            mut resource_request,
            substitute_data,
            lock_back_forward_list,
            client_redirect,
            form,
            should_check_main_world_csp,
            triggering_event,
        } = request;
        let id = self.id();
        let is_client_redirect = client_redirect == ClientRedirectPolicy::ClientRedirect;

        let is_post = resource_request.method == HttpMethod::Post;
        let navigation_type = if is_post && (load_type.is_reload() || load_type.is_back_forward()) {
            NavigationType::FormResubmitted
        } else if form.is_some() {
            NavigationType::FormSubmitted
        } else if triggering_event.is_some() {
            NavigationType::LinkClicked
        } else if load_type.is_reload() {
            NavigationType::Reload
        } else if load_type.is_back_forward() {
            NavigationType::BackForward
        } else {
            NavigationType::Other
        };
        if resource_request.request_context == RequestContext::Unspecified {
            resource_request.request_context = match navigation_type {
                NavigationType::LinkClicked => RequestContext::Hyperlink,
                NavigationType::FormSubmitted | NavigationType::FormResubmitted => RequestContext::Form,
                _ => RequestContext::Location,
            };
        }
        if resource_request.frame_type == FrameType::None {
            resource_request.frame_type = self.frame_type();
        }
        resource_request.has_user_gesture = self.handle.context.processing_user_gesture();
        if resource_request.first_party_for_cookies.is_none() {
            resource_request.first_party_for_cookies =
                Some(self.first_party_for_cookies(&resource_request.url));
        }
        if resource_request.referrer.is_none() && origin.is_some() {
            // No referrer when leaving a secure page for an insecure one.
            let downgrade = resource_request.url.scheme() == "http";
            resource_request.referrer = self
                .document()
                .filter(|document| !(downgrade && document.url.scheme() == "https"))
                .map(|document| strip_fragment(&document.url));
        }

        let mut loader = DocumentLoader::new(&self.handle.context, resource_request, substitute_data);
        loader.set_navigation_type(navigation_type);
        loader.set_is_client_redirect(is_client_redirect);
        loader.set_replaces_current_history_item(
            lock_back_forward_list || load_type == FrameLoadType::RedirectWithLockedBackForwardList,
        );
        loader.set_requester_origin(origin);
        if let Some(replaced) = self.loaders.set(LoaderPhase::Policy, loader) {
            debug!("frame {id} dropped pending navigation to {}", replaced.url());
        }

        let allowed = {
            let scope = self.handle.scope();
            match self.loaders.split(LoaderPhase::Policy) {
                Some((loader, frame_document)) => {
                    let check = NavigationPolicyCheck {
                        request: loader.request(),
                        has_substitute_data: loader.substitute_data().is_some(),
                        check_content_security_policy: should_check_main_world_csp,
                        navigation_type,
                        policy: NavigationPolicy::CurrentTab,
                        replaces_current_history_item: loader.replaces_current_history_item(),
                        is_redirect: false,
                    };
                    should_continue_for_navigation_policy(scope, frame_document, &check)
                }
                None => false,
            }
        };
        if !allowed || !self.handle.scope().is_live() {
            self.loaders.take(LoaderPhase::Policy);
            return;
        }
        if !self.should_close(load_type.is_reload()) {
            self.loaders.take(LoaderPhase::Policy);
            return;
        }

        if let Some(document) = self.document_mut()
            && document.parsing
        {
            document.stop_parsing();
        }
        self.stop_provisional_load();
        let Some(mut loader) = self.loaders.take(LoaderPhase::Policy) else {
            return;
        };
        self.load_type = load_type;
        self.provisional_item = history_item;
        if loader.is_client_redirect()
            && let Some(current) = self.document().map(|document| document.url.clone())
        {
            loader.append_redirect(current);
        }
        loader.append_redirect(loader.request().url.clone());
        let url = loader.request().url.clone();
        let loader_id = loader.id();
        self.loaders.set(LoaderPhase::Provisional, loader);

        self.scheduler.cancel();
        self.progress.progress_started();
        if let Some(form) = &form {
            self.handle.clients.navigation.dispatch_will_submit_form(id, form);
        }
        self.handle
            .clients
            .lifecycle
            .dispatch_did_start_provisional_load(id, &url);
        if !self.handle.scope().is_live() {
            return;
        }
        self.publish_snapshot();

        let start = {
            let scope = self.handle.scope();
            match self.loaders.split(LoaderPhase::Provisional) {
                Some((loader, frame_document)) => {
                    loader.start_loading_main_resource(scope, frame_document, load_type)
                }
                None => return,
            }
        };
        match start {
            MainResourceStart::Fetching(identifier) => {
                debug!("frame {id} provisional load {identifier} for {url}");
            }
            MainResourceStart::Empty => self.main_resource_finished(LoaderPhase::Provisional, None),
            MainResourceStart::Substitute { response, data } => {
                self.main_resource_response(LoaderPhase::Provisional, response);
                if !data.is_empty()
                    && let Some(phase) = self.phase_of(loader_id)
                {
                    self.main_resource_data(phase, &data);
                }
                if let Some(phase) = self.phase_of(loader_id) {
                    self.main_resource_finished(phase, None);
                }
            }
            MainResourceStart::Abandoned => {}
            MainResourceStart::Failed(error) => {
                self.received_main_resource_error(LoaderPhase::Provisional, error);
            }
        }
    }

    /// Runs `beforeunload` in this frame and below. False keeps the
    /// current document.
    fn should_close(&mut self, is_reload: bool) -> bool {
        if !self.state_machine.committed_first_real_document_load() {
            return true;
        }
        let frames: Vec<FrameId> = {
            let tree = self.handle.context.frame_tree();
            std::iter::once(self.id())
                .chain(tree.descendants(self.id()))
                .collect()
        };
        let _disabler = NavigationDisablerForBeforeUnload::new(&self.handle.context);
        for frame in frames {
            if !self
                .handle
                .clients
                .navigation
                .dispatch_before_unload(frame, is_reload)
            {
                info!("frame {frame} kept its document from beforeunload");
                return false;
            }
            if !self.handle.scope().is_live() {
                return false;
            }
        }
        true
    }

    fn stop_provisional_load(&mut self) {
        let Some(mut loader) = self.loaders.take(LoaderPhase::Provisional) else {
            return;
        };
        if let Some(identifier) = loader.main_resource_identifier() {
            self.progress.complete_progress(identifier);
        }
        if let Some(error) = loader.detach_from_frame() {
            let commit_type = self.history_commit_type();
            self.handle
                .clients
                .lifecycle
                .dispatch_did_fail_provisional_load(self.id(), &error, commit_type);
        }
        self.provisional_item = None;
    }

    fn phase_of(&self, loader: LoaderId) -> Option<LoaderPhase> {
        [LoaderPhase::Provisional, LoaderPhase::Committed]
            .into_iter()
            .find(|phase| {
                self.loaders.get(*phase).is_some_and(|candidate| {
                    candidate.id() == loader && candidate.is_loading_main_resource()
                })
            })
    }

    fn main_resource_phase(&self, identifier: ResourceId) -> Option<LoaderPhase> {
        [LoaderPhase::Provisional, LoaderPhase::Committed]
            .into_iter()
            .find(|phase| {
                self.loaders.get(*phase).is_some_and(|loader| {
                    loader.main_resource_identifier() == Some(identifier)
                        && loader.is_loading_main_resource()
                })
            })
    }

    /// Whether a network callback for `identifier` belongs to this frame.
    pub fn owns_resource(&self, identifier: ResourceId) -> bool {
        self.main_resource_phase(identifier).is_some()
            || self
                .loaders
                .get(LoaderPhase::Committed)
                .is_some_and(|loader| loader.fetcher().contains(identifier))
    }

    /// Server redirect for one of this frame's requests. Returns whether
    /// the network layer should follow it.
    pub fn did_receive_redirect(
        &mut self,
        identifier: ResourceId,
        new_request: &mut ResourceRequest,
        redirect_response: &ResourceResponse,
    ) -> bool {
        let load_type = self.load_type;
        if let Some(phase) = self.main_resource_phase(identifier) {
            let step = {
                let scope = self.handle.scope();
                let Some((loader, frame_document)) = self.loaders.split(phase) else {
                    return false;
                };
                loader.redirect_received(scope, frame_document, load_type, new_request, redirect_response)
            };
            return match step {
                LoadStep::Continue => {
                    self.scheduler.cancel();
                    true
                }
                LoadStep::Abandoned => false,
                LoadStep::Failed(error) => {
                    self.received_main_resource_error(phase, error);
                    false
                }
            };
        }

        let allowed = {
            let scope = self.handle.scope();
            self.loaders
                .get_mut(LoaderPhase::Committed)
                .is_some_and(|loader| {
                    loader.subresource_redirect_allowed(
                        scope,
                        load_type,
                        identifier,
                        new_request,
                        redirect_response,
                    )
                })
        };
        if !allowed {
            warn!("frame {} refused redirect of {identifier} to {}", self.id(), new_request.url);
            self.subresource_done(identifier);
        }
        allowed
    }

    pub fn did_receive_response(&mut self, identifier: ResourceId, response: ResourceResponse) {
        if let Some(phase) = self.main_resource_phase(identifier) {
            self.main_resource_response(phase, response);
            return;
        }
        if !self.awaiting_response.remove(&identifier) {
            return;
        }
        self.progress
            .increment_progress_for_response(identifier, &response);
        self.handle
            .clients
            .lifecycle
            .dispatch_did_receive_response(self.id(), identifier, &response);
    }

    pub fn did_receive_data(&mut self, identifier: ResourceId, data: &[u8]) {
        if let Some(phase) = self.main_resource_phase(identifier) {
            self.main_resource_data(phase, data);
            return;
        }
        if self
            .loaders
            .get(LoaderPhase::Committed)
            .is_some_and(|loader| loader.fetcher().contains(identifier))
        {
            let pending = self.awaiting_response.len();
            self.progress
                .increment_progress(identifier, data.len() as u64, pending);
        }
    }

    pub fn did_finish_loading(&mut self, identifier: ResourceId, finish_time: Instant) {
        if let Some(phase) = self.main_resource_phase(identifier) {
            self.main_resource_finished(phase, Some(finish_time));
            return;
        }
        self.subresource_done(identifier);
    }

    pub fn did_fail(&mut self, identifier: ResourceId, error: ResourceError) {
        if let Some(phase) = self.main_resource_phase(identifier) {
            let error = self.loaders.get_mut(phase).and_then(|loader| {
                loader.fetcher_mut().did_complete(identifier);
                loader.main_received_error(error)
            });
            if let Some(error) = error {
                self.received_main_resource_error(phase, error);
            }
            return;
        }
        debug!("frame {} subresource {identifier} failed: {error}", self.id());
        self.subresource_done(identifier);
    }

    fn main_resource_response(&mut self, phase: LoaderPhase, response: ResourceResponse) {
        let (step, identifier) = {
            let scope = self.handle.scope();
            let Some((loader, frame_document)) = self.loaders.split(phase) else {
                return;
            };
            let identifier = loader.main_resource_identifier();
            (loader.response_received(scope, frame_document, response), identifier)
        };
        match step {
            LoadStep::Continue => {
                if let Some(identifier) = identifier
                    && let Some(response) = self.loaders.get(phase).and_then(DocumentLoader::response)
                {
                    self.progress
                        .increment_progress_for_response(identifier, response);
                    self.handle
                        .clients
                        .lifecycle
                        .dispatch_did_receive_response(self.handle.frame.id, identifier, response);
                }
            }
            LoadStep::Abandoned => {}
            LoadStep::Failed(error) => self.received_main_resource_error(phase, error),
        }
    }

    fn main_resource_data(&mut self, phase: LoaderPhase, data: &[u8]) {
        let now = self.handle.context.now();
        let Some(loader) = self.loaders.get_mut(phase) else {
            return;
        };
        let identifier = loader.main_resource_identifier();
        match loader.data_received(data, now) {
            ReceivedData::Buffered => {}
            ReceivedData::NeedsCommit => {
                if !self.commit_provisional_load() {
                    return;
                }
                self.write_main_resource_data(data);
            }
            ReceivedData::Ready => self.write_main_resource_data(data),
        }
        if let Some(identifier) = identifier {
            let pending = self.awaiting_response.len();
            self.progress
                .increment_progress(identifier, data.len() as u64, pending);
        }
    }

    fn write_main_resource_data(&mut self, data: &[u8]) {
        let began = {
            let scope = self.handle.scope();
            match self.loaders.get_mut(LoaderPhase::Committed) {
                Some(loader) => loader.commit_data(scope, data),
                None => return,
            }
        };
        if began {
            self.received_first_data();
            if !self.handle.scope().is_live() {
                return;
            }
        }
        self.reload_if_application_cache_refused();
        if self.document().is_some_and(Document::is_media_document) {
            // Media documents load their content through the media element.
            if let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) {
                loader.fetcher_mut().cancel_main_resource();
            }
            self.main_resource_finished(LoaderPhase::Committed, None);
        }
    }

    fn main_resource_finished(&mut self, phase: LoaderPhase, finish_time: Option<Instant>) {
        if phase != LoaderPhase::Committed && !self.commit_provisional_load() {
            return;
        }
        let finish_time = finish_time.unwrap_or_else(|| self.handle.context.now());
        let (began, identifier, failed) = {
            let scope = self.handle.scope();
            let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) else {
                return;
            };
            let began = loader.finished_loading(scope, finish_time);
            (
                began,
                loader.main_resource_identifier(),
                loader.main_document_error().is_some(),
            )
        };
        if began {
            self.received_first_data();
            if !self.handle.scope().is_live() {
                return;
            }
        }
        self.reload_if_application_cache_refused();
        if let Some(identifier) = identifier {
            self.progress.complete_progress(identifier);
        }
        if failed {
            return;
        }
        self.handle
            .clients
            .lifecycle
            .dispatch_did_finish_document_load(self.id());
        self.publish_snapshot();
        self.check_completed();
    }

    /// The cache refused the manifest's cached copy, so fetch the document
    /// again from the network.
    fn reload_if_application_cache_refused(&mut self) {
        let refused = self
            .loaders
            .get_mut(LoaderPhase::Committed)
            .is_some_and(DocumentLoader::take_application_cache_reload);
        if !refused {
            return;
        }
        if let Some(url) = self.document().map(|document| document.url.clone()) {
            self.schedule_location_change(None, url, true);
        }
    }

    /// Routes an application cache event to the newest loader: the
    /// provisional one while a navigation is in flight.
    pub fn notify_application_cache(&mut self, event: ApplicationCacheEvent) {
        let phase = if self.loaders.get(LoaderPhase::Provisional).is_some() {
            LoaderPhase::Provisional
        } else {
            LoaderPhase::Committed
        };
        match self.loaders.get_mut(phase) {
            Some(loader) => loader
                .application_cache_host_mut()
                .notify_application_cache(event),
            None => debug!(
                "frame {} dropped application cache event {:?}",
                self.id(),
                event.id
            ),
        }
    }

    /// Attaches the current document's `applicationCache` object.
    pub fn set_application_cache(&mut self, target: Weak<dyn ApplicationCacheEventTarget>) {
        if let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) {
            loader.application_cache_host_mut().set_application_cache(target);
        }
    }

    /// Promotes the provisional loader. False when there is none or the
    /// frame went away while the outgoing document unloaded.
    pub fn commit_provisional_load(&mut self) -> bool {
        if self.loaders.get(LoaderPhase::Provisional).is_none() || !self.prepare_for_commit() {
            return false;
        }
        let Some(mut loader) = self.loaders.take(LoaderPhase::Provisional) else {
            return false;
        };
        loader.set_committed();
        debug!("frame {} committed {}", self.id(), loader.url());
        self.loaders.set(LoaderPhase::Committed, loader);

        if !self.state_machine.committed_first_real_document_load() {
            self.state_machine
                .advance_to(FrameLoaderState::CommittedFirstRealLoad);
        } else if !self.state_machine.committed_multiple_real_loads() {
            self.state_machine
                .advance_to(FrameLoaderState::CommittedMultipleRealLoads);
        }
        self.scheduler.cancel();
        true
    }

    /// Unloads the outgoing document and drops its loader and child frames.
    fn prepare_for_commit(&mut self) -> bool {
        let id = self.id();
        let same_origin = match (self.document(), self.loaders.get(LoaderPhase::Provisional)) {
            (Some(document), Some(provisional)) => {
                SecurityOrigin::create(provisional.url(), self.handle.context.scheme_registry())
                    .is_same_scheme_host_port(&document.security_origin)
            }
            _ => false,
        };
        if let Some(provisional) = self.loaders.get_mut(LoaderPhase::Provisional) {
            provisional
                .timing_mut()
                .set_has_same_origin_as_previous_document(same_origin);
        }

        let lifecycle = Rc::clone(&self.handle.clients.lifecycle);
        lifecycle.dispatch_will_close(id);
        lifecycle.dispatch_unload_event(id);
        if !self.handle.scope().is_live() {
            return false;
        }

        let children = self.handle.context.frame_tree().children(id);
        for child in children {
            self.handle.context.detach_frame(child);
        }
        if let Some(mut previous) = self.loaders.take(LoaderPhase::Committed)
            && let Some(error) = previous.detach_from_frame()
        {
            debug!("frame {id} dropped the outgoing document's loads: {error}");
        }
        self.awaiting_response.clear();
        true
    }

    fn received_first_data(&mut self) {
        let id = self.id();
        let commit_type = self.history_commit_type();
        let is_main_frame = self.handle.scope().is_main_frame();
        let Some(loader) = self.loaders.get(LoaderPhase::Committed) else {
            return;
        };
        let item = match (commit_type, self.provisional_item.take()) {
            (HistoryCommitType::BackForward, Some(item)) => item,
            _ => {
                let mut item = HistoryItem::new(
                    loader.url_for_history().clone(),
                    self.handle.context.identifiers(),
                );
                item.set_referrer(loader.request().referrer.clone());
                item.set_form_info_from_request(loader.original_request());
                if let Some(name) = self.handle.context.frame_tree().name(id) {
                    item.set_target(name);
                }
                item
            }
        };
        let replaces = loader.replaces_current_history_item();

        if is_main_frame {
            let mut list = self.handle.context.back_forward_list_mut();
            match commit_type {
                HistoryCommitType::Standard if !replaces => list.add_item(item.clone()),
                HistoryCommitType::Standard | HistoryCommitType::HistoryInert => {
                    list.replace_current_item(item.clone());
                }
                HistoryCommitType::BackForward | HistoryCommitType::InitialInChildFrame => {}
            }
        }
        self.handle
            .clients
            .lifecycle
            .dispatch_did_commit_load(id, &item, commit_type);
        self.current_item = Some(item);
        if !self.handle.scope().is_live() {
            return;
        }
        self.publish_snapshot();
        self.process_refresh_header();
    }

    fn process_refresh_header(&mut self) {
        let Some(directive) = self
            .loaders
            .get(LoaderPhase::Committed)
            .and_then(DocumentLoader::response)
            .and_then(|response| response.header("Refresh"))
            .and_then(parse_refresh)
        else {
            return;
        };
        let target = match directive.url.as_deref() {
            None => self.document().map(|document| document.url.clone()),
            Some(input) if is_javascript_url(input) => {
                self.handle.scope().add_console_message(ConsoleMessage::security_error(format!(
                    "Refused to refresh {} to a javascript: URL",
                    self.document().map_or_else(String::new, |document| document.url.to_string())
                )));
                None
            }
            Some(input) => match self.document().map(|document| document.complete_url(input)) {
                Some(Ok(url)) => Some(url),
                Some(Err(error)) => {
                    warn!("frame {} ignored refresh target {input}: {error}", self.id());
                    None
                }
                None => None,
            },
        };
        if let Some(target) = target {
            self.schedule_redirect(directive.delay_seconds, target);
        }
    }

    /// The single place a failed or cancelled main resource is reported.
    pub fn received_main_resource_error(&mut self, phase: LoaderPhase, error: ResourceError) {
        let id = self.id();
        if let Some(loader) = self.loaders.get_mut(phase) {
            if let Some(identifier) = loader.main_resource_identifier() {
                self.progress.complete_progress(identifier);
            }
            if let Some(document) = loader.document_mut()
                && document.parsing
            {
                document.stop_parsing();
            }
        }
        if !error.is_cancellation() {
            let rendered = self
                .handle
                .context
                .frame_tree_mut()
                .owner_mut(id)
                .is_some_and(|owner| owner.render_fallback_content());
            if rendered {
                debug!("frame {id} owner renders fallback content after {error}");
            }
        }

        let commit_type = self.history_commit_type();
        match phase {
            LoaderPhase::Committed => {
                if self.loaders.get(LoaderPhase::Provisional).is_none() && self.progress.is_loading() {
                    self.finish_notified = self.loaders.get(phase).map(DocumentLoader::id);
                    self.handle
                        .clients
                        .lifecycle
                        .dispatch_did_fail_load(id, &error, commit_type);
                    self.load_type = FrameLoadType::Standard;
                    self.progress.progress_completed();
                }
            }
            LoaderPhase::Provisional | LoaderPhase::Policy => {
                self.handle
                    .clients
                    .lifecycle
                    .dispatch_did_fail_provisional_load(id, &error, commit_type);
                if !self.handle.scope().is_live() {
                    return;
                }
                if let Some(mut loader) = self.loaders.take(phase) {
                    loader.detach_from_frame();
                }
                self.provisional_item = None;
                if !error.is_cancellation() {
                    self.load_error_page(&error);
                }
            }
        }
        self.publish_snapshot();
        self.check_completed();
    }

    fn load_error_page(&self, error: &ResourceError) {
        let Some(failing_url) = error.failing_url.clone() else {
            return;
        };
        let Some(html) = self
            .handle
            .clients
            .navigation
            .error_page_html(self.id(), error)
        else {
            return;
        };
        let data = SubstituteData::new(html.into_bytes(), "text/html", "UTF-8")
            .with_failing_url(failing_url.clone());
        self.handle.context.request_navigation(
            self.id(),
            FrameLoadRequest::from_url(failing_url).with_substitute_data(data),
        );
    }

    /// Fires `load` and the finish notifications once the document, its
    /// subresources and every child frame are done.
    pub fn check_completed(&mut self) {
        let id = self.id();
        if !self.handle.scope().is_live() {
            return;
        }
        let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) else {
            return;
        };
        let loader_id = loader.id();
        if loader.is_loading_main_resource() || loader.fetcher().request_count() > 0 {
            return;
        }
        let Some(document) = loader.document_mut() else {
            return;
        };
        if document.parsing || !self.handle.context.frame_tree().all_descendants_are_complete(id) {
            return;
        }
        document.set_ready_state(DocumentReadyState::Complete);
        let load_event_needed = !document.load_event_finished;
        document.load_event_finished = true;

        if load_event_needed {
            self.publish_snapshot();
            self.handle
                .clients
                .lifecycle
                .dispatch_document_load_event(id);
            if !self.handle.scope().is_live() {
                return;
            }
            if let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) {
                loader.application_cache_host_mut().stop_deferring_events();
            }
            let has_owner = match self.handle.context.frame_tree_mut().owner_mut(id) {
                Some(owner) => {
                    owner.dispatch_load();
                    true
                }
                None => false,
            };
            if has_owner {
                self.handle.clients.lifecycle.dispatch_owner_load_event(id);
                if !self.handle.scope().is_live() {
                    return;
                }
            }
        }

        let now = self.handle.context.now();
        self.scheduler.start_timer(now, true);

        let no_provisional = self.loaders.get(LoaderPhase::Provisional).is_none();
        if no_provisional && self.finish_notified != Some(loader_id) {
            self.finish_notified = Some(loader_id);
            self.handle.clients.lifecycle.dispatch_did_finish_load(id);
            if !self.handle.scope().is_live() {
                return;
            }
        }
        if no_provisional && self.progress.is_loading() {
            self.load_type = FrameLoadType::Standard;
            self.progress.progress_completed();
        }
        self.publish_snapshot();

        let parent = self.handle.context.frame_tree().parent(id);
        if let Some(parent) = parent {
            self.handle
                .context
                .post_task(FrameTask::CheckCompleted(parent));
        }
    }

    /// Cancels every load in this frame and asks child frames to do the same.
    pub fn stop_all_loaders(&mut self) {
        if self.in_stop_all_loaders {
            return;
        }
        self.in_stop_all_loaders = true;

        let children = self.handle.context.frame_tree().children(self.id());
        for child in children {
            self.handle.context.request_stop(child);
        }
        if let Some(mut loader) = self.loaders.take(LoaderPhase::Policy) {
            loader.detach_from_frame();
        }
        let provisional_error = self
            .loaders
            .get_mut(LoaderPhase::Provisional)
            .and_then(DocumentLoader::stop_loading);
        match provisional_error {
            Some(error) => self.received_main_resource_error(LoaderPhase::Provisional, error),
            None => self.stop_provisional_load(),
        }
        let committed_error = self
            .loaders
            .get_mut(LoaderPhase::Committed)
            .and_then(DocumentLoader::stop_loading);
        if let Some(error) = committed_error {
            self.received_main_resource_error(LoaderPhase::Committed, error);
        }
        self.awaiting_response.clear();

        self.in_stop_all_loaders = false;
        self.check_completed();
    }

    /// Tears the loader down after its frame left the tree.
    pub fn detach(&mut self) {
        self.scheduler.cancel();
        for phase in [LoaderPhase::Policy, LoaderPhase::Provisional, LoaderPhase::Committed] {
            if let Some(mut loader) = self.loaders.take(phase)
                && let Some(error) = loader.detach_from_frame()
            {
                debug!("frame {} detached during {phase:?} load: {error}", self.id());
            }
        }
        self.awaiting_response.clear();
        self.progress.dispose();
    }

    /// Reloads the current entry. `end_to_end` bypasses every cache.
    pub fn reload(&mut self, end_to_end: bool, client_redirect: ClientRedirectPolicy) {
        let Some(loader) = self.loaders.get(LoaderPhase::Committed) else {
            return;
        };
        let url = loader.url_for_history().clone();
        let original = loader.original_request();
        let cache_policy = if end_to_end {
            CachePolicy::ReloadBypassingCache
        } else {
            CachePolicy::ReloadIgnoringCacheData
        };
        let mut request = ResourceRequest::new(url).with_cache_policy(cache_policy);
        request.method = original.method;
        request.body = original.body.clone();
        if let Some(value) = original.header("Content-Type")
            && let Err(error) = request.headers.set("Content-Type", value)
        {
            warn!("frame {} reloads without its content type: {error}", self.id());
        }
        let load_type = if end_to_end {
            FrameLoadType::ReloadFromOrigin
        } else {
            FrameLoadType::Reload
        };
        let request = FrameLoadRequest::new(request).with_client_redirect(client_redirect);
        self.load(request, Some(load_type), None, HistoryLoadType::DifferentDocument);
    }

    /// Navigates to a session history entry.
    pub fn load_history_item(&mut self, item: HistoryItem) {
        let same_document = self
            .current_item
            .as_ref()
            .is_some_and(|current| current.should_do_same_document_navigation_to(&item));
        if same_document {
            let request = FrameLoadRequest::from_url(item.url().clone());
            self.load(
                request,
                Some(FrameLoadType::BackForward),
                Some(item),
                HistoryLoadType::SameDocument,
            );
            return;
        }

        let mut request = ResourceRequest::new(item.url().clone())
            .with_cache_policy(CachePolicy::ReturnCacheDataElseLoad);
        request.referrer = item.referrer().cloned();
        if let Some(data) = item.form_data() {
            request.method = HttpMethod::Post;
            request.body = Some(data.to_vec());
            if let Some(content_type) = item.form_content_type()
                && let Err(error) = request.headers.set("Content-Type", content_type)
            {
                warn!("history entry {} lost its content type: {error}", item.url());
            }
        }
        self.load(
            FrameLoadRequest::new(request),
            Some(FrameLoadType::BackForward),
            Some(item),
            HistoryLoadType::DifferentDocument,
        );
    }

    fn load_in_same_document(
        &mut self,
        url: Url,
        state_object: Option<Vec<u8>>,
        load_type: FrameLoadType,
        client_redirect: ClientRedirectPolicy,
        history_item: Option<HistoryItem>,
    ) {
        // A fragment navigation abandons any load of another document.
        self.stop_provisional_load();
        self.load_type = load_type;
        if let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) {
            loader.set_is_client_redirect(client_redirect == ClientRedirectPolicy::ClientRedirect);
        }
        let commit_type = self.history_commit_type();
        self.commit_same_document(
            url,
            state_object,
            commit_type,
            HistoryNavigationType::Fragment,
            history_item,
        );
        if self.progress.is_loading() {
            self.check_completed();
        }
    }

    pub fn push_state(&mut self, url: Url, state_object: Option<Vec<u8>>) -> BrowserResult<()> {
        self.navigate_with_history_api(url, state_object, HistoryCommitType::Standard)
    }

    pub fn replace_state(&mut self, url: Url, state_object: Option<Vec<u8>>) -> BrowserResult<()> {
        self.navigate_with_history_api(url, state_object, HistoryCommitType::HistoryInert)
    }

    fn navigate_with_history_api(
        &mut self,
        url: Url,
        state_object: Option<Vec<u8>>,
        commit_type: HistoryCommitType,
    ) -> BrowserResult<()> {
        let Some(document) = self.document() else {
            return Err(BrowserError::new(
                "loader.no_document",
                format!("frame {} has no document", self.id()),
            ));
        };
        if !document
            .security_origin
            .can_request(&url, self.handle.context.scheme_registry())
        {
            return Err(BrowserError::new(
                "loader.history.security",
                format!(
                    "a history state object with URL '{url}' cannot be created in a document with URL '{}'",
                    document.url
                ),
            ));
        }
        self.commit_same_document(
            url,
            state_object,
            commit_type,
            HistoryNavigationType::HistoryApi,
            None,
        );
        Ok(())
    }

    fn commit_same_document(
        &mut self,
        url: Url,
        state_object: Option<Vec<u8>>,
        commit_type: HistoryCommitType,
        navigation: HistoryNavigationType,
        history_item: Option<HistoryItem>,
    ) {
        let id = self.id();
        let is_main_frame = self.handle.scope().is_main_frame();
        let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) else {
            return;
        };
        loader.update_for_same_document_navigation(
            url.clone(),
            navigation == HistoryNavigationType::HistoryApi,
        );
        if let Some(document) = loader.document_mut() {
            document.state_object = state_object
                .as_deref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        }

        let item = match history_item {
            Some(item) => item,
            None => {
                let mut item = HistoryItem::new(url.clone(), self.handle.context.identifiers());
                if let Some(current) = &self.current_item {
                    item.set_document_sequence_number(current.document_sequence_number());
                    item.set_referrer(current.referrer().cloned());
                    item.set_target(current.target());
                    item.set_scroll_restoration(current.scroll_restoration());
                    if commit_type == HistoryCommitType::HistoryInert {
                        item.set_item_sequence_number(current.item_sequence_number());
                    }
                }
                item.set_state_object(state_object);
                item
            }
        };
        if is_main_frame {
            let mut list = self.handle.context.back_forward_list_mut();
            match commit_type {
                HistoryCommitType::Standard => list.add_item(item.clone()),
                HistoryCommitType::HistoryInert => list.replace_current_item(item.clone()),
                HistoryCommitType::BackForward | HistoryCommitType::InitialInChildFrame => {}
            }
        }
        debug!("frame {id} navigated within the page to {url} ({navigation:?})");
        self.handle
            .clients
            .lifecycle
            .dispatch_did_navigate_within_page(id, &item, commit_type);
        self.current_item = Some(item);
        if self.handle.scope().is_live() {
            self.publish_snapshot();
        }
    }

    /// Schedules a `Refresh`-style redirect. A pending navigation that
    /// fires sooner is kept.
    pub fn schedule_redirect(&mut self, delay_seconds: f64, url: Url) {
        if !should_schedule_navigation(&self.handle.context, self.id(), &url) {
            return;
        }
        let Some(delay) = redirect_delay(delay_seconds) else {
            debug!("frame {} ignored refresh delay {delay_seconds}", self.id());
            return;
        };
        if !self.scheduler.should_replace_with_redirect(delay) {
            return;
        }
        let origin = self
            .document()
            .map(|document| document.security_origin.clone());
        self.schedule_navigation(ScheduledNavigation::redirect(delay, url, origin));
    }

    pub fn schedule_location_change(
        &mut self,
        origin: Option<SecurityOrigin>,
        url: Url,
        lock_back_forward_list: bool,
    ) {
        if !should_schedule_navigation(&self.handle.context, self.id(), &url) {
            return;
        }
        let lock = lock_back_forward_list || self.must_lock_back_forward_list();

        // Fragment changes need no fetch and happen right away.
        if let Some(requester) = &origin
            && has_fragment(&url)
            && self.document().is_some_and(|document| {
                requester.can_access(&document.security_origin)
                    && equal_ignoring_fragment(&document.url, &url)
            })
        {
            let request = FrameLoadRequest::from_url(url)
                .with_origin(requester.clone())
                .with_lock_back_forward_list(lock)
                .with_client_redirect(ClientRedirectPolicy::ClientRedirect);
            self.load(request, None, None, HistoryLoadType::DifferentDocument);
            return;
        }
        let gesture = self.handle.context.processing_user_gesture();
        self.schedule_navigation(
            ScheduledNavigation::location_change(url, origin, lock).with_user_gesture(gesture),
        );
    }

    pub fn schedule_form_submission(&mut self, form: FormSubmission, origin: Option<SecurityOrigin>) {
        if !should_schedule_navigation(&self.handle.context, self.id(), &form.action) {
            return;
        }
        let lock = self.must_lock_back_forward_list();
        let gesture = self.handle.context.processing_user_gesture();
        self.schedule_navigation(
            ScheduledNavigation::form_submission(form, origin, lock).with_user_gesture(gesture),
        );
    }

    pub fn schedule_reload(&mut self) {
        let Some(url) = self.document().map(|document| document.url.clone()) else {
            return;
        };
        if !should_schedule_navigation(&self.handle.context, self.id(), &url) {
            return;
        }
        self.schedule_navigation(ScheduledNavigation::reload());
    }

    pub fn schedule_page_block(&mut self, origin: Option<SecurityOrigin>) {
        let Some(url) = self.document().map(|document| document.url.clone()) else {
            return;
        };
        if !should_schedule_navigation(&self.handle.context, self.id(), &url) {
            return;
        }
        self.schedule_navigation(ScheduledNavigation::page_block(origin));
    }

    /// Script-initiated navigations before `load`, or under a frame still
    /// loading, replace the current entry instead of adding one.
    fn must_lock_back_forward_list(&self) -> bool {
        if !self.handle.context.processing_user_gesture()
            && !self
                .document()
                .is_some_and(|document| document.load_event_finished)
        {
            return true;
        }
        let tree = self.handle.context.frame_tree();
        tree.ancestors(self.id()).into_iter().any(|ancestor| {
            tree.snapshot(ancestor)
                .is_some_and(|snapshot| !snapshot.load_event_finished)
        })
    }

    fn schedule_navigation(&mut self, navigation: ScheduledNavigation) {
        // A history restore still in flight must not race the new navigation.
        if !self.state_machine.committed_first_real_document_load()
            && self.loaders.get(LoaderPhase::Provisional).is_some()
        {
            self.stop_provisional_load();
            self.check_completed();
        }
        let now = self.handle.context.now();
        let load_event_finished = self
            .document()
            .is_some_and(|document| document.load_event_finished);
        self.scheduler
            .schedule(navigation, now, load_event_finished);
    }

    /// Runs the pending navigation if its timer expired. Returns whether
    /// one fired.
    pub fn fire_scheduled_navigation(&mut self, now: Instant) -> bool {
        let Some(navigation) = self.scheduler.take_due(now) else {
            return false;
        };
        let Some(current_url) = self.document().map(|document| document.url.clone()) else {
            return false;
        };
        let _gesture = navigation
            .was_user_gesture
            .then(|| UserGestureIndicator::new(&self.handle.context));
        debug!("frame {} fires scheduled {:?}", self.id(), navigation.kind);
        if navigation.kind == ScheduledNavigationKind::Reload {
            self.reload(false, ClientRedirectPolicy::ClientRedirect);
            return true;
        }
        let (request, load_type) = navigation.to_load_request(&current_url);
        self.load(request, load_type, None, HistoryLoadType::DifferentDocument);
        true
    }

    /// The XSS auditor found reflected script in the current document.
    pub fn report_xss(&mut self, url: &Url, did_block_entire_page: bool) {
        if !self.handle.context.settings().xss_auditor_enabled {
            return;
        }
        self.handle
            .clients
            .security
            .did_detect_xss(self.id(), url, did_block_entire_page);
        if did_block_entire_page {
            let origin = self
                .document()
                .map(|document| document.security_origin.clone());
            self.schedule_page_block(origin);
        }
    }

    /// Fetches a subresource for the committed document. Archived
    /// documents answer from their archive.
    pub fn request_subresource(
        &mut self,
        resource_type: ResourceType,
        request: FetchRequest,
    ) -> BrowserResult<SubresourceLoad> {
        let load_type = self.load_type;
        let scope = self.handle.scope();
        let Some(loader) = self.loaders.get_mut(LoaderPhase::Committed) else {
            return Err(BrowserError::new(
                "loader.no_document",
                format!("frame {} has no document", scope.id()),
            ));
        };
        if let Some(resource) = loader
            .archive()
            .and_then(|archive| archive.subresource_for_url(request.url()))
        {
            return Ok(SubresourceLoad::Archived(resource.clone()));
        }
        let (identifier, prepared) = loader.request_subresource(scope, load_type, resource_type, request)?;
        debug!("frame {} requested {resource_type:?} {}", scope.id(), prepared.url);
        self.awaiting_response.insert(identifier);
        self.publish_snapshot();
        Ok(SubresourceLoad::Fetching(identifier))
    }

    fn subresource_done(&mut self, identifier: ResourceId) {
        self.awaiting_response.remove(&identifier);
        let known = self
            .loaders
            .get_mut(LoaderPhase::Committed)
            .is_some_and(|loader| loader.fetcher_mut().did_complete(identifier));
        if !known {
            return;
        }
        self.progress.complete_progress(identifier);
        self.check_completed();
    }

    fn history_commit_type(&self) -> HistoryCommitType {
        match self.load_type {
            FrameLoadType::Standard => HistoryCommitType::Standard,
            FrameLoadType::InitialInChildFrame => HistoryCommitType::InitialInChildFrame,
            FrameLoadType::BackForward => HistoryCommitType::BackForward,
            FrameLoadType::Reload
            | FrameLoadType::Same
            | FrameLoadType::RedirectWithLockedBackForwardList
            | FrameLoadType::ReloadFromOrigin => HistoryCommitType::HistoryInert,
        }
    }

    /// Republishes what other frames may read about this one.
    fn publish_snapshot(&self) {
        let Some(loader) = self.loaders.get(LoaderPhase::Committed) else {
            return;
        };
        let Some(document) = loader.document() else {
            return;
        };
        let mut snapshot = FrameSnapshot::new(document.url.clone(), document.security_origin.clone());
        snapshot.content_security_policy = document.content_security_policy.clone();
        snapshot.sandbox_flags = document.sandbox_flags;
        snapshot.upgrade_insecure_requests = document.upgrade_insecure_requests;
        snapshot.block_all_mixed_content = document.block_all_mixed_content;
        snapshot.insecure_navigations_to_upgrade = document.insecure_navigations_to_upgrade.clone();
        snapshot.load_type = self.load_type;
        snapshot.request_cache_policy = loader.request().cache_policy;
        snapshot.is_loading = !self.is_load_complete();
        snapshot.load_event_finished = document.load_event_finished;
        snapshot.committed_first_real_load = self.state_machine.committed_first_real_document_load();
        self.handle
            .context
            .frame_tree_mut()
            .set_snapshot(self.id(), snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoader;
    use crate::client::FrameClients;
    use crate::client::LifecycleClient;
    use crate::config::LoaderSettings;
    use crate::context::LoaderContext;
    use crate::document::DocumentReadyState;
    use crate::frame_load_request::FormSubmission;
    use crate::frame_load_request::FrameLoadRequest;
    use crate::frame_load_request::SubstituteData;
    use crate::history::HistoryCommitType;
    use crate::history::HistoryItem;
    use crate::history::HistoryLoadType;
    use crate::scheduler::ScheduledNavigationKind;
    use pd_core::BrowserResult;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::HttpMethod;
    use pd_net::NetworkBackend;
    use pd_net::ResourceRequest;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use url::Url;

    struct NullBackend;

    impl NetworkBackend for NullBackend {
        fn start(&self, _identifier: ResourceId, _request: &ResourceRequest) -> BrowserResult<()> {
            Ok(())
        }

        fn cancel(&self, _identifier: ResourceId) {}
    }

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.borrow_mut().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }

        fn position(&self, prefix: &str) -> usize {
            match self.events().iter().position(|event| event.starts_with(prefix)) {
                Some(index) => index,
                None => panic!("no {prefix} event in {:?}", self.events()),
            }
        }

        fn count(&self, prefix: &str) -> usize {
            self.events()
                .iter()
                .filter(|event| event.starts_with(prefix))
                .count()
        }
    }

    impl LifecycleClient for Recorder {
        fn did_start_loading(&self, _frame: FrameId) {
            self.push("start_loading".to_owned());
        }

        fn did_stop_loading(&self, _frame: FrameId) {
            self.push("stop_loading".to_owned());
        }

        fn dispatch_did_start_provisional_load(&self, _frame: FrameId, url: &Url) {
            self.push(format!("provisional {url}"));
        }

        fn dispatch_did_commit_load(&self, _frame: FrameId, item: &HistoryItem, commit_type: HistoryCommitType) {
            self.push(format!("commit {} {commit_type:?}", item.url()));
        }

        fn dispatch_did_navigate_within_page(
            &self,
            _frame: FrameId,
            item: &HistoryItem,
            _commit_type: HistoryCommitType,
        ) {
            self.push(format!("within_page {}", item.url()));
        }

        fn dispatch_document_load_event(&self, _frame: FrameId) {
            self.push("load_event".to_owned());
        }

        fn dispatch_did_finish_load(&self, _frame: FrameId) {
            self.push("finish_load".to_owned());
        }
    }

    struct Harness {
        context: Rc<LoaderContext>,
        clock: Rc<ManualClock>,
        recorder: Rc<Recorder>,
        loader: FrameLoader,
    }

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn harness() -> Harness {
        let clock = Rc::new(ManualClock::new());
        let context = match LoaderContext::new(LoaderSettings::default(), Rc::new(NullBackend), clock.clone()) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let frame = match context.frame_tree_mut().insert_main_frame(FrameId::new(1)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let recorder = Rc::new(Recorder::default());
        let mut clients = FrameClients::default();
        clients.lifecycle = recorder.clone();
        let mut loader = FrameLoader::new(frame, Rc::clone(&context), clients);
        loader.init();
        Harness {
            context,
            clock,
            recorder,
            loader,
        }
    }

    fn load_html(loader: &mut FrameLoader, input: &str, html: &str) {
        let data = SubstituteData::new(html.as_bytes().to_vec(), "text/html", "UTF-8");
        let request = FrameLoadRequest::from_url(url(input)).with_substitute_data(data);
        loader.load(request, None, None, HistoryLoadType::DifferentDocument);
    }

    #[test]
    fn initial_document_is_complete_and_unannounced() {
        let harness = harness();
        let loader = &harness.loader;
        assert!(loader.state_machine().is_displaying_initial_empty_document());
        assert!(loader.is_load_complete());
        assert!(!loader.is_loading());
        match loader.document() {
            Some(document) => {
                assert_eq!(document.url.as_str(), "about:blank");
                assert_eq!(document.ready_state, DocumentReadyState::Complete);
            }
            None => panic!("initial document missing"),
        }
        assert!(harness.recorder.events().is_empty());
        assert!(harness.context.back_forward_list().is_empty());
    }

    #[test]
    fn substitute_data_commits_and_finishes_synchronously() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");

        let loader = &harness.loader;
        assert!(loader.provisional_document_loader().is_none());
        assert!(loader.state_machine().committed_first_real_document_load());
        assert!(loader.is_load_complete());
        assert_eq!(loader.progress().estimated_progress(), 1.0);
        assert_eq!(harness.context.back_forward_list().len(), 1);

        let recorder = &harness.recorder;
        assert!(recorder.position("provisional https://a.example/page") < recorder.position("commit"));
        assert!(recorder.position("commit https://a.example/page Standard") < recorder.position("load_event"));
        assert!(recorder.position("load_event") < recorder.position("finish_load"));
        assert_eq!(recorder.count("finish_load"), 1);
        assert_eq!(recorder.count("stop_loading"), 1);
    }

    #[test]
    fn fragment_navigation_stays_in_the_document() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");
        let commits = harness.recorder.count("commit");

        harness.loader.load(
            FrameLoadRequest::from_url(url("https://a.example/page#top")),
            None,
            None,
            HistoryLoadType::DifferentDocument,
        );

        assert_eq!(harness.recorder.count("commit"), commits);
        assert_eq!(harness.recorder.count("within_page https://a.example/page#top"), 1);
        assert_eq!(harness.context.back_forward_list().len(), 2);
        assert!(harness.loader.provisional_document_loader().is_none());
        match harness.loader.document() {
            Some(document) => assert_eq!(document.url.as_str(), "https://a.example/page#top"),
            None => panic!("document missing"),
        }
    }

    #[test]
    fn history_api_rejects_cross_origin_urls() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");

        if let Err(error) = harness
            .loader
            .push_state(url("https://a.example/other"), Some(b"{}".to_vec()))
        {
            panic!("{error}");
        }
        assert_eq!(harness.context.back_forward_list().len(), 2);
        match harness.loader.document() {
            Some(document) => assert_eq!(document.state_object.as_deref(), Some("{}")),
            None => panic!("document missing"),
        }

        match harness.loader.replace_state(url("https://b.example/"), None) {
            Ok(()) => panic!("cross-origin replaceState was accepted"),
            Err(error) => assert_eq!(error.code, "loader.history.security"),
        }
        assert_eq!(harness.context.back_forward_list().len(), 2);
    }

    #[test]
    fn sooner_redirect_replaces_a_later_one() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");

        harness.loader.schedule_redirect(5.0, url("https://a.example/five"));
        harness.loader.schedule_redirect(10.0, url("https://a.example/ten"));
        let pending = harness.loader.scheduler().pending().map(|navigation| navigation.kind.clone());
        assert_eq!(pending, Some(ScheduledNavigationKind::Redirect(url("https://a.example/five"))));

        harness.loader.schedule_redirect(2.0, url("https://a.example/two"));
        let pending = harness.loader.scheduler().pending().map(|navigation| navigation.kind.clone());
        assert_eq!(pending, Some(ScheduledNavigationKind::Redirect(url("https://a.example/two"))));

        harness.clock.advance(Duration::from_secs(1));
        assert!(!harness.loader.fire_scheduled_navigation(harness.context.now()));
        harness.clock.advance(Duration::from_secs(1));
        assert!(harness.loader.fire_scheduled_navigation(harness.context.now()));
        match harness.loader.provisional_document_loader() {
            Some(provisional) => assert_eq!(provisional.url().as_str(), "https://a.example/two"),
            None => panic!("scheduled redirect did not start a load"),
        }
    }

    #[test]
    fn same_document_location_change_runs_immediately() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");
        let origin = harness
            .loader
            .document()
            .map(|document| document.security_origin.clone());

        harness
            .loader
            .schedule_location_change(origin, url("https://a.example/page#details"), false);

        assert!(!harness.loader.scheduler().is_navigation_scheduled());
        assert_eq!(harness.recorder.count("within_page https://a.example/page#details"), 1);
    }

    #[test]
    fn cross_document_location_change_waits_for_the_timer() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");

        harness
            .loader
            .schedule_location_change(None, url("https://a.example/next"), false);
        match harness.loader.scheduler().pending() {
            Some(pending) => {
                assert_eq!(pending.kind, ScheduledNavigationKind::LocationChange(url("https://a.example/next")));
                assert!(!pending.lock_back_forward_list);
            }
            None => panic!("location change was not scheduled"),
        }
        assert!(harness.loader.provisional_document_loader().is_none());

        assert!(harness.loader.fire_scheduled_navigation(harness.context.now()));
        match harness.loader.provisional_document_loader() {
            Some(provisional) => assert_eq!(provisional.url().as_str(), "https://a.example/next"),
            None => panic!("location change did not start a load"),
        }
    }

    #[test]
    fn scheduled_form_submission_posts_the_body() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/form", "<form></form>");

        let form = FormSubmission::post(
            url("https://a.example/submit"),
            b"name=value".to_vec(),
            "application/x-www-form-urlencoded",
        );
        harness.loader.schedule_form_submission(form, None);
        assert!(harness.loader.fire_scheduled_navigation(harness.context.now()));

        match harness.loader.provisional_document_loader() {
            Some(provisional) => {
                assert_eq!(provisional.url().as_str(), "https://a.example/submit");
                assert_eq!(provisional.request().method, HttpMethod::Post);
                assert_eq!(provisional.request().body.as_deref(), Some(&b"name=value"[..]));
            }
            None => panic!("form submission did not start a load"),
        }
    }

    #[test]
    fn xss_block_replaces_a_pending_reload_with_an_empty_page() {
        let mut harness = harness();
        load_html(&mut harness.loader, "https://a.example/page", "<p>hello</p>");

        harness.loader.schedule_reload();
        let pending = harness.loader.scheduler().pending().map(|navigation| navigation.kind.clone());
        assert_eq!(pending, Some(ScheduledNavigationKind::Reload));

        harness.loader.report_xss(&url("https://a.example/page"), false);
        let pending = harness.loader.scheduler().pending().map(|navigation| navigation.kind.clone());
        assert_eq!(pending, Some(ScheduledNavigationKind::Reload));

        harness.loader.report_xss(&url("https://a.example/page"), true);
        let pending = harness.loader.scheduler().pending().map(|navigation| navigation.kind.clone());
        assert_eq!(pending, Some(ScheduledNavigationKind::PageBlock));

        assert!(harness.loader.fire_scheduled_navigation(harness.context.now()));
        assert_eq!(harness.recorder.count("commit https://a.example/page"), 2);
        match harness.loader.document() {
            Some(document) => assert_eq!(document.url.as_str(), "https://a.example/page"),
            None => panic!("document missing"),
        }
    }
}
