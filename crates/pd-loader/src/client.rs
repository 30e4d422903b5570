//! Embedder capabilities, split by concern.
//!
//! Every method has a do-nothing default so an embedder only implements what
//! it cares about. Methods documented as running script may re-enter the
//! loader through a retained `Rc<LoaderContext>`.

use crate::appcache::ApplicationCacheBackend;
use crate::console::ConsoleMessage;
use crate::frame_load_request::FormSubmission;
use crate::history::HistoryCommitType;
use crate::history::HistoryItem;
use pd_core::FrameId;
use pd_core::ResourceId;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use pd_security::SecurityOrigin;
use std::rc::Rc;
use url::Url;

/// Where a navigation should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPolicy {
    Ignore,
    Download,
    CurrentTab,
    NewBackgroundTab,
    NewForegroundTab,
    NewWindow,
    NewPopup,
}

/// Why a navigation happened, as reported to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationType {
    LinkClicked,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    Other,
}

impl NavigationType {
    pub fn is_form_submission(self) -> bool {
        matches!(self, Self::FormSubmitted | Self::FormResubmitted)
    }
}

/// Everything the embedder sees when asked to approve a navigation.
#[derive(Debug, Clone, Copy)]
pub struct NavigationPolicyInfo<'a> {
    pub frame: FrameId,
    pub request: &'a ResourceRequest,
    pub navigation_type: NavigationType,
    pub default_policy: NavigationPolicy,
    pub replaces_current_history_item: bool,
    pub is_redirect: bool,
}

pub trait NavigationClient {
    fn decide_policy_for_navigation(&self, info: &NavigationPolicyInfo<'_>) -> NavigationPolicy {
        info.default_policy
    }

    /// Last chance to rewrite a request before it reaches the network.
    fn dispatch_will_send_request(
        &self,
        _frame: FrameId,
        _identifier: ResourceId,
        _request: &mut ResourceRequest,
        _redirect_response: Option<&ResourceResponse>,
    ) {
    }

    /// Runs the script of a `javascript:` URL. May run script.
    fn run_javascript_url(&self, _frame: FrameId, _source: &str) {}

    /// HTML for an error page, or `None` to leave the failed frame as is.
    fn error_page_html(&self, _frame: FrameId, _error: &ResourceError) -> Option<String> {
        None
    }

    fn dispatch_will_submit_form(&self, _frame: FrameId, _form: &FormSubmission) {}

    /// Runs `beforeunload`. Returning false keeps the current document. May run script.
    fn dispatch_before_unload(&self, _frame: FrameId, _is_reload: bool) -> bool {
        true
    }

    fn load_url_externally(
        &self,
        _frame: FrameId,
        _request: &ResourceRequest,
        _policy: NavigationPolicy,
    ) {
    }
}

pub trait LifecycleClient {
    fn did_start_loading(&self, _frame: FrameId) {}

    fn did_stop_loading(&self, _frame: FrameId) {}

    fn progress_estimate_changed(&self, _frame: FrameId, _progress: f64) {}

    fn dispatch_did_start_provisional_load(&self, _frame: FrameId, _url: &Url) {}

    fn dispatch_did_receive_server_redirect_for_provisional_load(&self, _frame: FrameId, _url: &Url) {
    }

    fn dispatch_did_commit_load(
        &self,
        _frame: FrameId,
        _item: &HistoryItem,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn dispatch_did_navigate_within_page(
        &self,
        _frame: FrameId,
        _item: &HistoryItem,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn dispatch_did_receive_response(
        &self,
        _frame: FrameId,
        _identifier: ResourceId,
        _response: &ResourceResponse,
    ) {
    }

    fn dispatch_did_finish_document_load(&self, _frame: FrameId) {}

    fn dispatch_did_finish_load(&self, _frame: FrameId) {}

    fn dispatch_did_fail_provisional_load(
        &self,
        _frame: FrameId,
        _error: &ResourceError,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn dispatch_did_fail_load(
        &self,
        _frame: FrameId,
        _error: &ResourceError,
        _commit_type: HistoryCommitType,
    ) {
    }

    fn dispatch_will_close(&self, _frame: FrameId) {}

    /// Runs `unload` on the outgoing document. May run script.
    fn dispatch_unload_event(&self, _frame: FrameId) {}

    /// Runs the window `load` event. May run script.
    fn dispatch_document_load_event(&self, _frame: FrameId) {}

    /// Runs the `load` event on the frame's owner element. May run script.
    fn dispatch_owner_load_event(&self, _frame: FrameId) {}

    fn did_add_console_message(&self, _frame: FrameId, _message: &ConsoleMessage) {}
}

pub trait SecurityClient {
    fn did_display_insecure_content(&self, _frame: FrameId, _origin: &SecurityOrigin, _url: &Url) {}

    fn did_run_insecure_content(&self, _frame: FrameId, _origin: &SecurityOrigin, _url: &Url) {}

    fn allow_display_insecure_content(
        &self,
        _frame: FrameId,
        enabled_per_settings: bool,
        _origin: &SecurityOrigin,
        _url: &Url,
    ) -> bool {
        enabled_per_settings
    }

    fn allow_running_insecure_content(
        &self,
        _frame: FrameId,
        enabled_per_settings: bool,
        _origin: &SecurityOrigin,
        _url: &Url,
    ) -> bool {
        enabled_per_settings
    }

    fn did_detect_xss(&self, _frame: FrameId, _url: &Url, _did_block_entire_page: bool) {}
}

pub trait PermissionClient {
    fn allow_script_from_source(&self, _frame: FrameId, enabled_per_settings: bool, _url: &Url) -> bool {
        enabled_per_settings
    }

    fn allow_image(&self, _frame: FrameId, enabled_per_settings: bool, _url: &Url) -> bool {
        enabled_per_settings
    }

    fn allow_plugins(&self, _frame: FrameId, enabled_per_settings: bool) -> bool {
        enabled_per_settings
    }

    fn allow_media(&self, _frame: FrameId, _url: &Url) -> bool {
        true
    }

    fn supports_plugin_mime_type(&self, _mime_type: &str) -> bool {
        false
    }
}

pub trait ApplicationCacheClient {
    fn create_application_cache_backend(
        &self,
        _frame: FrameId,
    ) -> Option<Box<dyn ApplicationCacheBackend>> {
        None
    }
}

/// Accepts every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClient;

impl NavigationClient for DefaultClient {}
impl LifecycleClient for DefaultClient {}
impl SecurityClient for DefaultClient {}
impl PermissionClient for DefaultClient {}
impl ApplicationCacheClient for DefaultClient {}

/// The set of capabilities one frame talks to.
#[derive(Clone)]
pub struct FrameClients {
    pub navigation: Rc<dyn NavigationClient>,
    pub lifecycle: Rc<dyn LifecycleClient>,
    pub security: Rc<dyn SecurityClient>,
    pub permission: Rc<dyn PermissionClient>,
    pub application_cache: Rc<dyn ApplicationCacheClient>,
}

impl Default for FrameClients {
    fn default() -> Self {
        Self::uniform(Rc::new(DefaultClient))
    }
}

impl FrameClients {
    /// Uses one object for every capability.
    pub fn uniform<C>(client: Rc<C>) -> Self
    where
        C: NavigationClient
            + LifecycleClient
            + SecurityClient
            + PermissionClient
            + ApplicationCacheClient
            + 'static,
    {
        Self {
            navigation: client.clone(),
            lifecycle: client.clone(),
            security: client.clone(),
            permission: client.clone(),
            application_cache: client,
        }
    }
}
