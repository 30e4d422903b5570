//! Navigation requests as handed to `FrameLoader::load`.

use crate::client::NavigationPolicy;
use log::warn;
use pd_net::CachePolicy;
use pd_net::HttpMethod;
use pd_net::RequestContext;
use pd_net::ResourceRequest;
use pd_security::SecurityOrigin;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoadType {
    Standard,
    BackForward,
    Reload,
    Same,
    RedirectWithLockedBackForwardList,
    InitialInChildFrame,
    ReloadFromOrigin,
}

impl FrameLoadType {
    pub fn is_reload(self) -> bool {
        matches!(self, Self::Reload | Self::ReloadFromOrigin)
    }

    pub fn is_back_forward(self) -> bool {
        self == Self::BackForward
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientRedirectPolicy {
    #[default]
    NotClientRedirect,
    ClientRedirect,
}

/// Synthetic main-resource bytes that bypass the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstituteData {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub text_encoding: String,
    /// Set for error pages: the URL whose load failed.
    pub failing_url: Option<Url>,
}

impl SubstituteData {
    pub fn new(data: Vec<u8>, mime_type: &str, text_encoding: &str) -> Self {
        Self {
            data,
            mime_type: mime_type.to_ascii_lowercase(),
            text_encoding: text_encoding.to_owned(),
            failing_url: None,
        }
    }

    pub fn with_failing_url(mut self, url: Url) -> Self {
        self.failing_url = Some(url);
        self
    }
}

/// A submitted form, as far as loading cares.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub action: Url,
    pub method: HttpMethod,
    pub target: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl FormSubmission {
    pub fn get(action: Url) -> Self {
        Self {
            action,
            method: HttpMethod::Get,
            target: String::new(),
            body: Vec::new(),
            content_type: String::new(),
        }
    }

    pub fn post(action: Url, body: Vec<u8>, content_type: &str) -> Self {
        Self {
            action,
            method: HttpMethod::Post,
            target: String::new(),
            body,
            content_type: content_type.to_owned(),
        }
    }

    /// GET submissions carry the encoded form in the query instead of a body.
    pub fn to_resource_request(&self) -> ResourceRequest {
        let mut url = self.action.clone();
        let mut request = if self.method == HttpMethod::Post {
            let mut request = ResourceRequest::new(url).with_method(HttpMethod::Post);
            request.body = Some(self.body.clone());
            if !self.content_type.is_empty()
                && let Err(error) = request.headers.set("Content-Type", &self.content_type)
            {
                warn!("dropping form content type: {error}");
            }
            request
        } else {
            if !self.body.is_empty() {
                url.set_query(Some(&String::from_utf8_lossy(&self.body)));
            }
            ResourceRequest::new(url)
        };
        request.request_context = RequestContext::Form;
        request
    }
}

/// Modifier state of the input event that triggered a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggeringEvent {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub middle_button: bool,
}

impl TriggeringEvent {
    pub fn navigation_policy(self) -> NavigationPolicy {
        let new_tab = self.middle_button || self.ctrl || self.meta;
        if new_tab {
            return if self.shift {
                NavigationPolicy::NewForegroundTab
            } else {
                NavigationPolicy::NewBackgroundTab
            };
        }
        if self.shift {
            return NavigationPolicy::NewWindow;
        }
        if self.alt {
            return NavigationPolicy::Download;
        }
        NavigationPolicy::CurrentTab
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoadRequest {
    /// Origin of the document that started the navigation, if any. Requests
    /// without one are trusted as fully formed.
    pub origin: Option<SecurityOrigin>,
    pub resource_request: ResourceRequest,
    pub substitute_data: Option<SubstituteData>,
    pub lock_back_forward_list: bool,
    pub client_redirect: ClientRedirectPolicy,
    pub form: Option<FormSubmission>,
    pub should_check_main_world_csp: bool,
    pub triggering_event: Option<TriggeringEvent>,
}

impl FrameLoadRequest {
    pub fn new(resource_request: ResourceRequest) -> Self {
        Self {
            origin: None,
            resource_request,
            substitute_data: None,
            lock_back_forward_list: false,
            client_redirect: ClientRedirectPolicy::NotClientRedirect,
            form: None,
            should_check_main_world_csp: true,
            triggering_event: None,
        }
    }

    pub fn from_url(url: Url) -> Self {
        Self::new(ResourceRequest::new(url))
    }

    pub fn from_form(form: FormSubmission) -> Self {
        let mut request = Self::new(form.to_resource_request());
        request.form = Some(form);
        request
    }

    pub fn with_origin(mut self, origin: SecurityOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_substitute_data(mut self, data: SubstituteData) -> Self {
        self.substitute_data = Some(data);
        self
    }

    pub fn with_lock_back_forward_list(mut self, lock: bool) -> Self {
        self.lock_back_forward_list = lock;
        self
    }

    pub fn with_client_redirect(mut self, policy: ClientRedirectPolicy) -> Self {
        self.client_redirect = policy;
        self
    }

    pub fn with_triggering_event(mut self, event: TriggeringEvent) -> Self {
        self.triggering_event = Some(event);
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.resource_request.cache_policy = cache_policy;
        self
    }

    pub fn without_main_world_csp_check(mut self) -> Self {
        self.should_check_main_world_csp = false;
        self
    }

    pub fn url(&self) -> &Url {
        &self.resource_request.url
    }

    pub fn navigation_policy(&self) -> NavigationPolicy {
        self.triggering_event
            .map_or(NavigationPolicy::CurrentTab, TriggeringEvent::navigation_policy)
    }
}
