//! Outgoing resource requests as seen by the loader and fetch layer.

use crate::http::HeaderMap;
use crate::http::HttpMethod;
use pd_core::BrowserResult;
use url::Url;

/// Cache behaviour requested for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    UseProtocolCachePolicy,
    ReloadIgnoringCacheData,
    ReturnCacheDataElseLoad,
    ReturnCacheDataDontLoad,
    ReloadBypassingCache,
}

/// Which kind of browsing context a navigational request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Not a navigation; subresource fetches use this.
    None,
    TopLevel,
    Nested,
    Auxiliary,
}

/// What initiated a request; drives CSP directive and mixed-content choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestContext {
    Unspecified,
    Audio,
    Beacon,
    CspReport,
    Download,
    Embed,
    EventSource,
    Favicon,
    Fetch,
    Font,
    Form,
    Frame,
    Hyperlink,
    Iframe,
    Image,
    ImageSet,
    Import,
    Internal,
    Location,
    Manifest,
    Object,
    Ping,
    Plugin,
    Prefetch,
    Script,
    ServiceWorker,
    SharedWorker,
    Style,
    Subresource,
    Track,
    Video,
    Worker,
    XmlHttpRequest,
    Xslt,
}

/// A request for a resource, navigational or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub cache_policy: CachePolicy,
    pub frame_type: FrameType,
    pub request_context: RequestContext,
    pub has_user_gesture: bool,
    pub referrer: Option<Url>,
    pub first_party_for_cookies: Option<Url>,
    /// Set once any redirect has been followed for this request.
    pub followed_redirect: bool,
    /// A null request is how hooks cancel a load before it starts.
    pub is_null: bool,
}

impl ResourceRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            headers: HeaderMap::new(),
            body: None,
            cache_policy: CachePolicy::UseProtocolCachePolicy,
            frame_type: FrameType::None,
            request_context: RequestContext::Unspecified,
            has_user_gesture: false,
            referrer: None,
            first_party_for_cookies: None,
            followed_redirect: false,
            is_null: false,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    pub fn with_request_context(mut self, request_context: RequestContext) -> Self {
        self.request_context = request_context;
        self
    }

    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.frame_type = frame_type;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> BrowserResult<Self> {
        self.headers.set(name, value)?;
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Conditional requests carry validators and must hit the network.
    pub fn is_conditional(&self) -> bool {
        [
            "If-Match",
            "If-Modified-Since",
            "If-None-Match",
            "If-Range",
            "If-Unmodified-Since",
        ]
        .iter()
        .any(|name| self.headers.contains(name))
    }

    pub fn clear(&mut self) {
        self.is_null = true;
    }
}
