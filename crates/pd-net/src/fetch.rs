//! Generic fetch machinery: resource types, the policy seam every fetch
//! passes through, and the per-document fetcher that tracks live requests.

use crate::client_hints::ClientHintsPreferences;
use crate::request::CachePolicy;
use crate::request::ResourceRequest;
use log::debug;
use log::warn;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::ResourceId;
use std::collections::BTreeMap;
use std::rc::Rc;
use url::Url;

/// Kind of resource being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    MainResource,
    Image,
    CssStyleSheet,
    Script,
    Font,
    Raw,
    SvgDocument,
    XslStyleSheet,
    LinkPrefetch,
    LinkSubresource,
    TextTrack,
    ImportResource,
    Media,
    Manifest,
}

/// Whether the fetch is restricted to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginRestriction {
    UseDefaultForType,
    RestrictToSameOrigin,
    NoRestriction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSecurityPolicyDisposition {
    Check,
    DoNotCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLoaderOptions {
    pub buffer_data: bool,
    pub content_security_policy: ContentSecurityPolicyDisposition,
}

impl Default for ResourceLoaderOptions {
    fn default() -> Self {
        Self {
            buffer_data: true,
            content_security_policy: ContentSecurityPolicyDisposition::Check,
        }
    }
}

/// Memory-cache revalidation policy derived from the frame's load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCachePolicy {
    Verify,
    Revalidate,
    Reload,
    HistoryBuffer,
}

impl MemoryCachePolicy {
    pub fn to_request_cache_policy(self) -> CachePolicy {
        match self {
            Self::Verify => CachePolicy::UseProtocolCachePolicy,
            Self::Revalidate => CachePolicy::ReloadIgnoringCacheData,
            Self::Reload => CachePolicy::ReloadBypassingCache,
            Self::HistoryBuffer => CachePolicy::ReturnCacheDataElseLoad,
        }
    }
}

/// A request plus the fetch-time parameters that never reach the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub resource_request: ResourceRequest,
    pub options: ResourceLoaderOptions,
    pub origin_restriction: OriginRestriction,
    pub for_preload: bool,
    /// Layout width in CSS pixels, when known, for the `Width` hint.
    pub resource_width: Option<f32>,
    pub client_hints: ClientHintsPreferences,
}

impl FetchRequest {
    pub fn new(resource_request: ResourceRequest) -> Self {
        Self {
            resource_request,
            options: ResourceLoaderOptions::default(),
            origin_restriction: OriginRestriction::UseDefaultForType,
            for_preload: false,
            resource_width: None,
            client_hints: ClientHintsPreferences::default(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.resource_request.url
    }
}

/// Policy seam between the generic fetcher and whatever embeds it.
///
/// The defaults describe a context with no document: nothing may be
/// requested and no headers are added.
pub trait FetchContext {
    fn cache_policy(&self) -> MemoryCachePolicy {
        MemoryCachePolicy::Verify
    }

    fn resource_request_cache_policy(
        &self,
        _request: &ResourceRequest,
        _resource_type: ResourceType,
    ) -> CachePolicy {
        CachePolicy::UseProtocolCachePolicy
    }

    fn can_request(
        &self,
        _resource_type: ResourceType,
        _request: &ResourceRequest,
        _url: &Url,
        _options: &ResourceLoaderOptions,
        _for_preload: bool,
        _origin_restriction: OriginRestriction,
    ) -> bool {
        false
    }

    fn upgrade_insecure_request(&self, _request: &mut FetchRequest) {}

    fn add_client_hints_if_necessary(&self, _request: &mut FetchRequest) {}

    fn add_csp_header_if_necessary(&self, _resource_type: ResourceType, _request: &mut FetchRequest) {
    }

    fn add_additional_request_headers(
        &self,
        _request: &mut ResourceRequest,
        _resource_type: ResourceType,
    ) {
    }
}

/// Transport seam. Responses come back through the loader's public
/// `did_receive_*` entry points keyed by the same identifier.
pub trait NetworkBackend {
    fn start(&self, identifier: ResourceId, request: &ResourceRequest) -> BrowserResult<()>;

    fn cancel(&self, identifier: ResourceId);
}

#[derive(Debug, Clone, PartialEq)]
struct InFlightFetch {
    resource_type: ResourceType,
    url: Url,
}

/// Per-document fetcher. Tracks which requests are live so completion
/// checks and cancellation see one consistent picture.
pub struct ResourceFetcher {
    backend: Rc<dyn NetworkBackend>,
    main_resource: Option<(ResourceId, Url)>,
    subresources: BTreeMap<ResourceId, InFlightFetch>,
}

impl ResourceFetcher {
    pub fn new(backend: Rc<dyn NetworkBackend>) -> Self {
        Self {
            backend,
            main_resource: None,
            subresources: BTreeMap::new(),
        }
    }

    pub fn fetch_main_resource(
        &mut self,
        identifier: ResourceId,
        request: FetchRequest,
        context: &dyn FetchContext,
    ) -> BrowserResult<ResourceRequest> {
        let request = self.prepare(ResourceType::MainResource, request, context)?;
        self.backend.start(identifier, &request)?;
        self.main_resource = Some((identifier, request.url.clone()));
        Ok(request)
    }

    pub fn request_resource(
        &mut self,
        identifier: ResourceId,
        resource_type: ResourceType,
        request: FetchRequest,
        context: &dyn FetchContext,
    ) -> BrowserResult<ResourceRequest> {
        let request = self.prepare(resource_type, request, context)?;
        self.backend.start(identifier, &request)?;
        self.subresources.insert(
            identifier,
            InFlightFetch {
                resource_type,
                url: request.url.clone(),
            },
        );
        debug!("started {resource_type:?} fetch {identifier} for {}", request.url);
        Ok(request)
    }

    /// Re-runs request checks for the next leg of a redirect.
    pub fn can_access_redirect(
        &self,
        resource_type: ResourceType,
        new_request: &mut ResourceRequest,
        options: &ResourceLoaderOptions,
        context: &dyn FetchContext,
    ) -> bool {
        new_request.followed_redirect = true;
        let url = new_request.url.clone();
        context.can_request(
            resource_type,
            new_request,
            &url,
            options,
            false,
            OriginRestriction::UseDefaultForType,
        )
    }

    pub fn resource_type(&self, identifier: ResourceId) -> Option<ResourceType> {
        if self.is_main_resource(identifier) {
            return Some(ResourceType::MainResource);
        }
        self.subresources
            .get(&identifier)
            .map(|fetch| fetch.resource_type)
    }

    pub fn is_main_resource(&self, identifier: ResourceId) -> bool {
        self.main_resource
            .as_ref()
            .is_some_and(|(main, _)| *main == identifier)
    }

    pub fn main_resource_identifier(&self) -> Option<ResourceId> {
        self.main_resource.as_ref().map(|(identifier, _)| *identifier)
    }

    pub fn contains(&self, identifier: ResourceId) -> bool {
        self.is_main_resource(identifier) || self.subresources.contains_key(&identifier)
    }

    /// Forgets a finished or failed request. Returns whether it was live.
    pub fn did_complete(&mut self, identifier: ResourceId) -> bool {
        if self.is_main_resource(identifier) {
            self.main_resource = None;
            return true;
        }
        self.subresources.remove(&identifier).is_some()
    }

    pub fn cancel_main_resource(&mut self) -> Option<ResourceId> {
        let (identifier, url) = self.main_resource.take()?;
        debug!("cancelling main resource {identifier} for {url}");
        self.backend.cancel(identifier);
        Some(identifier)
    }

    /// Cancels every live subresource request.
    pub fn stop_fetching(&mut self) -> Vec<ResourceId> {
        let cancelled: Vec<ResourceId> = self.subresources.keys().copied().collect();
        for identifier in &cancelled {
            self.backend.cancel(*identifier);
        }
        self.subresources.clear();
        cancelled
    }

    /// Live subresource requests; the main resource is not counted.
    pub fn request_count(&self) -> usize {
        self.subresources.len()
    }

    pub fn is_fetching(&self) -> bool {
        !self.subresources.is_empty()
    }

    fn prepare(
        &self,
        resource_type: ResourceType,
        mut request: FetchRequest,
        context: &dyn FetchContext,
    ) -> BrowserResult<ResourceRequest> {
        context.upgrade_insecure_request(&mut request);
        context.add_client_hints_if_necessary(&mut request);
        context.add_csp_header_if_necessary(resource_type, &mut request);

        let url = request.resource_request.url.clone();
        if !context.can_request(
            resource_type,
            &request.resource_request,
            &url,
            &request.options,
            request.for_preload,
            request.origin_restriction,
        ) {
            warn!("{resource_type:?} request for {url} was refused");
            return Err(BrowserError::new(
                "fetch.blocked",
                format!("request for `{url}` was refused by the fetch context"),
            ));
        }

        if request.resource_request.cache_policy == CachePolicy::UseProtocolCachePolicy {
            request.resource_request.cache_policy =
                context.resource_request_cache_policy(&request.resource_request, resource_type);
        }
        context.add_additional_request_headers(&mut request.resource_request, resource_type);

        Ok(request.resource_request)
    }
}
