//! Application cache host: the per-loader bridge to an embedder-provided
//! cache backend.
//!
//! Events raised before the document's load event are queued and flushed in
//! arrival order once `stop_deferring_events` runs.

use log::debug;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use std::collections::VecDeque;
use std::rc::Weak;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationCacheStatus {
    #[default]
    Uncached,
    Idle,
    Checking,
    Downloading,
    UpdateReady,
    Obsolete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationCacheEventId {
    Checking,
    Error,
    NoUpdate,
    Downloading,
    Progress,
    UpdateReady,
    Cached,
    Obsolete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationCacheEvent {
    pub id: ApplicationCacheEventId,
    pub progress_total: u32,
    pub progress_done: u32,
    pub error_url: Option<Url>,
    pub error_message: String,
}

impl ApplicationCacheEvent {
    pub fn new(id: ApplicationCacheEventId) -> Self {
        Self {
            id,
            progress_total: 0,
            progress_done: 0,
            error_url: None,
            error_message: String::new(),
        }
    }

    pub fn progress(total: u32, done: u32) -> Self {
        Self {
            progress_total: total,
            progress_done: done,
            ..Self::new(ApplicationCacheEventId::Progress)
        }
    }
}

/// Storage side of the application cache, implemented by the embedder.
pub trait ApplicationCacheBackend {
    fn will_start_main_resource_request(&mut self, _request: &mut ResourceRequest) {}

    fn did_receive_response_for_main_resource(&mut self, _response: &ResourceResponse) {}

    fn did_receive_data_for_main_resource(&mut self, _data: &[u8]) {}

    fn did_finish_loading_main_resource(&mut self, _success: bool) {}

    fn select_cache_without_manifest(&mut self) {}

    /// Returns false when the document must be reloaded from the network.
    fn select_cache_with_manifest(&mut self, _manifest_url: &Url) -> bool {
        true
    }

    fn status(&self) -> ApplicationCacheStatus {
        ApplicationCacheStatus::Uncached
    }

    fn start_update(&mut self) -> bool {
        false
    }

    fn swap_cache(&mut self) -> bool {
        false
    }

    fn abort(&mut self) {}
}

/// Script-visible `applicationCache` object.
pub trait ApplicationCacheEventTarget {
    fn dispatch_event(&self, event: &ApplicationCacheEvent);
}

pub struct ApplicationCacheHost {
    backend: Option<Box<dyn ApplicationCacheBackend>>,
    dom_application_cache: Option<Weak<dyn ApplicationCacheEventTarget>>,
    defers_events: bool,
    deferred_events: VecDeque<ApplicationCacheEvent>,
    detached: bool,
}

impl Default for ApplicationCacheHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationCacheHost {
    pub fn new() -> Self {
        Self {
            backend: None,
            dom_application_cache: None,
            defers_events: true,
            deferred_events: VecDeque::new(),
            detached: false,
        }
    }

    pub fn defers_events(&self) -> bool {
        self.defers_events
    }

    pub fn pending_event_count(&self) -> usize {
        self.deferred_events.len()
    }

    pub fn will_start_loading_main_resource(
        &mut self,
        backend: Option<Box<dyn ApplicationCacheBackend>>,
        request: &mut ResourceRequest,
    ) {
        self.backend = backend;
        if let Some(backend) = self.backend.as_mut() {
            backend.will_start_main_resource_request(request);
        }
    }

    pub fn did_receive_response_for_main_resource(&mut self, response: &ResourceResponse) {
        if let Some(backend) = self.backend.as_mut() {
            backend.did_receive_response_for_main_resource(response);
        }
    }

    pub fn main_resource_data_received(&mut self, data: &[u8]) {
        if let Some(backend) = self.backend.as_mut() {
            backend.did_receive_data_for_main_resource(data);
        }
    }

    pub fn finished_loading_main_resource(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.did_finish_loading_main_resource(true);
        }
    }

    pub fn failed_loading_main_resource(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.did_finish_loading_main_resource(false);
        }
    }

    pub fn select_cache_without_manifest(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.select_cache_without_manifest();
        }
    }

    /// Returns false when the document has to be reloaded through the network.
    pub fn select_cache_with_manifest(&mut self, manifest_url: &Url) -> bool {
        self.backend
            .as_mut()
            .is_none_or(|backend| backend.select_cache_with_manifest(manifest_url))
    }

    /// Delivers an event from the backend, queueing it while deferring.
    pub fn notify_application_cache(&mut self, event: ApplicationCacheEvent) {
        if self.detached {
            return;
        }
        if self.defers_events {
            self.deferred_events.push_back(event);
            return;
        }
        self.dispatch(&event);
    }

    /// Flushes deferred events in arrival order and stops deferring.
    pub fn stop_deferring_events(&mut self) {
        while let Some(event) = self.deferred_events.pop_front() {
            self.dispatch(&event);
        }
        self.defers_events = false;
    }

    pub fn set_application_cache(&mut self, target: Weak<dyn ApplicationCacheEventTarget>) {
        self.dom_application_cache = Some(target);
    }

    pub fn status(&self) -> ApplicationCacheStatus {
        self.backend
            .as_ref()
            .map_or(ApplicationCacheStatus::Uncached, |backend| backend.status())
    }

    pub fn update(&mut self) -> bool {
        self.backend
            .as_mut()
            .is_some_and(|backend| backend.start_update())
    }

    pub fn swap_cache(&mut self) -> bool {
        self.backend
            .as_mut()
            .is_some_and(|backend| backend.swap_cache())
    }

    pub fn abort(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.abort();
        }
    }

    pub fn detach_from_document_loader(&mut self) {
        self.dom_application_cache = None;
        self.deferred_events.clear();
        self.backend = None;
        self.detached = true;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn dispatch(&self, event: &ApplicationCacheEvent) {
        let Some(target) = self
            .dom_application_cache
            .as_ref()
            .and_then(Weak::upgrade)
        else {
            debug!("dropping application cache event {:?} without a target", event.id);
            return;
        };
        target.dispatch_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::ApplicationCacheBackend;
    use super::ApplicationCacheEvent;
    use super::ApplicationCacheEventId;
    use super::ApplicationCacheEventTarget;
    use super::ApplicationCacheHost;
    use super::ApplicationCacheStatus;
    use pd_net::ResourceRequest;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::rc::Weak;
    use url::Url;

    #[derive(Default)]
    struct Target {
        events: RefCell<Vec<ApplicationCacheEventId>>,
    }

    impl ApplicationCacheEventTarget for Target {
        fn dispatch_event(&self, event: &ApplicationCacheEvent) {
            self.events.borrow_mut().push(event.id);
        }
    }

    struct Backend;

    impl ApplicationCacheBackend for Backend {
        fn status(&self) -> ApplicationCacheStatus {
            ApplicationCacheStatus::Idle
        }

        fn select_cache_with_manifest(&mut self, _manifest_url: &Url) -> bool {
            false
        }
    }

    fn host_with_target() -> (ApplicationCacheHost, Rc<Target>) {
        let target = Rc::new(Target::default());
        let mut host = ApplicationCacheHost::new();
        let weak: Weak<dyn ApplicationCacheEventTarget> = Rc::downgrade(&target) as Weak<Target>;
        host.set_application_cache(weak);
        (host, target)
    }

    #[test]
    fn events_are_held_until_deferral_stops() {
        let (mut host, target) = host_with_target();
        host.notify_application_cache(ApplicationCacheEvent::new(ApplicationCacheEventId::Checking));
        host.notify_application_cache(ApplicationCacheEvent::progress(2, 1));
        host.notify_application_cache(ApplicationCacheEvent::new(ApplicationCacheEventId::Cached));
        assert!(target.events.borrow().is_empty());
        assert_eq!(host.pending_event_count(), 3);

        host.stop_deferring_events();
        assert_eq!(
            target.events.borrow().as_slice(),
            &[
                ApplicationCacheEventId::Checking,
                ApplicationCacheEventId::Progress,
                ApplicationCacheEventId::Cached,
            ]
        );

        host.notify_application_cache(ApplicationCacheEvent::new(ApplicationCacheEventId::NoUpdate));
        assert_eq!(target.events.borrow().len(), 4);
        host.detach_from_document_loader();
    }

    #[test]
    fn detached_hosts_drop_events() {
        let (mut host, target) = host_with_target();
        assert!(!host.is_detached());
        host.detach_from_document_loader();
        assert!(host.is_detached());
        host.notify_application_cache(ApplicationCacheEvent::new(ApplicationCacheEventId::Error));
        host.stop_deferring_events();
        assert!(target.events.borrow().is_empty());
    }

    #[test]
    fn backend_decides_manifest_selection() {
        let mut host = ApplicationCacheHost::new();
        let url = match Url::parse("https://a.example/manifest") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(host.select_cache_with_manifest(&url));

        let mut request = ResourceRequest::new(url.clone());
        host.will_start_loading_main_resource(Some(Box::new(Backend)), &mut request);
        assert_eq!(host.status(), ApplicationCacheStatus::Idle);
        assert!(!host.select_cache_with_manifest(&url));
        host.detach_from_document_loader();
    }
}
