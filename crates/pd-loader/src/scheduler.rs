//! Deferred navigations: meta refresh, script-driven location changes,
//! reloads, form submissions and page blocks.
//!
//! A frame holds at most one pending navigation. Scheduling another cancels
//! it. The page pumps due navigations through
//! `Page::process_scheduled_navigations`.

use crate::context::LoaderContext;
use crate::frame_load_request::ClientRedirectPolicy;
use crate::frame_load_request::FormSubmission;
use crate::frame_load_request::FrameLoadRequest;
use crate::frame_load_request::FrameLoadType;
use crate::frame_load_request::SubstituteData;
use log::debug;
use pd_core::FrameId;
use pd_net::CachePolicy;
use pd_net::url::equal_ignoring_fragment;
use pd_net::url::is_javascript_url;
use pd_security::SecurityOrigin;
use std::time::Duration;
use std::time::Instant;
use url::Url;

/// Redirects that fire sooner than this replace the current history entry.
pub const LOCK_BACK_FORWARD_LIST_DELAY: Duration = Duration::from_secs(1);

const MAX_DELAY_SECONDS: f64 = i32::MAX as f64 / 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledNavigationKind {
    Redirect(Url),
    LocationChange(Url),
    Reload,
    PageBlock,
    FormSubmission(FormSubmission),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNavigation {
    pub kind: ScheduledNavigationKind,
    pub delay: Duration,
    pub origin: Option<SecurityOrigin>,
    pub lock_back_forward_list: bool,
    pub was_user_gesture: bool,
}

impl ScheduledNavigation {
    pub fn redirect(delay: Duration, url: Url, origin: Option<SecurityOrigin>) -> Self {
        Self {
            kind: ScheduledNavigationKind::Redirect(url),
            delay,
            origin,
            lock_back_forward_list: delay <= LOCK_BACK_FORWARD_LIST_DELAY,
            was_user_gesture: false,
        }
    }

    pub fn location_change(url: Url, origin: Option<SecurityOrigin>, lock_back_forward_list: bool) -> Self {
        Self {
            kind: ScheduledNavigationKind::LocationChange(url),
            delay: Duration::ZERO,
            origin,
            lock_back_forward_list,
            was_user_gesture: false,
        }
    }

    pub fn reload() -> Self {
        Self {
            kind: ScheduledNavigationKind::Reload,
            delay: Duration::ZERO,
            origin: None,
            lock_back_forward_list: true,
            was_user_gesture: false,
        }
    }

    pub fn page_block(origin: Option<SecurityOrigin>) -> Self {
        Self {
            kind: ScheduledNavigationKind::PageBlock,
            delay: Duration::ZERO,
            origin,
            lock_back_forward_list: true,
            was_user_gesture: false,
        }
    }

    pub fn form_submission(form: FormSubmission, origin: Option<SecurityOrigin>, lock_back_forward_list: bool) -> Self {
        Self {
            kind: ScheduledNavigationKind::FormSubmission(form),
            delay: Duration::ZERO,
            origin,
            lock_back_forward_list,
            was_user_gesture: false,
        }
    }

    pub fn with_user_gesture(mut self, was_user_gesture: bool) -> Self {
        self.was_user_gesture = was_user_gesture;
        self
    }

    /// Location changes and form submissions count as navigations
    /// already under way for `FrameLoader::is_loading_or_scheduled`.
    /// Refresh redirects wait for the load event before their clock starts.
    fn should_start_timer(&self, load_event_finished: bool) -> bool {
        !matches!(self.kind, ScheduledNavigationKind::Redirect(_)) || load_event_finished
    }

    /// The load firing this navigation performs. `current_url` is the URL
    /// of the frame's current document.
    pub fn to_load_request(&self, current_url: &Url) -> (FrameLoadRequest, Option<FrameLoadType>) {
        let (mut request, load_type) = match &self.kind {
            ScheduledNavigationKind::Redirect(url) => {
                let mut request = FrameLoadRequest::from_url(url.clone())
                    .with_client_redirect(ClientRedirectPolicy::ClientRedirect);
                if equal_ignoring_fragment(current_url, url) {
                    request = request.with_cache_policy(CachePolicy::ReloadIgnoringCacheData);
                }
                (request, None)
            }
            ScheduledNavigationKind::LocationChange(url) => (
                FrameLoadRequest::from_url(url.clone())
                    .with_client_redirect(ClientRedirectPolicy::ClientRedirect),
                None,
            ),
            ScheduledNavigationKind::Reload => (
                FrameLoadRequest::from_url(current_url.clone())
                    .with_client_redirect(ClientRedirectPolicy::ClientRedirect),
                Some(FrameLoadType::Reload),
            ),
            ScheduledNavigationKind::PageBlock => (
                FrameLoadRequest::from_url(current_url.clone())
                    .with_substitute_data(SubstituteData::new(Vec::new(), "text/plain", "UTF-8")),
                None,
            ),
            ScheduledNavigationKind::FormSubmission(form) => (FrameLoadRequest::from_form(form.clone()), None),
        };
        request = request.with_lock_back_forward_list(self.lock_back_forward_list);
        if let Some(origin) = &self.origin {
            request = request.with_origin(origin.clone());
        }
        (request, load_type)
    }
}

/// Converts a refresh delay in seconds, refusing negative or absurd values.
pub fn redirect_delay(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || !(0.0..=MAX_DELAY_SECONDS).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

/// Whether `frame` may schedule a navigation to `url` right now.
///
/// `javascript:` URLs are allowed through while `beforeunload` runs since
/// they never leave the current document.
pub fn should_schedule_navigation(context: &LoaderContext, frame: FrameId, url: &Url) -> bool {
    let tree = context.frame_tree();
    tree.is_attached(frame)
        && tree.is_navigation_allowed(frame)
        && (is_javascript_url(url.as_str()) || context.is_navigation_allowed_during_before_unload())
}

#[derive(Debug)]
pub struct NavigationScheduler {
    frame: FrameId,
    pending: Option<ScheduledNavigation>,
    fire_at: Option<Instant>,
}

impl NavigationScheduler {
    pub fn new(frame: FrameId) -> Self {
        Self {
            frame,
            pending: None,
            fire_at: None,
        }
    }

    pub fn is_navigation_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&ScheduledNavigation> {
        self.pending.as_ref()
    }

    pub fn is_timer_active(&self) -> bool {
        self.fire_at.is_some()
    }

    pub fn fire_time(&self) -> Option<Instant> {
        self.fire_at
    }

    /// A redirect only displaces a pending navigation that would fire
    /// later than it.
    pub fn should_replace_with_redirect(&self, delay: Duration) -> bool {
        self.pending.as_ref().is_none_or(|pending| delay <= pending.delay)
    }

    pub fn schedule(&mut self, navigation: ScheduledNavigation, now: Instant, load_event_finished: bool) {
        self.cancel();
        debug!(
            "frame {} scheduled {:?} in {:?}",
            self.frame, navigation.kind, navigation.delay
        );
        self.pending = Some(navigation);
        self.start_timer(now, load_event_finished);
    }

    pub fn start_timer(&mut self, now: Instant, load_event_finished: bool) {
        if self.fire_at.is_some() {
            return;
        }
        let Some(pending) = &self.pending else {
            return;
        };
        if !pending.should_start_timer(load_event_finished) {
            return;
        }
        self.fire_at = Some(now + pending.delay);
    }

    /// Hands out the pending navigation once its timer has expired.
    pub fn take_due(&mut self, now: Instant) -> Option<ScheduledNavigation> {
        let fire_at = self.fire_at?;
        if fire_at > now {
            return None;
        }
        self.fire_at = None;
        self.pending.take()
    }

    pub fn cancel(&mut self) -> Option<ScheduledNavigation> {
        self.fire_at = None;
        let cancelled = self.pending.take();
        if let Some(navigation) = &cancelled {
            debug!("frame {} cancelled scheduled {:?}", self.frame, navigation.kind);
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::NavigationScheduler;
    use super::ScheduledNavigation;
    use super::ScheduledNavigationKind;
    use super::redirect_delay;
    use super::should_schedule_navigation;
    use crate::config::LoaderSettings;
    use crate::context::FrameNavigationDisabler;
    use crate::context::LoaderContext;
    use crate::context::NavigationDisablerForBeforeUnload;
    use crate::frame_load_request::FrameLoadType;
    use pd_core::BrowserResult;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::CachePolicy;
    use pd_net::NetworkBackend;
    use pd_net::ResourceRequest;
    use std::rc::Rc;
    use std::time::Duration;
    use std::time::Instant;
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

    #[test]
    fn redirects_wait_for_the_load_event() {
        let start = Instant::now();
        let mut scheduler = NavigationScheduler::new(FrameId::new(1));
        scheduler.schedule(
            ScheduledNavigation::redirect(Duration::from_secs(2), url("https://a.example/next"), None),
            start,
            false,
        );
        assert!(scheduler.is_navigation_scheduled());
        assert!(!scheduler.is_timer_active());
        assert_eq!(scheduler.fire_time(), None);
        assert!(scheduler.take_due(start + Duration::from_secs(10)).is_none());

        let loaded = start + Duration::from_secs(1);
        scheduler.start_timer(loaded, true);
        assert_eq!(scheduler.fire_time(), Some(loaded + Duration::from_secs(2)));
        assert!(scheduler.take_due(loaded + Duration::from_millis(1999)).is_none());
        let fired = scheduler.take_due(loaded + Duration::from_secs(2));
        assert!(matches!(
            fired.map(|navigation| navigation.kind),
            Some(ScheduledNavigationKind::Redirect(_))
        ));
        assert!(!scheduler.is_navigation_scheduled());
    }

    #[test]
    fn shorter_pending_redirect_is_kept() {
        let mut scheduler = NavigationScheduler::new(FrameId::new(1));
        scheduler.schedule(
            ScheduledNavigation::redirect(Duration::from_secs(1), url("https://a.example/one"), None),
            Instant::now(),
            true,
        );
        assert!(!scheduler.should_replace_with_redirect(Duration::from_secs(5)));
        assert!(scheduler.should_replace_with_redirect(Duration::from_secs(1)));
        assert!(scheduler.should_replace_with_redirect(Duration::ZERO));
    }

    #[test]
    fn short_redirects_lock_history() {
        let quick = ScheduledNavigation::redirect(Duration::from_millis(500), url("https://a.example/"), None);
        assert!(quick.lock_back_forward_list);
        let slow = ScheduledNavigation::redirect(Duration::from_secs(3), url("https://a.example/"), None);
        assert!(!slow.lock_back_forward_list);
    }

    #[test]
    fn redirect_to_the_same_document_revalidates() {
        let navigation = ScheduledNavigation::redirect(Duration::ZERO, url("https://a.example/page#x"), None);
        let (request, load_type) = navigation.to_load_request(&url("https://a.example/page"));
        assert_eq!(request.resource_request.cache_policy, CachePolicy::ReloadIgnoringCacheData);
        assert!(load_type.is_none());

        let (reload, load_type) = ScheduledNavigation::reload().to_load_request(&url("https://a.example/page"));
        assert_eq!(reload.url().as_str(), "https://a.example/page");
        assert_eq!(load_type, Some(FrameLoadType::Reload));
    }

    #[test]
    fn delays_are_validated() {
        assert_eq!(redirect_delay(1.5), Some(Duration::from_millis(1500)));
        assert!(redirect_delay(-1.0).is_none());
        assert!(redirect_delay(f64::NAN).is_none());
        assert!(redirect_delay(1.0e12).is_none());
    }

    #[test]
    fn before_unload_only_admits_javascript_urls() {
        let context = match LoaderContext::new(
            LoaderSettings::default(),
            Rc::new(NullBackend),
            Rc::new(ManualClock::new()),
        ) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let frame = FrameId::new(1);
        assert!(context.frame_tree_mut().insert_main_frame(frame).is_ok());
        let target = url("https://a.example/");
        let script = url("javascript:void(0)");
        assert!(should_schedule_navigation(&context, frame, &target));

        {
            let _disabler = NavigationDisablerForBeforeUnload::new(&context);
            assert!(!should_schedule_navigation(&context, frame, &target));
            assert!(should_schedule_navigation(&context, frame, &script));
        }

        {
            let _disabler = FrameNavigationDisabler::new(&context, frame);
            assert!(!should_schedule_navigation(&context, frame, &script));
        }
        assert!(should_schedule_navigation(&context, frame, &target));
    }
}
