//! Navigation timing marks for one document load.

use pd_security::SchemeRegistry;
use pd_security::SecurityOrigin;
use std::time::Instant;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLoadTiming {
    navigation_start: Option<Instant>,
    fetch_start: Option<Instant>,
    redirect_start: Option<Instant>,
    redirect_end: Option<Instant>,
    redirect_count: u16,
    response_end: Option<Instant>,
    has_cross_origin_redirect: bool,
    has_same_origin_as_previous_document: bool,
}

impl DocumentLoadTiming {
    pub fn mark_navigation_start(&mut self, now: Instant) {
        if self.navigation_start.is_none() {
            self.navigation_start = Some(now);
        }
    }

    pub fn mark_fetch_start(&mut self, now: Instant) {
        self.fetch_start = Some(now);
    }

    pub fn mark_redirect_end(&mut self, now: Instant) {
        self.redirect_end = Some(now);
    }

    pub fn set_response_end(&mut self, at: Instant) {
        self.response_end = Some(at);
    }

    pub fn set_has_same_origin_as_previous_document(&mut self, value: bool) {
        self.has_same_origin_as_previous_document = value;
    }

    /// Records one redirect leg. The redirect window opens at the original
    /// fetch start and every leg restarts the fetch clock.
    pub fn add_redirect(
        &mut self,
        redirecting_url: &Url,
        redirected_url: &Url,
        registry: &SchemeRegistry,
        now: Instant,
    ) {
        self.redirect_count = self.redirect_count.saturating_add(1);
        if self.redirect_start.is_none() {
            self.redirect_start = self.fetch_start;
        }
        self.mark_redirect_end(now);
        self.mark_fetch_start(now);

        let redirected_origin = SecurityOrigin::create(redirected_url, registry);
        self.has_cross_origin_redirect |= !redirected_origin.can_request(redirecting_url, registry);
    }

    pub fn navigation_start(&self) -> Option<Instant> {
        self.navigation_start
    }

    pub fn fetch_start(&self) -> Option<Instant> {
        self.fetch_start
    }

    pub fn redirect_start(&self) -> Option<Instant> {
        self.redirect_start
    }

    pub fn redirect_end(&self) -> Option<Instant> {
        self.redirect_end
    }

    pub fn redirect_count(&self) -> u16 {
        self.redirect_count
    }

    pub fn response_end(&self) -> Option<Instant> {
        self.response_end
    }

    pub fn has_cross_origin_redirect(&self) -> bool {
        self.has_cross_origin_redirect
    }

    pub fn has_same_origin_as_previous_document(&self) -> bool {
        self.has_same_origin_as_previous_document
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentLoadTiming;
    use pd_security::SchemeRegistry;
    use std::time::Duration;
    use std::time::Instant;
    use url::Url;

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn redirects_extend_the_redirect_window() {
        let registry = SchemeRegistry::new();
        let start = Instant::now();
        let mut timing = DocumentLoadTiming::default();
        timing.mark_navigation_start(start);
        timing.mark_fetch_start(start);

        let first = start + Duration::from_millis(10);
        timing.add_redirect(
            &url("https://a.example/1"),
            &url("https://a.example/2"),
            &registry,
            first,
        );
        assert_eq!(timing.redirect_start(), Some(start));
        assert_eq!(timing.fetch_start(), Some(first));
        assert!(!timing.has_cross_origin_redirect());

        let second = start + Duration::from_millis(20);
        timing.add_redirect(
            &url("https://a.example/2"),
            &url("https://b.example/3"),
            &registry,
            second,
        );
        assert_eq!(timing.redirect_count(), 2);
        assert_eq!(timing.redirect_start(), Some(start));
        assert_eq!(timing.redirect_end(), Some(second));
        assert!(timing.has_cross_origin_redirect());
    }
}
