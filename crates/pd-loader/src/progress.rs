//! Byte-weighted load progress for one frame.
//!
//! Progress starts at 0.1 when a load begins. It approaches 0.5 until first
//! layout and 0.9 after it. Only `progress_completed` reaches 1.0.

use crate::client::LifecycleClient;
use log::debug;
use pd_core::Clock;
use pd_core::FrameId;
use pd_core::ResourceId;
use pd_net::ResourceResponse;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

const INITIAL_PROGRESS_VALUE: f64 = 0.1;
const FIRST_LAYOUT_PROGRESS_VALUE: f64 = 0.5;
const FINAL_PROGRESS_VALUE: f64 = 0.9;
const DEFAULT_ESTIMATED_LENGTH: u64 = 16 * 1024;
const PROGRESS_NOTIFICATION_INTERVAL: f64 = 0.02;
const PROGRESS_NOTIFICATION_TIME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProgressItem {
    bytes_received: u64,
    estimated_length: u64,
}

pub struct ProgressTracker {
    frame: FrameId,
    client: Rc<dyn LifecycleClient>,
    clock: Rc<dyn Clock>,
    items: HashMap<ResourceId, ProgressItem>,
    total_page_and_resource_bytes_to_load: u64,
    total_bytes_received: u64,
    progress_value: f64,
    last_notified_progress_value: f64,
    last_notified_progress_time: Option<Instant>,
    final_progress_changed_sent: bool,
    did_first_layout: bool,
    is_loading: bool,
}

impl ProgressTracker {
    pub fn new(frame: FrameId, client: Rc<dyn LifecycleClient>, clock: Rc<dyn Clock>) -> Self {
        Self {
            frame,
            client,
            clock,
            items: HashMap::new(),
            total_page_and_resource_bytes_to_load: 0,
            total_bytes_received: 0,
            progress_value: 0.0,
            last_notified_progress_value: 0.0,
            last_notified_progress_time: None,
            final_progress_changed_sent: false,
            did_first_layout: false,
            is_loading: false,
        }
    }

    pub fn estimated_progress(&self) -> f64 {
        self.progress_value
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn final_progress_changed_sent(&self) -> bool {
        self.final_progress_changed_sent
    }

    pub fn progress_started(&mut self) {
        if !self.is_loading {
            self.client.did_start_loading(self.frame);
        }
        self.reset();
        self.progress_value = INITIAL_PROGRESS_VALUE;
        self.final_progress_changed_sent = false;
        self.is_loading = true;
        debug!("frame {} started loading", self.frame);
    }

    /// Ends the load: progress becomes exactly 1.0 and the embedder hears
    /// about it at most once per load.
    pub fn progress_completed(&mut self) {
        self.is_loading = false;
        self.send_final_progress();
        self.reset();
        self.client.did_stop_loading(self.frame);
        debug!("frame {} stopped loading", self.frame);
    }

    pub fn did_first_layout(&mut self) {
        self.did_first_layout = true;
    }

    /// Registers `identifier` with its expected length, or a default guess.
    pub fn increment_progress_for_response(
        &mut self,
        identifier: ResourceId,
        response: &ResourceResponse,
    ) {
        let estimated_length = response
            .expected_content_length
            .unwrap_or(DEFAULT_ESTIMATED_LENGTH);
        self.total_page_and_resource_bytes_to_load = self
            .total_page_and_resource_bytes_to_load
            .saturating_add(estimated_length);
        self.items.insert(
            identifier,
            ProgressItem {
                bytes_received: 0,
                estimated_length,
            },
        );
    }

    /// Accounts `length` new bytes. `pending_requests` is the number of
    /// requests that have not produced a response yet.
    pub fn increment_progress(
        &mut self,
        identifier: ResourceId,
        length: u64,
        pending_requests: usize,
    ) {
        let Some(item) = self.items.get_mut(&identifier) else {
            return;
        };

        item.bytes_received = item.bytes_received.saturating_add(length);
        if item.bytes_received > item.estimated_length {
            let doubled = item.bytes_received.saturating_mul(2);
            self.total_page_and_resource_bytes_to_load = self
                .total_page_and_resource_bytes_to_load
                .saturating_add(doubled - item.estimated_length);
            item.estimated_length = doubled;
        }

        let pending_estimate = DEFAULT_ESTIMATED_LENGTH
            .saturating_mul(u64::try_from(pending_requests).unwrap_or(u64::MAX));
        let remaining_bytes = self
            .total_page_and_resource_bytes_to_load
            .saturating_add(pending_estimate)
            .saturating_sub(self.total_bytes_received);
        let percent_of_remaining_bytes = if remaining_bytes > 0 {
            length as f64 / remaining_bytes as f64
        } else {
            1.0
        };

        let max_progress_value = if self.did_first_layout {
            FINAL_PROGRESS_VALUE
        } else {
            FIRST_LAYOUT_PROGRESS_VALUE
        };
        let increment = (max_progress_value - self.progress_value) * percent_of_remaining_bytes;
        if increment > 0.0 {
            self.progress_value = (self.progress_value + increment).min(max_progress_value);
        }
        self.total_bytes_received = self.total_bytes_received.saturating_add(length);

        let now = self.clock.now();
        let time_elapsed = self
            .last_notified_progress_time
            .is_none_or(|last| now.saturating_duration_since(last) >= PROGRESS_NOTIFICATION_TIME_INTERVAL);
        let progress_delta = self.progress_value - self.last_notified_progress_value;
        if (progress_delta >= PROGRESS_NOTIFICATION_INTERVAL || time_elapsed)
            && !self.final_progress_changed_sent
        {
            self.client
                .progress_estimate_changed(self.frame, self.progress_value);
            self.last_notified_progress_value = self.progress_value;
            self.last_notified_progress_time = Some(now);
        }
    }

    /// Settles the byte totals for a finished or failed resource.
    pub fn complete_progress(&mut self, identifier: ResourceId) {
        let Some(item) = self.items.remove(&identifier) else {
            return;
        };
        self.total_page_and_resource_bytes_to_load = self
            .total_page_and_resource_bytes_to_load
            .saturating_add(item.bytes_received)
            .saturating_sub(item.estimated_length);
    }

    /// Completes an in-flight load before the frame goes away.
    pub fn dispose(&mut self) {
        if self.is_loading {
            self.progress_completed();
        }
    }

    fn send_final_progress(&mut self) {
        self.progress_value = 1.0;
        if self.final_progress_changed_sent {
            return;
        }
        self.final_progress_changed_sent = true;
        self.client.progress_estimate_changed(self.frame, self.progress_value);
        self.last_notified_progress_value = self.progress_value;
        self.last_notified_progress_time = Some(self.clock.now());
    }

    fn reset(&mut self) {
        self.items.clear();
        self.total_page_and_resource_bytes_to_load = 0;
        self.total_bytes_received = 0;
        self.last_notified_progress_value = 0.0;
        self.last_notified_progress_time = None;
        self.did_first_layout = false;
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressTracker;
    use crate::client::LifecycleClient;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::ResourceResponse;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        progress: RefCell<Vec<f64>>,
        starts: RefCell<u32>,
        stops: RefCell<u32>,
    }

    impl LifecycleClient for Recorder {
        fn did_start_loading(&self, _frame: FrameId) {
            *self.starts.borrow_mut() += 1;
        }

        fn did_stop_loading(&self, _frame: FrameId) {
            *self.stops.borrow_mut() += 1;
        }

        fn progress_estimate_changed(&self, _frame: FrameId, progress: f64) {
            self.progress.borrow_mut().push(progress);
        }
    }

    fn tracker() -> (ProgressTracker, Rc<Recorder>, Rc<ManualClock>) {
        let recorder = Rc::new(Recorder::default());
        let clock = Rc::new(ManualClock::new());
        let tracker = ProgressTracker::new(FrameId::new(1), recorder.clone(), clock.clone());
        (tracker, recorder, clock)
    }

    fn response(length: Option<u64>) -> ResourceResponse {
        let url = match Url::parse("https://a.example/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        ResourceResponse::synthetic(url, "text/html", length, None)
    }

    #[test]
    fn completion_reports_exactly_one_final_value() {
        let (mut tracker, recorder, _clock) = tracker();
        tracker.progress_started();
        assert!((tracker.estimated_progress() - 0.1).abs() < f64::EPSILON);

        tracker.progress_completed();
        assert!((tracker.estimated_progress() - 1.0).abs() < f64::EPSILON);
        assert_eq!(recorder.progress.borrow().as_slice(), &[1.0]);
        assert!(tracker.final_progress_changed_sent());

        tracker.progress_completed();
        assert!((tracker.estimated_progress() - 1.0).abs() < f64::EPSILON);
        assert_eq!(recorder.progress.borrow().len(), 1);
        assert_eq!(*recorder.starts.borrow(), 1);
        assert_eq!(*recorder.stops.borrow(), 2);
    }

    #[test]
    fn progress_is_capped_before_first_layout() {
        let (mut tracker, _recorder, _clock) = tracker();
        tracker.progress_started();
        let id = ResourceId::new(1);
        tracker.increment_progress_for_response(id, &response(Some(100)));
        tracker.increment_progress(id, 100, 0);
        assert!(tracker.estimated_progress() <= 0.5);

        tracker.did_first_layout();
        tracker.increment_progress(id, 1000, 0);
        let value = tracker.estimated_progress();
        assert!(value > 0.5 && value <= 0.9);
    }

    #[test]
    fn notifications_are_rate_limited() {
        let (mut tracker, recorder, clock) = tracker();
        tracker.progress_started();
        let id = ResourceId::new(1);
        tracker.increment_progress_for_response(id, &response(None));

        tracker.increment_progress(id, 1, 0);
        assert_eq!(recorder.progress.borrow().len(), 1);

        tracker.increment_progress(id, 1, 0);
        assert_eq!(recorder.progress.borrow().len(), 1);

        clock.advance(Duration::from_millis(100));
        tracker.increment_progress(id, 1, 0);
        assert_eq!(recorder.progress.borrow().len(), 2);

        let values = recorder.progress.borrow().clone();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn a_new_load_resets_the_final_notification() {
        let (mut tracker, recorder, _clock) = tracker();
        tracker.progress_started();
        tracker.progress_completed();
        tracker.progress_started();
        assert!(!tracker.final_progress_changed_sent());
        tracker.progress_completed();
        assert_eq!(recorder.progress.borrow().as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn later_loads_report_incremental_progress() {
        let (mut tracker, recorder, _clock) = tracker();
        tracker.progress_started();
        tracker.progress_completed();

        tracker.progress_started();
        let id = ResourceId::new(2);
        tracker.increment_progress_for_response(id, &response(Some(100)));
        tracker.increment_progress(id, 50, 0);
        assert_eq!(recorder.progress.borrow().len(), 2);
        let partial = recorder.progress.borrow()[1];
        assert!(partial > 0.1 && partial < 1.0);

        tracker.progress_completed();
        assert_eq!(recorder.progress.borrow().last().copied(), Some(1.0));
        assert_eq!(recorder.progress.borrow().len(), 3);
        assert_eq!(*recorder.starts.borrow(), 2);
    }

    #[test]
    fn unknown_identifiers_are_ignored() {
        let (mut tracker, recorder, _clock) = tracker();
        tracker.progress_started();
        tracker.increment_progress(ResourceId::new(9), 500, 0);
        tracker.complete_progress(ResourceId::new(9));
        assert!(recorder.progress.borrow().is_empty());
    }
}
