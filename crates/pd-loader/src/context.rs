//! Page-wide loading state shared by every frame loader.
//!
//! Anything that would otherwise be a process-global counter lives here and
//! is reached through the `Rc<LoaderContext>` each loader holds. Embedder
//! callbacks may hold the same `Rc` and use it to detach frames or request
//! navigations while a load is in progress; those requests are queued as
//! `FrameTask`s and drained by the page once the current call unwinds.

use crate::config::LoaderSettings;
use crate::frame_load_request::FrameLoadRequest;
use crate::frame_tree::FrameTree;
use crate::history::BackForwardList;
use log::debug;
use pd_core::BrowserResult;
use pd_core::Clock;
use pd_core::FrameId;
use pd_core::IdentifierAllocator;
use pd_net::NetworkBackend;
use pd_security::SchemeRegistry;
use pd_storage::MemoryCache;
use std::cell::Cell;
use std::cell::Ref;
use std::cell::RefCell;
use std::cell::RefMut;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

/// Work a frame asks another frame (or itself) to do later.
#[derive(Debug)]
pub enum FrameTask {
    CheckCompleted(FrameId),
    StopAllLoaders(FrameId),
    Detach(FrameId),
    Navigate(FrameId, Box<FrameLoadRequest>),
}

pub struct LoaderContext {
    settings: LoaderSettings,
    scheme_registry: SchemeRegistry,
    clock: Rc<dyn Clock>,
    identifiers: IdentifierAllocator,
    backend: Rc<dyn NetworkBackend>,
    frame_tree: RefCell<FrameTree>,
    memory_cache: RefCell<MemoryCache>,
    back_forward: RefCell<BackForwardList>,
    navigation_disabled_for_before_unload: Cell<u32>,
    user_gesture: Cell<u32>,
    tasks: RefCell<VecDeque<FrameTask>>,
}

impl LoaderContext {
    pub fn new(
        settings: LoaderSettings,
        backend: Rc<dyn NetworkBackend>,
        clock: Rc<dyn Clock>,
    ) -> BrowserResult<Rc<Self>> {
        Self::with_scheme_registry(settings, SchemeRegistry::default(), backend, clock)
    }

    pub fn with_scheme_registry(
        settings: LoaderSettings,
        scheme_registry: SchemeRegistry,
        backend: Rc<dyn NetworkBackend>,
        clock: Rc<dyn Clock>,
    ) -> BrowserResult<Rc<Self>> {
        settings.validate()?;
        let memory_cache = MemoryCache::new(settings.memory_cache.clone());
        Ok(Rc::new(Self {
            settings,
            scheme_registry,
            clock,
            identifiers: IdentifierAllocator::new(),
            backend,
            frame_tree: RefCell::new(FrameTree::new()),
            memory_cache: RefCell::new(memory_cache),
            back_forward: RefCell::new(BackForwardList::new()),
            navigation_disabled_for_before_unload: Cell::new(0),
            user_gesture: Cell::new(0),
            tasks: RefCell::new(VecDeque::new()),
        }))
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn scheme_registry(&self) -> &SchemeRegistry {
        &self.scheme_registry
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn identifiers(&self) -> &IdentifierAllocator {
        &self.identifiers
    }

    pub fn backend(&self) -> Rc<dyn NetworkBackend> {
        Rc::clone(&self.backend)
    }

    pub fn frame_tree(&self) -> Ref<'_, FrameTree> {
        self.frame_tree.borrow()
    }

    pub fn frame_tree_mut(&self) -> RefMut<'_, FrameTree> {
        self.frame_tree.borrow_mut()
    }

    pub fn memory_cache(&self) -> Ref<'_, MemoryCache> {
        self.memory_cache.borrow()
    }

    pub fn memory_cache_mut(&self) -> RefMut<'_, MemoryCache> {
        self.memory_cache.borrow_mut()
    }

    pub fn back_forward_list(&self) -> Ref<'_, BackForwardList> {
        self.back_forward.borrow()
    }

    pub fn back_forward_list_mut(&self) -> RefMut<'_, BackForwardList> {
        self.back_forward.borrow_mut()
    }

    pub fn is_navigation_allowed_during_before_unload(&self) -> bool {
        self.navigation_disabled_for_before_unload.get() == 0
    }

    pub fn processing_user_gesture(&self) -> bool {
        self.user_gesture.get() > 0
    }

    /// Detaches `frame` and its subtree right away; their loaders are torn
    /// down when the page next drains its task queue.
    pub fn detach_frame(&self, frame: FrameId) {
        let detached = self.frame_tree.borrow_mut().detach(frame);
        if detached.is_empty() {
            return;
        }
        debug!("frame {frame} detached with {} descendants", detached.len() - 1);
        self.post_task(FrameTask::Detach(frame));
    }

    pub fn request_stop(&self, frame: FrameId) {
        self.post_task(FrameTask::StopAllLoaders(frame));
    }

    pub fn request_navigation(&self, frame: FrameId, request: FrameLoadRequest) {
        self.post_task(FrameTask::Navigate(frame, Box::new(request)));
    }

    pub fn post_task(&self, task: FrameTask) {
        self.tasks.borrow_mut().push_back(task);
    }

    pub fn take_task(&self) -> Option<FrameTask> {
        self.tasks.borrow_mut().pop_front()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.tasks.borrow().is_empty()
    }
}

/// Suppresses every non-`javascript:` navigation while `beforeunload`
/// handlers run. Nestable.
pub struct NavigationDisablerForBeforeUnload {
    context: Rc<LoaderContext>,
}

impl NavigationDisablerForBeforeUnload {
    pub fn new(context: &Rc<LoaderContext>) -> Self {
        let count = &context.navigation_disabled_for_before_unload;
        count.set(count.get().saturating_add(1));
        Self {
            context: Rc::clone(context),
        }
    }
}

impl Drop for NavigationDisablerForBeforeUnload {
    fn drop(&mut self) {
        let count = &self.context.navigation_disabled_for_before_unload;
        count.set(count.get().saturating_sub(1));
    }
}

/// Forbids scheduling navigations in one frame for the guard's lifetime.
pub struct FrameNavigationDisabler {
    context: Rc<LoaderContext>,
    frame: FrameId,
}

impl FrameNavigationDisabler {
    pub fn new(context: &Rc<LoaderContext>, frame: FrameId) -> Self {
        context.frame_tree_mut().disable_navigation(frame);
        Self {
            context: Rc::clone(context),
            frame,
        }
    }
}

impl Drop for FrameNavigationDisabler {
    fn drop(&mut self) {
        self.context.frame_tree_mut().enable_navigation(self.frame);
    }
}

/// Marks the enclosed work as triggered by the user.
pub struct UserGestureIndicator {
    context: Rc<LoaderContext>,
}

impl UserGestureIndicator {
    pub fn new(context: &Rc<LoaderContext>) -> Self {
        let count = &context.user_gesture;
        count.set(count.get().saturating_add(1));
        Self {
            context: Rc::clone(context),
        }
    }
}

impl Drop for UserGestureIndicator {
    fn drop(&mut self) {
        let count = &self.context.user_gesture;
        count.set(count.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::FrameNavigationDisabler;
    use super::FrameTask;
    use super::LoaderContext;
    use super::NavigationDisablerForBeforeUnload;
    use super::UserGestureIndicator;
    use crate::config::LoaderSettings;
    use pd_core::BrowserResult;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::NetworkBackend;
    use pd_net::ResourceRequest;
    use std::rc::Rc;

    struct NullBackend;

    impl NetworkBackend for NullBackend {
        fn start(&self, _identifier: ResourceId, _request: &ResourceRequest) -> BrowserResult<()> {
            Ok(())
        }

        fn cancel(&self, _identifier: ResourceId) {}
    }

    fn context() -> Rc<LoaderContext> {
        match LoaderContext::new(
            LoaderSettings::default(),
            Rc::new(NullBackend),
            Rc::new(ManualClock::new()),
        ) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn before_unload_disabler_nests() {
        let context = context();
        assert!(context.is_navigation_allowed_during_before_unload());
        {
            let _outer = NavigationDisablerForBeforeUnload::new(&context);
            {
                let _inner = NavigationDisablerForBeforeUnload::new(&context);
                assert!(!context.is_navigation_allowed_during_before_unload());
            }
            assert!(!context.is_navigation_allowed_during_before_unload());
        }
        assert!(context.is_navigation_allowed_during_before_unload());
    }

    #[test]
    fn frame_disabler_is_scoped_to_one_frame() {
        let context = context();
        assert!(context.frame_tree_mut().insert_main_frame(FrameId::new(1)).is_ok());
        {
            let _disabler = FrameNavigationDisabler::new(&context, FrameId::new(1));
            assert!(!context.frame_tree().is_navigation_allowed(FrameId::new(1)));
        }
        assert!(context.frame_tree().is_navigation_allowed(FrameId::new(1)));
    }

    #[test]
    fn user_gesture_is_released_on_drop() {
        let context = context();
        let gesture = UserGestureIndicator::new(&context);
        assert!(context.processing_user_gesture());
        drop(gesture);
        assert!(!context.processing_user_gesture());
    }

    #[test]
    fn detaching_queues_teardown_once() {
        let context = context();
        assert!(context.frame_tree_mut().insert_main_frame(FrameId::new(1)).is_ok());
        context.detach_frame(FrameId::new(1));
        context.detach_frame(FrameId::new(1));
        assert!(matches!(context.take_task(), Some(FrameTask::Detach(id)) if id == FrameId::new(1)));
        assert!(context.take_task().is_none());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = LoaderSettings {
            device_pixel_ratio: 0.0,
            ..LoaderSettings::default()
        };
        let result = LoaderContext::new(settings, Rc::new(NullBackend), Rc::new(ManualClock::new()));
        assert!(result.is_err());
    }
}
