//! The set of frame loaders belonging to one top-level browsing context.
//!
//! Loaders never call into each other. Cross-frame work is queued on the
//! `LoaderContext` and run here by `run_tasks` after the current call has
//! returned, so no two frame loaders are ever borrowed at once.

use crate::appcache::ApplicationCacheEvent;
use crate::appcache::ApplicationCacheEventTarget;
use crate::client::FrameClients;
use crate::context::FrameTask;
use crate::context::LoaderContext;
use crate::frame_load_request::ClientRedirectPolicy;
use crate::frame_load_request::FrameLoadRequest;
use crate::frame_loader::FrameLoader;
use crate::frame_tree::FrameOwner;
use crate::history::HistoryLoadType;
use log::debug;
use log::warn;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::FrameId;
use pd_core::ResourceId;
use pd_net::ResourceError;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::rc::Weak;
use std::time::Instant;

pub struct Page {
    context: Rc<LoaderContext>,
    frames: BTreeMap<FrameId, FrameLoader>,
    main_frame: FrameId,
}

impl Page {
    /// Creates the main frame showing its initial empty document.
    pub fn new(context: Rc<LoaderContext>, clients: FrameClients) -> BrowserResult<Self> {
        let main_frame = context.identifiers().next_frame();
        let frame = context.frame_tree_mut().insert_main_frame(main_frame)?;
        let mut loader = FrameLoader::new(frame, Rc::clone(&context), clients);
        loader.init();
        let mut frames = BTreeMap::new();
        frames.insert(main_frame, loader);
        Ok(Self {
            context,
            frames,
            main_frame,
        })
    }

    pub fn context(&self) -> &Rc<LoaderContext> {
        &self.context
    }

    pub fn main_frame(&self) -> FrameId {
        self.main_frame
    }

    pub fn frame(&self, id: FrameId) -> Option<&FrameLoader> {
        self.frames.get(&id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut FrameLoader> {
        self.frames.get_mut(&id)
    }

    pub fn main_frame_loader(&self) -> Option<&FrameLoader> {
        self.frames.get(&self.main_frame)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Inserts a child frame under `parent`. The child starts on its own
    /// initial empty document.
    pub fn create_child_frame(
        &mut self,
        parent: FrameId,
        name: &str,
        owner: FrameOwner,
        clients: FrameClients,
    ) -> BrowserResult<FrameId> {
        if !self.frames.contains_key(&parent) {
            return Err(BrowserError::new(
                "loader.frame_unknown",
                format!("frame {parent} does not belong to this page"),
            ));
        }
        let id = self.context.identifiers().next_frame();
        let frame = self
            .context
            .frame_tree_mut()
            .insert_child_frame(parent, id, name, owner)?;
        let mut loader = FrameLoader::new(frame, Rc::clone(&self.context), clients);
        loader.init();
        self.frames.insert(id, loader);
        debug!("frame {id} created under {parent}");
        Ok(id)
    }

    /// Navigates `frame` and runs whatever the navigation queued.
    pub fn load(&mut self, frame: FrameId, request: FrameLoadRequest) -> BrowserResult<()> {
        self.known_frame_mut(frame)?
            .load(request, None, None, HistoryLoadType::DifferentDocument);
        self.run_tasks();
        Ok(())
    }

    fn known_frame_mut(&mut self, frame: FrameId) -> BrowserResult<&mut FrameLoader> {
        self.frames.get_mut(&frame).ok_or_else(|| {
            BrowserError::new(
                "loader.frame_unknown",
                format!("no loader for frame {frame}"),
            )
        })
    }

    pub fn reload(&mut self, end_to_end: bool) {
        if let Some(loader) = self.frames.get_mut(&self.main_frame) {
            loader.reload(end_to_end, ClientRedirectPolicy::NotClientRedirect);
        }
        self.run_tasks();
    }

    /// Moves through session history. False when there is no entry at
    /// `offset`.
    pub fn go_to_offset(&mut self, offset: i32) -> bool {
        let item = self
            .context
            .back_forward_list_mut()
            .go_to_offset(offset)
            .cloned();
        let Some(item) = item else {
            return false;
        };
        if let Some(loader) = self.frames.get_mut(&self.main_frame) {
            loader.load_history_item(item);
        }
        self.run_tasks();
        true
    }

    pub fn go_back(&mut self) -> bool {
        self.go_to_offset(-1)
    }

    pub fn go_forward(&mut self) -> bool {
        self.go_to_offset(1)
    }

    fn owner_of(&mut self, identifier: ResourceId) -> Option<&mut FrameLoader> {
        self.frames
            .values_mut()
            .find(|loader| loader.owns_resource(identifier))
    }

    pub fn did_receive_redirect(
        &mut self,
        identifier: ResourceId,
        new_request: &mut ResourceRequest,
        redirect_response: &ResourceResponse,
    ) -> bool {
        let follow = match self.owner_of(identifier) {
            Some(loader) => loader.did_receive_redirect(identifier, new_request, redirect_response),
            None => {
                warn!("redirect for unknown resource {identifier}");
                false
            }
        };
        self.run_tasks();
        follow
    }

    pub fn did_receive_response(&mut self, identifier: ResourceId, response: ResourceResponse) {
        match self.owner_of(identifier) {
            Some(loader) => loader.did_receive_response(identifier, response),
            None => debug!("response for unknown resource {identifier}"),
        }
        self.run_tasks();
    }

    pub fn did_receive_data(&mut self, identifier: ResourceId, data: &[u8]) {
        if let Some(loader) = self.owner_of(identifier) {
            loader.did_receive_data(identifier, data);
        }
        self.run_tasks();
    }

    pub fn did_finish_loading(&mut self, identifier: ResourceId, finish_time: Instant) {
        if let Some(loader) = self.owner_of(identifier) {
            loader.did_finish_loading(identifier, finish_time);
        }
        self.run_tasks();
    }

    pub fn did_fail(&mut self, identifier: ResourceId, error: ResourceError) {
        match self.owner_of(identifier) {
            Some(loader) => loader.did_fail(identifier, error),
            None => debug!("failure for unknown resource {identifier}: {error}"),
        }
        self.run_tasks();
    }

    /// Relays an event from the application cache backend serving `frame`.
    /// Events stay queued until the frame's `load` event has fired.
    pub fn notify_application_cache(
        &mut self,
        frame: FrameId,
        event: ApplicationCacheEvent,
    ) -> BrowserResult<()> {
        self.known_frame_mut(frame)?.notify_application_cache(event);
        self.run_tasks();
        Ok(())
    }

    pub fn set_application_cache(
        &mut self,
        frame: FrameId,
        target: Weak<dyn ApplicationCacheEventTarget>,
    ) -> BrowserResult<()> {
        self.known_frame_mut(frame)?.set_application_cache(target);
        Ok(())
    }

    /// Stops every load on the page, main frame first.
    pub fn stop_all_loaders(&mut self) {
        if let Some(loader) = self.frames.get_mut(&self.main_frame) {
            loader.stop_all_loaders();
        }
        self.run_tasks();
    }

    /// Removes `frame` and its subtree from the page.
    pub fn detach_frame(&mut self, frame: FrameId) {
        self.context.detach_frame(frame);
        self.run_tasks();
    }

    /// Fires every scheduled navigation whose timer expired. Returns how
    /// many fired.
    pub fn process_scheduled_navigations(&mut self, now: Instant) -> usize {
        let ids: Vec<FrameId> = self.frames.keys().copied().collect();
        let mut fired = 0;
        for id in ids {
            if let Some(loader) = self.frames.get_mut(&id)
                && loader.fire_scheduled_navigation(now)
            {
                fired += 1;
            }
            self.run_tasks();
        }
        fired
    }

    /// Drains the context's task queue, including tasks queued while it runs.
    pub fn run_tasks(&mut self) {
        while let Some(task) = self.context.take_task() {
            match task {
                FrameTask::CheckCompleted(id) => {
                    if let Some(loader) = self.frames.get_mut(&id) {
                        loader.check_completed();
                    }
                }
                FrameTask::StopAllLoaders(id) => {
                    if let Some(loader) = self.frames.get_mut(&id) {
                        loader.stop_all_loaders();
                    }
                }
                FrameTask::Detach(id) => self.remove_subtree(id),
                FrameTask::Navigate(id, request) => {
                    if let Some(loader) = self.frames.get_mut(&id) {
                        loader.load(*request, None, None, HistoryLoadType::DifferentDocument);
                    }
                }
            }
        }
    }

    fn remove_subtree(&mut self, root: FrameId) {
        let (mut subtree, parent) = {
            let tree = self.context.frame_tree();
            let mut subtree = vec![root];
            subtree.extend(tree.descendants(root));
            (subtree, tree.parent(root))
        };
        subtree.reverse();
        for id in &subtree {
            if let Some(mut loader) = self.frames.remove(id) {
                loader.detach();
            }
            self.context.frame_tree_mut().remove(*id);
        }
        debug!("removed {} frame(s) rooted at {root}", subtree.len());
        if let Some(parent) = parent
            && let Some(loader) = self.frames.get_mut(&parent)
        {
            loader.check_completed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Page;
    use crate::client::FrameClients;
    use crate::config::LoaderSettings;
    use crate::context::LoaderContext;
    use crate::frame_tree::FrameOwner;
    use crate::frame_tree::FrameOwnerKind;
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

    fn page() -> Page {
        let context = match LoaderContext::new(
            LoaderSettings::default(),
            Rc::new(NullBackend),
            Rc::new(ManualClock::new()),
        ) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        match Page::new(context, FrameClients::default()) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn child(page: &mut Page, parent: FrameId, name: &str) -> FrameId {
        match page.create_child_frame(
            parent,
            name,
            FrameOwner::new(FrameOwnerKind::Iframe),
            FrameClients::default(),
        ) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn detaching_a_frame_drops_its_whole_subtree() {
        let mut page = page();
        let main = page.main_frame();
        let outer = child(&mut page, main, "outer");
        let inner = child(&mut page, outer, "inner");
        let sibling = child(&mut page, main, "sibling");
        assert_eq!(page.frame_count(), 4);

        page.detach_frame(outer);
        assert!(!page.context().has_pending_tasks());

        assert_eq!(page.frame_count(), 2);
        assert!(page.frame(outer).is_none());
        assert!(page.frame(inner).is_none());
        assert!(page.frame(sibling).is_some());
        assert_eq!(page.context().frame_tree().children(main), vec![sibling]);
        assert_eq!(page.context().frame_tree().len(), 2);
    }

    #[test]
    fn children_cannot_be_added_to_unknown_frames() {
        let mut page = page();
        let result = page.create_child_frame(
            FrameId::new(999),
            "orphan",
            FrameOwner::new(FrameOwnerKind::Frame),
            FrameClients::default(),
        );
        match result {
            Ok(id) => panic!("created {id} under an unknown parent"),
            Err(error) => assert_eq!(error.code, "loader.frame_unknown"),
        }
    }

    #[test]
    fn history_navigation_without_entries_is_refused() {
        let mut page = page();
        assert!(page.main_frame_loader().is_some_and(|loader| loader.is_load_complete()));
        assert!(!page.go_back());
        assert!(!page.go_forward());
    }
}
