//! Frame hierarchy shared by every loader on a page.
//!
//! Frames are addressed by `FrameId`; a `FrameRef` additionally pins the
//! generation so a handle taken before a script callback can tell whether
//! the frame was detached (or its slot reused) while the callback ran.

use crate::frame_load_request::FrameLoadType;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::FrameId;
use pd_net::CachePolicy;
use pd_security::ContentSecurityPolicy;
use pd_security::SandboxFlags;
use pd_security::SecurityOrigin;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use url::Url;

/// Element that embeds a child frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOwnerKind {
    Iframe,
    Frame,
    Object,
    Embed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOwner {
    pub kind: FrameOwnerKind,
    pub sandbox_flags: SandboxFlags,
    load_events_dispatched: u32,
    fallback_rendered: bool,
}

impl FrameOwner {
    pub fn new(kind: FrameOwnerKind) -> Self {
        Self {
            kind,
            sandbox_flags: SandboxFlags::empty(),
            load_events_dispatched: 0,
            fallback_rendered: false,
        }
    }

    pub fn with_sandbox_flags(mut self, flags: SandboxFlags) -> Self {
        self.sandbox_flags = flags;
        self
    }

    pub fn dispatch_load(&mut self) {
        self.load_events_dispatched = self.load_events_dispatched.saturating_add(1);
    }

    pub fn load_events_dispatched(&self) -> u32 {
        self.load_events_dispatched
    }

    /// Only `<object>` owners have fallback content. Returns whether it was shown.
    pub fn render_fallback_content(&mut self) -> bool {
        if self.kind != FrameOwnerKind::Object {
            return false;
        }
        self.fallback_rendered = true;
        true
    }

    pub fn fallback_rendered(&self) -> bool {
        self.fallback_rendered
    }
}

/// What other frames may observe about a frame without borrowing its loader.
///
/// Each `FrameLoader` republishes its snapshot whenever one of these fields
/// changes, so ancestors and descendants read a consistent picture.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub url: Url,
    pub security_origin: SecurityOrigin,
    pub content_security_policy: ContentSecurityPolicy,
    pub sandbox_flags: SandboxFlags,
    pub upgrade_insecure_requests: bool,
    pub block_all_mixed_content: bool,
    pub insecure_navigations_to_upgrade: BTreeSet<String>,
    pub load_type: FrameLoadType,
    pub request_cache_policy: CachePolicy,
    pub is_loading: bool,
    pub load_event_finished: bool,
    pub committed_first_real_load: bool,
}

impl FrameSnapshot {
    pub fn new(url: Url, security_origin: SecurityOrigin) -> Self {
        Self {
            url,
            security_origin,
            content_security_policy: ContentSecurityPolicy::new(),
            sandbox_flags: SandboxFlags::empty(),
            upgrade_insecure_requests: false,
            block_all_mixed_content: false,
            insecure_navigations_to_upgrade: BTreeSet::new(),
            load_type: FrameLoadType::Standard,
            request_cache_policy: CachePolicy::UseProtocolCachePolicy,
            is_loading: false,
            load_event_finished: false,
            committed_first_real_load: false,
        }
    }
}

/// Stable handle to a frame at a particular generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef {
    pub id: FrameId,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct FrameNode {
    parent: Option<FrameId>,
    children: Vec<FrameId>,
    name: String,
    generation: u64,
    attached: bool,
    owner: Option<FrameOwner>,
    navigation_disable_count: u32,
    snapshot: Option<FrameSnapshot>,
}

#[derive(Debug, Default)]
pub struct FrameTree {
    nodes: BTreeMap<FrameId, FrameNode>,
    next_generation: u64,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_main_frame(&mut self, id: FrameId) -> BrowserResult<FrameRef> {
        self.insert(id, None, String::new(), None)
    }

    pub fn insert_child_frame(
        &mut self,
        parent: FrameId,
        id: FrameId,
        name: impl Into<String>,
        owner: FrameOwner,
    ) -> BrowserResult<FrameRef> {
        if !self.is_attached(parent) {
            return Err(BrowserError::new(
                "loader.frame_detached",
                format!("cannot attach a child to detached frame {parent}"),
            ));
        }
        let frame = self.insert(id, Some(parent), name.into(), Some(owner))?;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        Ok(frame)
    }

    fn insert(
        &mut self,
        id: FrameId,
        parent: Option<FrameId>,
        name: String,
        owner: Option<FrameOwner>,
    ) -> BrowserResult<FrameRef> {
        if self.nodes.contains_key(&id) {
            return Err(BrowserError::new(
                "loader.frame_exists",
                format!("frame {id} is already in the tree"),
            ));
        }
        self.next_generation = self.next_generation.saturating_add(1);
        let generation = self.next_generation;
        self.nodes.insert(
            id,
            FrameNode {
                parent,
                children: Vec::new(),
                name,
                generation,
                attached: true,
                owner,
                navigation_disable_count: 0,
                snapshot: None,
            },
        );
        Ok(FrameRef { id, generation })
    }

    pub fn is_live(&self, frame: FrameRef) -> bool {
        self.nodes
            .get(&frame.id)
            .is_some_and(|node| node.attached && node.generation == frame.generation)
    }

    pub fn is_attached(&self, id: FrameId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.attached)
    }

    pub fn frame_ref(&self, id: FrameId) -> Option<FrameRef> {
        let node = self.nodes.get(&id).filter(|node| node.attached)?;
        Some(FrameRef {
            id,
            generation: node.generation,
        })
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: FrameId) -> Vec<FrameId> {
        self.nodes
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn name(&self, id: FrameId) -> Option<&str> {
        self.nodes.get(&id).map(|node| node.name.as_str())
    }

    pub fn is_main_frame(&self, id: FrameId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.parent.is_none())
    }

    pub fn top(&self, id: FrameId) -> FrameId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Parent first, top-level frame last.
    pub fn ancestors(&self, id: FrameId) -> Vec<FrameId> {
        let mut ancestors = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            ancestors.push(parent);
            current = parent;
        }
        ancestors
    }

    /// Every frame below `id`, in pre-order.
    pub fn descendants(&self, id: FrameId) -> Vec<FrameId> {
        let mut found = Vec::new();
        let mut stack: Vec<FrameId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        found
    }

    pub fn is_descendant_of(&self, id: FrameId, ancestor: FrameId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn owner(&self, id: FrameId) -> Option<&FrameOwner> {
        self.nodes.get(&id).and_then(|node| node.owner.as_ref())
    }

    pub fn owner_mut(&mut self, id: FrameId) -> Option<&mut FrameOwner> {
        self.nodes.get_mut(&id).and_then(|node| node.owner.as_mut())
    }

    pub fn snapshot(&self, id: FrameId) -> Option<&FrameSnapshot> {
        self.nodes.get(&id).and_then(|node| node.snapshot.as_ref())
    }

    pub fn set_snapshot(&mut self, id: FrameId, snapshot: FrameSnapshot) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.snapshot = Some(snapshot);
        }
    }

    pub fn update_snapshot(&mut self, id: FrameId, update: impl FnOnce(&mut FrameSnapshot)) {
        if let Some(snapshot) = self.nodes.get_mut(&id).and_then(|node| node.snapshot.as_mut()) {
            update(snapshot);
        }
    }

    /// True when no frame below `id` is still loading.
    pub fn all_descendants_are_complete(&self, id: FrameId) -> bool {
        self.descendants(id).into_iter().all(|child| {
            self.snapshot(child)
                .is_none_or(|snapshot| !snapshot.is_loading)
        })
    }

    pub fn is_navigation_allowed(&self, id: FrameId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| node.navigation_disable_count == 0)
    }

    pub fn disable_navigation(&mut self, id: FrameId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.navigation_disable_count = node.navigation_disable_count.saturating_add(1);
        }
    }

    pub fn enable_navigation(&mut self, id: FrameId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.navigation_disable_count = node.navigation_disable_count.saturating_sub(1);
        }
    }

    /// Unlinks `id` and its subtree. Detached frames fail every `is_live`
    /// check from now on. Returns the detached frames, subtree root first.
    pub fn detach(&mut self, id: FrameId) -> Vec<FrameId> {
        if !self.is_attached(id) {
            return Vec::new();
        }
        let mut detached = vec![id];
        detached.extend(self.descendants(id));

        if let Some(parent) = self.parent(id)
            && let Some(node) = self.nodes.get_mut(&parent)
        {
            node.children.retain(|child| *child != id);
        }
        for frame in &detached {
            self.next_generation = self.next_generation.saturating_add(1);
            let generation = self.next_generation;
            if let Some(node) = self.nodes.get_mut(frame) {
                node.attached = false;
                node.generation = generation;
            }
        }
        detached
    }

    /// Drops detached nodes once their loaders are gone.
    pub fn remove(&mut self, id: FrameId) {
        if self.nodes.get(&id).is_some_and(|node| !node.attached) {
            self.nodes.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.values().filter(|node| node.attached).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::FrameOwner;
    use super::FrameOwnerKind;
    use super::FrameTree;
    use pd_core::FrameId;

    fn tree_with_children() -> FrameTree {
        let mut tree = FrameTree::new();
        assert!(tree.insert_main_frame(FrameId::new(1)).is_ok());
        for (parent, child) in [(1, 2), (2, 3), (1, 4)] {
            let inserted = tree.insert_child_frame(
                FrameId::new(parent),
                FrameId::new(child),
                "",
                FrameOwner::new(FrameOwnerKind::Iframe),
            );
            assert!(inserted.is_ok());
        }
        tree
    }

    #[test]
    fn walks_ancestors_and_descendants() {
        let tree = tree_with_children();
        assert_eq!(tree.ancestors(FrameId::new(3)), vec![FrameId::new(2), FrameId::new(1)]);
        assert_eq!(tree.top(FrameId::new(3)), FrameId::new(1));
        assert_eq!(
            tree.descendants(FrameId::new(1)),
            vec![FrameId::new(2), FrameId::new(3), FrameId::new(4)]
        );
        assert!(tree.is_descendant_of(FrameId::new(3), FrameId::new(1)));
    }

    #[test]
    fn detaching_invalidates_outstanding_handles() {
        let mut tree = tree_with_children();
        let child = match tree.frame_ref(FrameId::new(3)) {
            Some(value) => value,
            None => panic!("frame 3 should be attached"),
        };
        assert!(tree.is_live(child));

        let detached = tree.detach(FrameId::new(2));
        assert_eq!(detached, vec![FrameId::new(2), FrameId::new(3)]);
        assert!(!tree.is_live(child));
        assert_eq!(tree.children(FrameId::new(1)), vec![FrameId::new(4)]);
        assert!(tree.detach(FrameId::new(2)).is_empty());
    }

    #[test]
    fn refuses_children_of_detached_frames() {
        let mut tree = tree_with_children();
        tree.detach(FrameId::new(4));
        let result = tree.insert_child_frame(
            FrameId::new(4),
            FrameId::new(9),
            "",
            FrameOwner::new(FrameOwnerKind::Frame),
        );
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "loader.frame_detached");
        }
    }

    #[test]
    fn only_object_owners_render_fallback() {
        let mut object = FrameOwner::new(FrameOwnerKind::Object);
        assert!(object.render_fallback_content());
        assert!(object.fallback_rendered());

        let mut iframe = FrameOwner::new(FrameOwnerKind::Iframe);
        assert!(!iframe.render_fallback_content());
    }
}
