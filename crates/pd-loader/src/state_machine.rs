//! Tracks whether a frame still shows its initial empty document.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrameLoaderState {
    CreatingInitialEmptyDocument,
    DisplayingInitialEmptyDocument,
    CommittedFirstRealLoad,
    CommittedMultipleRealLoads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoaderStateMachine {
    state: FrameLoaderState,
}

impl Default for FrameLoaderStateMachine {
    fn default() -> Self {
        Self {
            state: FrameLoaderState::CreatingInitialEmptyDocument,
        }
    }
}

impl FrameLoaderStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameLoaderState {
        self.state
    }

    pub fn creating_initial_empty_document(&self) -> bool {
        self.state == FrameLoaderState::CreatingInitialEmptyDocument
    }

    pub fn is_displaying_initial_empty_document(&self) -> bool {
        self.state >= FrameLoaderState::DisplayingInitialEmptyDocument
            && self.state < FrameLoaderState::CommittedFirstRealLoad
    }

    pub fn committed_first_real_document_load(&self) -> bool {
        self.state >= FrameLoaderState::CommittedFirstRealLoad
    }

    pub fn committed_multiple_real_loads(&self) -> bool {
        self.state == FrameLoaderState::CommittedMultipleRealLoads
    }

    /// States only move forward; going backwards is ignored.
    pub fn advance_to(&mut self, state: FrameLoaderState) {
        debug_assert!(state > self.state, "{:?} -> {state:?}", self.state);
        if state > self.state {
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameLoaderState;
    use super::FrameLoaderStateMachine;

    #[test]
    fn advances_monotonically() {
        let mut machine = FrameLoaderStateMachine::new();
        assert!(machine.creating_initial_empty_document());
        assert!(!machine.is_displaying_initial_empty_document());

        machine.advance_to(FrameLoaderState::DisplayingInitialEmptyDocument);
        assert!(machine.is_displaying_initial_empty_document());
        assert!(!machine.committed_first_real_document_load());

        machine.advance_to(FrameLoaderState::CommittedFirstRealLoad);
        assert!(machine.committed_first_real_document_load());
        assert!(!machine.is_displaying_initial_empty_document());
        assert!(!machine.committed_multiple_real_loads());

        machine.advance_to(FrameLoaderState::CommittedMultipleRealLoads);
        assert!(machine.committed_multiple_real_loads());
    }
}
