//! Session history items and the page-wide back/forward list.

use pd_core::IdentifierAllocator;
use pd_net::ResourceRequest;
use pd_net::url::equal_ignoring_fragment;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryScrollRestorationType {
    #[default]
    Auto,
    Manual,
}

/// How a commit affects session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommitType {
    Standard,
    BackForward,
    InitialInChildFrame,
    HistoryInert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoadType {
    SameDocument,
    DifferentDocument,
}

/// Where a history update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryNavigationType {
    DifferentDocument,
    Fragment,
    HistoryApi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    url: Url,
    referrer: Option<Url>,
    target: String,
    state_object: Option<Vec<u8>>,
    scroll_restoration: HistoryScrollRestorationType,
    item_sequence_number: u64,
    document_sequence_number: u64,
    form_data: Option<Vec<u8>>,
    form_content_type: Option<String>,
}

impl HistoryItem {
    pub fn new(url: Url, identifiers: &IdentifierAllocator) -> Self {
        Self {
            url,
            referrer: None,
            target: String::new(),
            state_object: None,
            scroll_restoration: HistoryScrollRestorationType::Auto,
            item_sequence_number: identifiers.next_sequence_number(),
            document_sequence_number: identifiers.next_sequence_number(),
            form_data: None,
            form_content_type: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn referrer(&self) -> Option<&Url> {
        self.referrer.as_ref()
    }

    pub fn set_referrer(&mut self, referrer: Option<Url>) {
        self.referrer = referrer;
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    pub fn state_object(&self) -> Option<&[u8]> {
        self.state_object.as_deref()
    }

    pub fn set_state_object(&mut self, state: Option<Vec<u8>>) {
        self.state_object = state;
    }

    pub fn scroll_restoration(&self) -> HistoryScrollRestorationType {
        self.scroll_restoration
    }

    pub fn set_scroll_restoration(&mut self, value: HistoryScrollRestorationType) {
        self.scroll_restoration = value;
    }

    pub fn item_sequence_number(&self) -> u64 {
        self.item_sequence_number
    }

    pub fn set_item_sequence_number(&mut self, value: u64) {
        self.item_sequence_number = value;
    }

    pub fn document_sequence_number(&self) -> u64 {
        self.document_sequence_number
    }

    pub fn set_document_sequence_number(&mut self, value: u64) {
        self.document_sequence_number = value;
    }

    pub fn generate_new_item_sequence_number(&mut self, identifiers: &IdentifierAllocator) {
        self.item_sequence_number = identifiers.next_sequence_number();
    }

    pub fn generate_new_document_sequence_number(&mut self, identifiers: &IdentifierAllocator) {
        self.document_sequence_number = identifiers.next_sequence_number();
    }

    pub fn form_data(&self) -> Option<&[u8]> {
        self.form_data.as_deref()
    }

    pub fn form_content_type(&self) -> Option<&str> {
        self.form_content_type.as_deref()
    }

    /// Remembers a POST body so the entry can be resubmitted.
    pub fn set_form_info_from_request(&mut self, request: &ResourceRequest) {
        if request.method == pd_net::HttpMethod::Post {
            self.form_data = request.body.clone();
            self.form_content_type = request.header("Content-Type").map(str::to_owned);
        } else {
            self.form_data = None;
            self.form_content_type = None;
        }
    }

    /// Same document sequence number means the two entries share a document.
    pub fn should_do_same_document_navigation_to(&self, other: &HistoryItem) -> bool {
        self.document_sequence_number == other.document_sequence_number
            && equal_ignoring_fragment(&self.url, &other.url)
    }
}

/// Page-wide joint session history for the main frame.
#[derive(Debug, Clone, Default)]
pub struct BackForwardList {
    entries: Vec<HistoryItem>,
    current: Option<usize>,
}

impl BackForwardList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends after the current entry, dropping any forward entries.
    pub fn add_item(&mut self, item: HistoryItem) {
        let keep = self.current.map_or(0, |index| index + 1);
        self.entries.truncate(keep);
        self.entries.push(item);
        self.current = Some(self.entries.len() - 1);
    }

    /// Overwrites the current entry, or appends when the list is empty.
    pub fn replace_current_item(&mut self, item: HistoryItem) {
        match self.current.and_then(|index| self.entries.get_mut(index)) {
            Some(current) => *current = item,
            None => self.add_item(item),
        }
    }

    pub fn current_item(&self) -> Option<&HistoryItem> {
        self.current.and_then(|index| self.entries.get(index))
    }

    pub fn item_at_offset(&self, offset: i32) -> Option<&HistoryItem> {
        let index = self.offset_index(offset)?;
        self.entries.get(index)
    }

    /// Moves the cursor and returns the entry now current.
    pub fn go_to_offset(&mut self, offset: i32) -> Option<&HistoryItem> {
        let index = self.offset_index(offset)?;
        self.current = Some(index);
        self.entries.get(index)
    }

    pub fn back_count(&self) -> usize {
        self.current.unwrap_or(0)
    }

    pub fn forward_count(&self) -> usize {
        match self.current {
            Some(index) => self.entries.len() - index - 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn offset_index(&self, offset: i32) -> Option<usize> {
        let current = i64::try_from(self.current?).ok()?;
        let target = usize::try_from(current + i64::from(offset)).ok()?;
        (target < self.entries.len()).then_some(target)
    }
}
