//! Stable identifiers for frames, loaders and resources.

use core::fmt;
use std::cell::Cell;

/// Identifies a frame for its whole lifetime, including after detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

/// Identifies one `DocumentLoader` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoaderId(u64);

/// Identifies a single fetch, main resource or subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl FrameId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl LoaderId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl ResourceId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// Hands out monotonically increasing identifiers.
///
/// One allocator is owned by the loading context so identifiers are unique
/// within a page without relying on process-wide statics. Sequence numbers
/// for history items come from a separate counter so they stay dense.
#[derive(Debug)]
pub struct IdentifierAllocator {
    next_identifier: Cell<u64>,
    next_sequence_number: Cell<u64>,
}

impl Default for IdentifierAllocator {
    fn default() -> Self {
        Self {
            next_identifier: Cell::new(1),
            next_sequence_number: Cell::new(1),
        }
    }
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_frame(&self) -> FrameId {
        FrameId(self.bump())
    }

    pub fn next_loader(&self) -> LoaderId {
        LoaderId(self.bump())
    }

    pub fn next_resource(&self) -> ResourceId {
        ResourceId(self.bump())
    }

    pub fn next_sequence_number(&self) -> u64 {
        let value = self.next_sequence_number.get();
        self.next_sequence_number.set(value.saturating_add(1));
        value
    }

    fn bump(&self) -> u64 {
        let value = self.next_identifier.get();
        self.next_identifier.set(value.saturating_add(1));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::IdentifierAllocator;

    #[test]
    fn identifiers_are_unique_across_kinds() {
        let allocator = IdentifierAllocator::new();
        let frame = allocator.next_frame();
        let loader = allocator.next_loader();
        let resource = allocator.next_resource();

        assert!(frame.get() < loader.get());
        assert!(loader.get() < resource.get());
    }

    #[test]
    fn sequence_numbers_do_not_consume_identifiers() {
        let allocator = IdentifierAllocator::new();
        assert_eq!(allocator.next_sequence_number(), 1);
        assert_eq!(allocator.next_sequence_number(), 2);
        assert_eq!(allocator.next_resource().get(), 1);
    }
}
