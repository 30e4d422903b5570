//! Shared primitives used across PixelDust crates.

pub mod clock;
pub mod ids;

use core::fmt;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use ids::FrameId;
pub use ids::IdentifierAllocator;
pub use ids::LoaderId;
pub use ids::ResourceId;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Top-level error type shared by every crate in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}

#[cfg(test)]
mod tests {
    use super::BrowserError;

    #[test]
    fn display_includes_code_and_message() {
        let error = BrowserError::new("loader.frame_detached", "frame 3 is gone");
        assert_eq!(error.to_string(), "loader.frame_detached: frame 3 is gone");
    }
}
