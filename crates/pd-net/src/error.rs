//! Load failures routed to the loader's single error sink.

use core::fmt;
use url::Url;

/// Broad classification of a failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    /// The load was aborted by the loader or the embedder.
    Cancelled,
    /// Transport-level failure reported by the network backend.
    Network,
    Timeout,
}

/// Failure of a resource load.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceError {
    pub kind: ResourceErrorKind,
    pub failing_url: Option<Url>,
    pub description: String,
}

impl ResourceError {
    pub fn cancelled(url: &Url) -> Self {
        Self {
            kind: ResourceErrorKind::Cancelled,
            failing_url: Some(url.clone()),
            description: "the load was cancelled".to_owned(),
        }
    }

    pub fn network(url: &Url, description: impl Into<String>) -> Self {
        Self {
            kind: ResourceErrorKind::Network,
            failing_url: Some(url.clone()),
            description: description.into(),
        }
    }

    pub fn timeout(url: &Url) -> Self {
        Self {
            kind: ResourceErrorKind::Timeout,
            failing_url: Some(url.clone()),
            description: "the load timed out".to_owned(),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == ResourceErrorKind::Cancelled
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failing_url {
            Some(url) => write!(f, "{:?} loading {url}: {}", self.kind, self.description),
            None => write!(f, "{:?}: {}", self.kind, self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceError;
    use crate::url::parse_url;

    #[test]
    fn cancellation_is_recognized() {
        let url = match parse_url("https://example.com/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(ResourceError::cancelled(&url).is_cancellation());
        assert!(!ResourceError::network(&url, "connection reset").is_cancellation());
    }

    #[test]
    fn display_names_the_failing_url() {
        let url = match parse_url("https://example.com/slow") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(
            ResourceError::timeout(&url).to_string(),
            "Timeout loading https://example.com/slow: the load timed out"
        );
    }
}
