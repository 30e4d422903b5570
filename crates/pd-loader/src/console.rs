//! Diagnostics surfaced to the embedder's console.

use pd_core::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Security,
    Network,
    Rendering,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl MessageLevel {
    fn log_level(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub source: MessageSource,
    pub level: MessageLevel,
    pub text: String,
    pub request_identifier: Option<ResourceId>,
}

impl ConsoleMessage {
    pub fn new(source: MessageSource, level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            source,
            level,
            text: text.into(),
            request_identifier: None,
        }
    }

    pub fn security_error(text: impl Into<String>) -> Self {
        Self::new(MessageSource::Security, MessageLevel::Error, text)
    }

    pub fn with_request_identifier(mut self, identifier: ResourceId) -> Self {
        self.request_identifier = Some(identifier);
        self
    }

    /// Mirrors the message into the process log.
    pub fn log(&self) {
        log::log!(
            target: "pd_loader::console",
            self.level.log_level(),
            "[{:?}] {}",
            self.source,
            self.text
        );
    }
}
