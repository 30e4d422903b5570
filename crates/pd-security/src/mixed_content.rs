//! Mixed-content classification primitives.

use crate::origin::SecurityOrigin;
use crate::origin::is_secure_url;
use crate::scheme_registry::SchemeRegistry;
use url::Url;

/// How a mixed fetch is treated, by what it would be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixedContentContextType {
    /// Active content (scripts, frames, XHR): blocked unless the embedder allows it.
    Blockable,
    /// Passive content (images, media): displayed with a warning.
    OptionallyBlockable,
    /// Plugin and internal fetches that should be blockable but are not yet.
    ShouldBeBlockable,
    NotMixedContent,
}

/// True when an `https` origin would fetch an insecure `url`.
pub fn is_mixed_content(origin: &SecurityOrigin, url: &Url, registry: &SchemeRegistry) -> bool {
    if origin.protocol() != "https" {
        return false;
    }
    !is_secure_url(url, registry)
}
