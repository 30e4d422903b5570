//! URL parsing and scheme classification used by the loader.

use pd_core::BrowserError;
use pd_core::BrowserResult;
use url::Url;

pub const ABOUT_BLANK: &str = "about:blank";

/// URL schemes the loading pipeline distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
    About,
    Data,
    Blob,
    File,
    Javascript,
    Other,
}

impl Scheme {
    pub fn of(url: &Url) -> Self {
        Self::from_name(url.scheme())
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "https" => Self::Https,
            "ws" => Self::Ws,
            "wss" => Self::Wss,
            "about" => Self::About,
            "data" => Self::Data,
            "blob" => Self::Blob,
            "file" => Self::File,
            "javascript" => Self::Javascript,
            _ => Self::Other,
        }
    }

    pub fn is_http_family(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https | Self::Wss)
    }
}

pub fn parse_url(input: &str) -> BrowserResult<Url> {
    Url::parse(input.trim()).map_err(|error| {
        BrowserError::new(
            "net.url.invalid",
            format!("failed to parse URL `{input}`: {error}"),
        )
    })
}

/// Resolves `input` against `base` the way attribute and header values are.
pub fn complete_url(base: &Url, input: &str) -> BrowserResult<Url> {
    base.join(input.trim()).map_err(|error| {
        BrowserError::new(
            "net.url.invalid",
            format!("failed to resolve `{input}` against `{base}`: {error}"),
        )
    })
}

pub fn about_blank() -> Url {
    match Url::parse(ABOUT_BLANK) {
        Ok(url) => url,
        Err(_) => unreachable!("about:blank always parses"),
    }
}

pub fn is_about_blank(url: &Url) -> bool {
    url.scheme() == "about" && url.path() == "blank"
}

pub fn is_javascript_url(input: &str) -> bool {
    input
        .trim_start()
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
}

pub fn has_fragment(url: &Url) -> bool {
    url.fragment().is_some()
}

pub fn strip_fragment(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped
}

pub fn equal_ignoring_fragment(left: &Url, right: &Url) -> bool {
    left[..url::Position::AfterQuery] == right[..url::Position::AfterQuery]
}

/// Rewrites `http:` to `https:`. A default port 80 becomes the default 443;
/// any other explicit port is kept.
pub fn upgrade_to_https(url: &Url) -> Option<Url> {
    if url.scheme() != "http" {
        return None;
    }

    let mut upgraded = url.clone();
    upgraded.set_scheme("https").ok()?;
    Some(upgraded)
}
