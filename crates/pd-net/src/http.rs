//! HTTP value types and header parsing shared by the fetch layer.

use pd_core::BrowserError;
use pd_core::BrowserResult;

/// Request methods the loader issues or compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

/// Single HTTP header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> BrowserResult<Self> {
        if !is_valid_header_name(name) {
            return Err(BrowserError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(BrowserError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces every existing value of `name`.
    pub fn set(&mut self, name: &str, value: &str) -> BrowserResult<()> {
        let header = Header::new(name, value)?;
        self.entries
            .retain(|existing| !existing.name.eq_ignore_ascii_case(name));
        self.entries.push(header);
        Ok(())
    }

    /// Appends to an existing value with `, ` or inserts a fresh header.
    pub fn add(&mut self, name: &str, value: &str) -> BrowserResult<()> {
        let header = Header::new(name, value)?;
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => {
                existing.value.push_str(", ");
                existing.value.push_str(&header.value);
            }
            None => self.entries.push(header),
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub const OK: Self = Self(200);
    pub const NO_CONTENT: Self = Self(204);
    pub const RESET_CONTENT: Self = Self(205);

    pub fn new(code: u16) -> BrowserResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(BrowserError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// 204 and 205 responses never replace the current document.
    pub fn is_no_content(self) -> bool {
        matches!(self.0, 204 | 205)
    }
}

/// How a response asks to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDispositionType {
    None,
    Inline,
    Attachment,
}

/// Classifies a `Content-Disposition` header value.
///
/// Unknown disposition tokens count as attachments; values that do not start
/// with a token (`filename="x"` without a type) are ignored.
pub fn content_disposition_type(value: &str) -> ContentDispositionType {
    let disposition = value.split(';').next().unwrap_or_default().trim();
    if disposition.is_empty() {
        return ContentDispositionType::None;
    }

    if disposition.eq_ignore_ascii_case("inline") {
        return ContentDispositionType::Inline;
    }

    if !disposition.bytes().all(is_token_char) {
        return ContentDispositionType::None;
    }

    ContentDispositionType::Attachment
}

/// Parsed `Refresh` header or `<meta http-equiv=refresh>` value.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshDirective {
    pub delay_seconds: f64,
    pub url: Option<String>,
}

/// Parses `5`, `5; url=/next`, `0;URL='x'` and similar refresh values.
pub fn parse_refresh(value: &str) -> Option<RefreshDirective> {
    let trimmed = value.trim();
    let number_end = trimmed
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(trimmed.len());
    if number_end == 0 {
        return None;
    }

    let delay_seconds = trimmed[..number_end].parse::<f64>().ok()?;
    let rest = trimmed[number_end..].trim_start();
    if rest.is_empty() {
        return Some(RefreshDirective {
            delay_seconds,
            url: None,
        });
    }

    let rest = rest.strip_prefix([';', ',']).unwrap_or(rest).trim_start();
    let rest = match rest.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url") => {
            let after = rest[3..].trim_start();
            match after.strip_prefix('=') {
                Some(value) => value.trim_start(),
                None => rest,
            }
        }
        _ => rest,
    };

    let url = strip_matching_quotes(rest.trim());
    Some(RefreshDirective {
        delay_seconds,
        url: if url.is_empty() {
            None
        } else {
            Some(url.to_owned())
        },
    })
}

/// Splits a comma-separated header into trimmed, non-empty tokens.
pub fn comma_separated_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|token| !token.is_empty())
}

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote) {
            return inner.split(quote).next().unwrap_or(inner);
        }
    }
    value
}

fn is_valid_header_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    name.bytes().all(is_token_char)
}

pub(crate) fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
