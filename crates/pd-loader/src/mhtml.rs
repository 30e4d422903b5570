//! `multipart/related` web archives.
//!
//! Archives are buffered in full and parsed once the main resource finishes.
//! Parts are keyed by `Content-Location`; the first part whose type matches
//! the archive's `type` parameter (or simply the first part) is the main
//! resource.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use mime::Mime;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_net::HeaderMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResource {
    pub url: Url,
    pub mime_type: String,
    pub text_encoding: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MhtmlArchive {
    main_resource: ArchiveResource,
    subresources: Vec<ArchiveResource>,
}

impl MhtmlArchive {
    /// Parses a complete archive. `archive_url` resolves relative
    /// `Content-Location` values.
    pub fn parse(archive_url: &Url, data: &[u8]) -> BrowserResult<Self> {
        let (header_text, body) = split_headers(data)
            .ok_or_else(|| invalid("archive has no header block"))?;
        let headers = parse_headers(&header_text)?;
        let content_type: Mime = headers
            .get("Content-Type")
            .ok_or_else(|| invalid("archive has no Content-Type"))?
            .parse()
            .map_err(|error| invalid(format!("bad archive Content-Type: {error}")))?;
        if content_type.essence_str() != "multipart/related" {
            return Err(invalid(format!(
                "unsupported archive type `{}`",
                content_type.essence_str()
            )));
        }
        let boundary = content_type
            .get_param("boundary")
            .map(|value| value.as_str().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| invalid("archive has no boundary"))?;
        let main_type = content_type
            .get_param("type")
            .map(|value| value.as_str().to_ascii_lowercase());

        let mut resources = Vec::new();
        for part in split_parts(body, &boundary) {
            match parse_part(archive_url, part) {
                Ok(resource) => resources.push(resource),
                Err(error) => debug!("skipping archive part: {error}"),
            }
        }

        let main_index = main_type
            .as_deref()
            .and_then(|wanted| {
                resources
                    .iter()
                    .position(|resource| resource.mime_type == wanted)
            })
            .unwrap_or(0);
        if resources.is_empty() {
            return Err(invalid("archive has no usable parts"));
        }
        let main_resource = resources.remove(main_index);
        debug!(
            "parsed archive {} with main resource {} and {} subresources",
            archive_url,
            main_resource.url,
            resources.len()
        );

        Ok(Self {
            main_resource,
            subresources: resources,
        })
    }

    pub fn main_resource(&self) -> &ArchiveResource {
        &self.main_resource
    }

    pub fn subresources(&self) -> &[ArchiveResource] {
        &self.subresources
    }

    pub fn subresource_for_url(&self, url: &Url) -> Option<&ArchiveResource> {
        std::iter::once(&self.main_resource)
            .chain(self.subresources.iter())
            .find(|resource| resource.url == *url)
    }
}

fn invalid(message: impl Into<String>) -> BrowserError {
    BrowserError::new("loader.mhtml.invalid", message)
}

fn parse_part(archive_url: &Url, part: &[u8]) -> BrowserResult<ArchiveResource> {
    let (header_text, body) = split_headers(part).ok_or_else(|| invalid("part has no headers"))?;
    let headers = parse_headers(&header_text)?;

    let location = headers
        .get("Content-Location")
        .ok_or_else(|| invalid("part has no Content-Location"))?;
    let url = archive_url
        .join(location.trim())
        .map_err(|error| invalid(format!("bad Content-Location `{location}`: {error}")))?;

    let (mime_type, text_encoding) = match headers
        .get("Content-Type")
        .map(str::parse::<Mime>)
    {
        Some(Ok(parsed)) => (
            parsed.essence_str().to_owned(),
            parsed.get_param(mime::CHARSET).map(|value| value.as_str().to_owned()),
        ),
        Some(Err(error)) => return Err(invalid(format!("bad part Content-Type: {error}"))),
        None => ("text/plain".to_owned(), None),
    };

    let encoding = headers
        .get("Content-Transfer-Encoding")
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "binary".to_owned());
    let data = match encoding.as_str() {
        "base64" => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|byte| !byte.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(compact)
                .map_err(|error| invalid(format!("bad base64 part {url}: {error}")))?
        }
        "quoted-printable" => decode_quoted_printable(body),
        "binary" | "7bit" | "8bit" => body.to_vec(),
        other => return Err(invalid(format!("unsupported transfer encoding `{other}`"))),
    };

    Ok(ArchiveResource {
        url,
        mime_type,
        text_encoding,
        data,
    })
}

/// Splits at the first blank line, accepting CRLF or bare LF line endings.
fn split_headers(data: &[u8]) -> Option<(String, &[u8])> {
    let crlf = find(data, b"\r\n\r\n").map(|index| (index, 4));
    let lf = find(data, b"\n\n").map(|index| (index, 2));
    let (index, separator_len) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let header_text = String::from_utf8_lossy(&data[..index]).into_owned();
    Some((header_text, &data[index + separator_len..]))
}

fn parse_headers(text: &str) -> BrowserResult<HeaderMap> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with([' ', '\t']) {
            if let Some(previous) = unfolded.last_mut() {
                previous.push(' ');
                previous.push_str(line.trim());
            }
            continue;
        }
        if !line.is_empty() {
            unfolded.push(line.to_owned());
        }
    }

    let mut headers = HeaderMap::new();
    for line in unfolded {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        headers.add(name.trim(), value.trim())?;
    }
    Ok(headers)
}

/// Yields the bodies between `--boundary` delimiters, stopping at the close
/// delimiter.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();

    let Some(first) = find(body, delimiter) else {
        return parts;
    };
    let mut cursor = first + delimiter.len();
    loop {
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let start = skip_line_break(body, cursor);
        let Some(next) = find(&body[start..], delimiter).map(|offset| start + offset) else {
            break;
        };
        let end = trim_trailing_line_break(body, start, next);
        parts.push(&body[start..end]);
        cursor = next + delimiter.len();
    }
    parts
}

fn skip_line_break(data: &[u8], mut index: usize) -> usize {
    while index < data.len() && matches!(data[index], b' ' | b'\t') {
        index += 1;
    }
    if data[index..].starts_with(b"\r\n") {
        index + 2
    } else if data[index..].starts_with(b"\n") {
        index + 1
    } else {
        index
    }
}

fn trim_trailing_line_break(data: &[u8], start: usize, end: usize) -> usize {
    let slice = &data[start..end];
    if slice.ends_with(b"\r\n") {
        end - 2
    } else if slice.ends_with(b"\n") {
        end - 1
    } else {
        end
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut index = 0;
    while index < input.len() {
        let byte = input[index];
        if byte != b'=' {
            output.push(byte);
            index += 1;
            continue;
        }
        let rest = &input[index + 1..];
        if rest.starts_with(b"\r\n") {
            index += 3;
        } else if rest.starts_with(b"\n") {
            index += 2;
        } else if let [high, low, ..] = rest
            && let (Some(high), Some(low)) = (hex_value(*high), hex_value(*low))
        {
            output.push((high << 4) | low);
            index += 3;
        } else {
            output.push(byte);
            index += 1;
        }
    }
    output
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::MhtmlArchive;
    use super::decode_quoted_printable;
    use url::Url;

    const ARCHIVE: &str = "From: <Saved by PixelDust>\r\n\
Subject: Example\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/related;\r\n\
\ttype=\"text/html\";\r\n\
\tboundary=\"----=_NextPart_000\"\r\n\
\r\n\
------=_NextPart_000\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
Content-Location: https://a.example/index.html\r\n\
\r\n\
<p class=3D\"x\">hi</p>=\r\n\
<img src=3D\"logo.png\">\r\n\
------=_NextPart_000\r\n\
Content-Type: image/png\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Location: logo.png\r\n\
\r\n\
iVBORw0K\r\n\
------=_NextPart_000--\r\n";

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn parses_main_resource_and_subresources() {
        let archive = match MhtmlArchive::parse(&url("file:///saved.mht"), ARCHIVE.as_bytes()) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let main = archive.main_resource();
        assert_eq!(main.url.as_str(), "https://a.example/index.html");
        assert_eq!(main.mime_type, "text/html");
        assert_eq!(main.text_encoding.as_deref(), Some("utf-8"));
        assert_eq!(
            String::from_utf8_lossy(&main.data),
            "<p class=\"x\">hi</p><img src=\"logo.png\">"
        );

        assert_eq!(archive.subresources().len(), 1);
        let logo = match archive.subresource_for_url(&url("file:///logo.png")) {
            Some(value) => value,
            None => panic!("logo missing"),
        };
        assert_eq!(logo.data, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]);
    }

    #[test]
    fn non_archives_are_rejected() {
        let result = MhtmlArchive::parse(
            &url("file:///saved.mht"),
            b"Content-Type: text/html\r\n\r\n<p>hi</p>",
        );
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "loader.mhtml.invalid");
        }

        let result = MhtmlArchive::parse(&url("file:///saved.mht"), b"garbage");
        assert!(result.is_err());
    }

    #[test]
    fn quoted_printable_keeps_stray_equals() {
        assert_eq!(decode_quoted_printable(b"a=3Db=\nc=zz"), b"a=bc=zz".to_vec());
    }
}
