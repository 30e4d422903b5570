//! Feeds main-resource bytes into the current document.
//!
//! The charset comes from the response, then a `<meta charset>` in the first
//! kilobyte, then the configured default.

use crate::document::Document;
use encoding_rs::Decoder;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use log::debug;

const CHARSET_SNIFF_LIMIT: usize = 1024;

pub struct DocumentWriter {
    response_encoding: Option<&'static Encoding>,
    default_encoding: Option<&'static Encoding>,
    decoder: Option<Decoder>,
    pending: Vec<u8>,
    sniff_html: bool,
    has_received_data: bool,
    ended: bool,
}

impl DocumentWriter {
    pub fn new(
        response_charset: Option<&str>,
        default_encoding: Option<&'static Encoding>,
        sniff_html: bool,
    ) -> Self {
        let response_encoding =
            response_charset.and_then(|label| Encoding::for_label(label.trim().as_bytes()));
        Self {
            response_encoding,
            default_encoding,
            decoder: None,
            pending: Vec::new(),
            sniff_html,
            has_received_data: false,
            ended: false,
        }
    }

    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.decoder.as_ref().map(Decoder::encoding)
    }

    pub fn has_received_data(&self) -> bool {
        self.has_received_data
    }

    pub fn add_data(&mut self, document: &mut Document, data: &[u8]) {
        if self.ended {
            return;
        }
        self.has_received_data = true;

        if self.decoder.is_none() {
            self.pending.extend_from_slice(data);
            let Some(encoding) = self.resolve_encoding(false) else {
                return;
            };
            self.start_decoding(document, encoding);
            let buffered = std::mem::take(&mut self.pending);
            self.decode(document, &buffered, false);
            return;
        }

        self.decode(document, data, false);
    }

    /// Flushes buffered bytes and finishes the decoder.
    pub fn end(&mut self, document: &mut Document) {
        if self.ended {
            return;
        }
        if self.decoder.is_none() {
            let encoding = self.resolve_encoding(true).unwrap_or(UTF_8);
            self.start_decoding(document, encoding);
            let buffered = std::mem::take(&mut self.pending);
            self.decode(document, &buffered, true);
        } else {
            self.decode(document, &[], true);
        }
        self.ended = true;
    }

    fn resolve_encoding(&self, at_end: bool) -> Option<&'static Encoding> {
        if let Some(encoding) = self.response_encoding {
            return Some(encoding);
        }
        if self.sniff_html {
            if let Some(encoding) = parse_charset_from_html_prefix(&self.pending)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
            {
                return Some(encoding);
            }
            if !at_end && self.pending.len() < CHARSET_SNIFF_LIMIT {
                return None;
            }
        }
        Some(self.default_encoding.unwrap_or(UTF_8))
    }

    fn start_decoding(&mut self, document: &mut Document, encoding: &'static Encoding) {
        debug!("decoding {} as {}", document.url, encoding.name());
        document.encoding = Some(encoding);
        self.decoder = Some(encoding.new_decoder());
    }

    fn decode(&mut self, document: &mut Document, data: &[u8], last: bool) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        let capacity = decoder
            .max_utf8_buffer_length(data.len())
            .unwrap_or(data.len().saturating_mul(3).saturating_add(4));
        document.text.reserve(capacity);
        let _ = decoder.decode_to_string(data, &mut document.text, last);
    }
}

fn parse_charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix_len = body.len().min(CHARSET_SNIFF_LIMIT);
    let prefix = String::from_utf8_lossy(&body[..prefix_len]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let charset_start = search_start + relative + "charset=".len();
        if let Some(label) = parse_charset_label(&prefix[charset_start..]) {
            return Some(label);
        }
        search_start = charset_start;
    }

    None
}

fn parse_charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        let end = rest.find(first)?;
        let label = rest[..end].trim();
        return (!label.is_empty()).then(|| label.to_owned());
    }

    let end = trimmed
        .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
        .unwrap_or(trimmed.len());
    let label = trimmed[..end].trim();
    (!label.is_empty()).then(|| label.to_owned())
}

#[cfg(test)]
mod tests {
    use super::DocumentWriter;
    use super::parse_charset_from_html_prefix;
    use crate::document::Document;
    use encoding_rs::SHIFT_JIS;
    use encoding_rs::WINDOWS_1252;
    use pd_security::SecurityOrigin;
    use url::Url;

    fn document() -> Document {
        let url = match Url::parse("https://a.example/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        Document::new(url, "text/html", SecurityOrigin::create_unique())
    }

    #[test]
    fn response_charset_wins() {
        let mut document = document();
        let mut writer = DocumentWriter::new(Some("windows-1252"), None, true);
        writer.add_data(&mut document, b"<meta charset=\"shift_jis\">caf\xe9");
        writer.end(&mut document);
        assert_eq!(document.encoding, Some(WINDOWS_1252));
        assert!(document.text.ends_with("café"));
    }

    #[test]
    fn meta_charset_is_sniffed_across_chunks() {
        let mut document = document();
        let mut writer = DocumentWriter::new(None, Some(WINDOWS_1252), true);
        writer.add_data(&mut document, b"<meta char");
        assert!(document.text.is_empty());
        writer.add_data(&mut document, b"set='Shift_JIS'>");
        writer.end(&mut document);
        assert_eq!(document.encoding, Some(SHIFT_JIS));
        assert_eq!(document.text, "<meta charset='Shift_JIS'>");
    }

    #[test]
    fn default_applies_without_hints() {
        let mut document = document();
        let mut writer = DocumentWriter::new(None, Some(WINDOWS_1252), true);
        writer.add_data(&mut document, b"caf\xe9");
        writer.end(&mut document);
        assert_eq!(document.encoding, Some(WINDOWS_1252));
        assert_eq!(document.text, "café");
    }

    #[test]
    fn bare_labels_stop_at_delimiters() {
        assert_eq!(
            parse_charset_from_html_prefix(b"<meta http-equiv=content-type content=\"text/html; charset=utf-8\">"),
            Some("utf-8".to_owned())
        );
        assert_eq!(parse_charset_from_html_prefix(b"charset=\"\""), None);
    }
}
