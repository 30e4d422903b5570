//! Which MIME types the engine can present without a plugin.

const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/pjpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    "image/x-icon",
    "image/vnd.microsoft.icon",
    "image/svg+xml",
];

const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp4",
    "audio/ogg",
    "audio/wav",
    "audio/webm",
    "video/mp4",
    "video/ogg",
    "video/webm",
];

const SUPPORTED_NON_IMAGE_TYPES: &[&str] = &[
    "text/html",
    "text/xml",
    "text/xsl",
    "text/plain",
    "application/xml",
    "application/xhtml+xml",
    "application/rss+xml",
    "application/atom+xml",
    "application/json",
    "multipart/related",
    "message/rfc822",
];

const UNSUPPORTED_TEXT_TYPES: &[&str] = &[
    "text/calendar",
    "text/x-calendar",
    "text/x-vcalendar",
    "text/vcalendar",
    "text/vcard",
    "text/x-vcard",
    "text/directory",
    "text/ldif",
    "text/qif",
    "text/x-qif",
    "text/x-csv",
    "text/x-vcf",
    "text/rtf",
];

pub fn is_supported_image_mime_type(mime_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&normalize(mime_type).as_str())
}

pub fn is_supported_media_mime_type(mime_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&normalize(mime_type).as_str())
}

pub fn is_supported_non_image_mime_type(mime_type: &str) -> bool {
    let mime_type = normalize(mime_type);
    if SUPPORTED_NON_IMAGE_TYPES.contains(&mime_type.as_str()) {
        return true;
    }

    mime_type.starts_with("text/") && !UNSUPPORTED_TEXT_TYPES.contains(&mime_type.as_str())
}

/// Types the engine renders itself (documents, images, media).
pub fn is_supported_mime_type(mime_type: &str) -> bool {
    is_supported_image_mime_type(mime_type)
        || is_supported_non_image_mime_type(mime_type)
        || is_supported_media_mime_type(mime_type)
}

/// Web archives are buffered in full and unpacked before commit.
pub fn is_archive_mime_type(mime_type: &str) -> bool {
    matches!(
        normalize(mime_type).as_str(),
        "multipart/related" | "message/rfc822"
    )
}

pub fn is_html_mime_type(mime_type: &str) -> bool {
    matches!(
        normalize(mime_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

fn normalize(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::is_archive_mime_type;
    use super::is_supported_mime_type;
    use super::is_supported_non_image_mime_type;

    #[test]
    fn text_types_are_supported_unless_listed() {
        assert!(is_supported_non_image_mime_type("text/x-custom"));
        assert!(!is_supported_non_image_mime_type("text/vcard"));
    }

    #[test]
    fn binary_types_need_a_plugin() {
        assert!(is_supported_mime_type("image/PNG"));
        assert!(is_supported_mime_type("video/webm"));
        assert!(!is_supported_mime_type("application/pdf"));
        assert!(!is_supported_mime_type("application/octet-stream"));
    }

    #[test]
    fn archives_are_recognized() {
        assert!(is_archive_mime_type("multipart/related"));
        assert!(!is_archive_mime_type("multipart/form-data"));
    }
}
