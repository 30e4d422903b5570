//! `X-Frame-Options` header parsing.

/// Interpreted `X-Frame-Options` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XFrameOptionsDisposition {
    Invalid,
    Deny,
    SameOrigin,
    AllowAll,
    /// Several different valid values were sent; treated as `DENY`.
    Conflict,
}

/// Parses a (possibly comma-joined) `X-Frame-Options` value.
pub fn parse_x_frame_options_header(value: &str) -> XFrameOptionsDisposition {
    let mut result = XFrameOptionsDisposition::Invalid;
    let mut first = true;

    for token in value.split(',').map(str::trim) {
        let current = if token.eq_ignore_ascii_case("deny") {
            XFrameOptionsDisposition::Deny
        } else if token.eq_ignore_ascii_case("sameorigin") {
            XFrameOptionsDisposition::SameOrigin
        } else if token.eq_ignore_ascii_case("allowall") {
            XFrameOptionsDisposition::AllowAll
        } else {
            XFrameOptionsDisposition::Invalid
        };

        if first {
            result = current;
            first = false;
        } else if result != current {
            return XFrameOptionsDisposition::Conflict;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::XFrameOptionsDisposition;
    use super::parse_x_frame_options_header;

    #[test]
    fn single_values_parse_case_insensitively() {
        assert_eq!(
            parse_x_frame_options_header("DENY"),
            XFrameOptionsDisposition::Deny
        );
        assert_eq!(
            parse_x_frame_options_header(" SameOrigin "),
            XFrameOptionsDisposition::SameOrigin
        );
        assert_eq!(
            parse_x_frame_options_header("allow-from https://a.example"),
            XFrameOptionsDisposition::Invalid
        );
    }

    #[test]
    fn repeated_values_must_agree() {
        assert_eq!(
            parse_x_frame_options_header("deny, DENY"),
            XFrameOptionsDisposition::Deny
        );
        assert_eq!(
            parse_x_frame_options_header("deny, sameorigin"),
            XFrameOptionsDisposition::Conflict
        );
    }
}
