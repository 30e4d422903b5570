//! Client hints the server opted into through `Accept-CH`.

use crate::http::comma_separated_tokens;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientHintsPreferences {
    pub send_dpr: bool,
    pub send_resource_width: bool,
    pub send_viewport_width: bool,
}

impl ClientHintsPreferences {
    /// Merges the hints named by an `Accept-CH` header value.
    pub fn update_from_accept_client_hints_header(&mut self, value: &str) {
        for token in comma_separated_tokens(value) {
            if token.eq_ignore_ascii_case("dpr") {
                self.send_dpr = true;
            } else if token.eq_ignore_ascii_case("width") {
                self.send_resource_width = true;
            } else if token.eq_ignore_ascii_case("viewport-width") {
                self.send_viewport_width = true;
            }
        }
    }

    pub fn merged(self, other: Self) -> Self {
        Self {
            send_dpr: self.send_dpr || other.send_dpr,
            send_resource_width: self.send_resource_width || other.send_resource_width,
            send_viewport_width: self.send_viewport_width || other.send_viewport_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClientHintsPreferences;

    #[test]
    fn accept_ch_tokens_are_case_insensitive() {
        let mut preferences = ClientHintsPreferences::default();
        preferences.update_from_accept_client_hints_header("DPR, Viewport-Width, rtt");
        assert!(preferences.send_dpr);
        assert!(preferences.send_viewport_width);
        assert!(!preferences.send_resource_width);
    }
}
