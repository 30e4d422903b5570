//! Security policy primitives: origins, CSP, sandboxing and framing rules.

pub mod csp;
pub mod frame_options;
pub mod mixed_content;
pub mod origin;
pub mod sandbox;
pub mod scheme_registry;

use pd_core::BrowserResult;

pub use csp::ContentSecurityPolicy;
pub use csp::Directive;
pub use csp::PolicyDisposition;
pub use csp::RedirectStatus;
pub use csp::ReportingStatus;
pub use frame_options::XFrameOptionsDisposition;
pub use frame_options::parse_x_frame_options_header;
pub use mixed_content::MixedContentContextType;
pub use mixed_content::is_mixed_content;
pub use origin::SecurityOrigin;
pub use sandbox::SandboxFlags;
pub use scheme_registry::SchemeRegistry;

/// Central security policy for document loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySettings {
    pub enforce_frame_options: bool,
    pub strict_mixed_content_checking: bool,
    pub strictly_block_blockable_mixed_content: bool,
    pub allow_running_of_insecure_content: bool,
    pub allow_display_of_insecure_content: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            enforce_frame_options: true,
            strict_mixed_content_checking: false,
            strictly_block_blockable_mixed_content: true,
            allow_running_of_insecure_content: false,
            allow_display_of_insecure_content: true,
        }
    }
}

impl SecuritySettings {
    pub fn validate(&self) -> BrowserResult<()> {
        if !self.enforce_frame_options {
            return Err(pd_core::BrowserError::new(
                "security.invalid_policy",
                "frame embedding checks must stay enabled",
            ));
        }

        if self.strict_mixed_content_checking && self.allow_running_of_insecure_content {
            return Err(pd_core::BrowserError::new(
                "security.invalid_policy",
                "strict mixed content checking cannot allow running insecure content",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SecuritySettings;

    #[test]
    fn defaults_validate() {
        assert!(SecuritySettings::default().validate().is_ok());
    }

    #[test]
    fn contradictory_mixed_content_settings_are_rejected() {
        let settings = SecuritySettings {
            strict_mixed_content_checking: true,
            allow_running_of_insecure_content: true,
            ..SecuritySettings::default()
        };
        let result = settings.validate();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "security.invalid_policy");
        }
    }
}
