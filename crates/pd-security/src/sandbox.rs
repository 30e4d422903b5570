//! Sandbox flags applied to documents from `<iframe sandbox>` and CSP.

use bitflags::bitflags;

bitflags! {
    /// Restrictions a sandboxed document operates under. A set bit means the
    /// capability is withheld.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SandboxFlags: u32 {
        const NAVIGATION = 1 << 0;
        const PLUGINS = 1 << 1;
        const ORIGIN = 1 << 2;
        const FORMS = 1 << 3;
        const SCRIPTS = 1 << 4;
        const TOP_NAVIGATION = 1 << 5;
        const POPUPS = 1 << 6;
        const AUTOMATIC_FEATURES = 1 << 7;
        const POINTER_LOCK = 1 << 8;
        const DOCUMENT_DOMAIN = 1 << 9;
        const ORIENTATION_LOCK = 1 << 10;
        const PROPAGATES_TO_AUXILIARY_BROWSING_CONTEXTS = 1 << 11;
        const MODALS = 1 << 12;
        const PRESENTATION = 1 << 13;
    }
}

/// Result of parsing a sandbox attribute or directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    pub flags: SandboxFlags,
    pub invalid_tokens: Vec<String>,
}

/// Starts from "everything sandboxed" and lifts restrictions per `allow-*` token.
pub fn parse_sandbox_policy(tokens: &str) -> SandboxPolicy {
    let mut flags = SandboxFlags::all();
    let mut invalid_tokens = Vec::new();

    for token in tokens.split_ascii_whitespace() {
        let lifted = match token.to_ascii_lowercase().as_str() {
            "allow-same-origin" => SandboxFlags::ORIGIN,
            "allow-forms" => SandboxFlags::FORMS,
            "allow-scripts" => SandboxFlags::SCRIPTS | SandboxFlags::AUTOMATIC_FEATURES,
            "allow-top-navigation" => SandboxFlags::TOP_NAVIGATION,
            "allow-popups" => SandboxFlags::POPUPS,
            "allow-pointer-lock" => SandboxFlags::POINTER_LOCK,
            "allow-orientation-lock" => SandboxFlags::ORIENTATION_LOCK,
            "allow-popups-to-escape-sandbox" => {
                SandboxFlags::PROPAGATES_TO_AUXILIARY_BROWSING_CONTEXTS
            }
            "allow-modals" => SandboxFlags::MODALS,
            "allow-presentation" => SandboxFlags::PRESENTATION,
            _ => {
                invalid_tokens.push(token.to_owned());
                continue;
            }
        };
        flags.remove(lifted);
    }

    SandboxPolicy {
        flags,
        invalid_tokens,
    }
}
