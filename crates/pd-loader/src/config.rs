//! Loader configuration.

use encoding_rs::Encoding;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_security::SecuritySettings;
use pd_storage::MemoryCacheConfig;

pub const DEFAULT_USER_AGENT: &str = "PixelDust/0.1";

/// Per-page loader settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    pub images_enabled: bool,
    pub scripts_enabled: bool,
    pub plugins_enabled: bool,
    pub client_hints_enabled: bool,
    pub xss_auditor_enabled: bool,
    pub device_pixel_ratio: f32,
    pub viewport_width: Option<u32>,
    pub default_text_encoding: String,
    pub user_agent: String,
    pub security: SecuritySettings,
    pub memory_cache: MemoryCacheConfig,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            images_enabled: true,
            scripts_enabled: true,
            plugins_enabled: false,
            client_hints_enabled: true,
            xss_auditor_enabled: true,
            device_pixel_ratio: 1.0,
            viewport_width: None,
            default_text_encoding: "windows-1252".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            security: SecuritySettings::default(),
            memory_cache: MemoryCacheConfig::default(),
        }
    }
}

impl LoaderSettings {
    /// Defaults with `PIXELDUST_*` environment overrides applied.
    pub fn from_env() -> BrowserResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BrowserResult<Self> {
        let mut settings = Self::default();

        if let Some(value) = lookup("PIXELDUST_IMAGES_ENABLED") {
            settings.images_enabled = parse_flag("PIXELDUST_IMAGES_ENABLED", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_SCRIPTS_ENABLED") {
            settings.scripts_enabled = parse_flag("PIXELDUST_SCRIPTS_ENABLED", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_PLUGINS_ENABLED") {
            settings.plugins_enabled = parse_flag("PIXELDUST_PLUGINS_ENABLED", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_CLIENT_HINTS") {
            settings.client_hints_enabled = parse_flag("PIXELDUST_CLIENT_HINTS", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_STRICT_MIXED_CONTENT") {
            settings.security.strict_mixed_content_checking =
                parse_flag("PIXELDUST_STRICT_MIXED_CONTENT", &value)?;
        }
        if let Some(value) = lookup("PIXELDUST_DEVICE_PIXEL_RATIO") {
            settings.device_pixel_ratio = value.trim().parse::<f32>().map_err(|error| {
                BrowserError::new(
                    "config.invalid_env",
                    format!("PIXELDUST_DEVICE_PIXEL_RATIO=`{value}`: {error}"),
                )
            })?;
        }
        if let Some(value) = lookup("PIXELDUST_DEFAULT_ENCODING") {
            settings.default_text_encoding = value.trim().to_owned();
        }
        if let Some(value) = lookup("PIXELDUST_USER_AGENT") {
            settings.user_agent = value;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            return Err(BrowserError::new(
                "config.invalid_device_pixel_ratio",
                format!(
                    "device pixel ratio must be positive, got {}",
                    self.device_pixel_ratio
                ),
            ));
        }

        if self.default_encoding().is_none() {
            return Err(BrowserError::new(
                "config.invalid_encoding",
                format!(
                    "unknown default text encoding `{}`",
                    self.default_text_encoding
                ),
            ));
        }

        self.security.validate()
    }

    pub fn default_encoding(&self) -> Option<&'static Encoding> {
        Encoding::for_label(self.default_text_encoding.as_bytes())
    }
}

fn parse_flag(name: &str, value: &str) -> BrowserResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(BrowserError::new(
            "config.invalid_env",
            format!("{name}=`{value}` is not a boolean"),
        )),
    }
}
