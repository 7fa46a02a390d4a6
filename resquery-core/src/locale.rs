//! Resolution of the effective locale for a request.

use crate::config::LocaleConfig;

/// Maps a client locale hint (e.g. `fr-CH`) onto one of the supported locales.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    supported: Vec<String>,
    fallback: String,
}

impl LocaleResolver {
    pub fn new(config: &LocaleConfig) -> Self {
        Self {
            supported: config.supported_locales.clone(),
            fallback: config.fallback_locale.clone(),
        }
    }

    /// Returns the supported locales in configuration order.
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// Picks the locale to use for a request.
    ///
    /// An exact match wins, then the two letter language prefix; anything else,
    /// including a missing or too short hint, yields the fallback locale.
    pub fn resolve(&self, hint: Option<&str>) -> String {
        let hint = match hint {
            Some(hint) if hint.chars().count() >= 2 => hint,
            _ => return self.fallback.clone(),
        };

        if self.is_supported(hint) {
            return hint.to_string();
        }

        let short: String = hint.chars().take(2).collect();
        if self.is_supported(&short) {
            return short;
        }

        self.fallback.clone()
    }

    fn is_supported(&self, locale: &str) -> bool {
        self.supported.iter().any(|l| l == locale)
    }
}

impl Default for LocaleResolver {
    fn default() -> Self {
        Self::new(&LocaleConfig::default())
    }
}
