//! Process-wide configuration for the resource access layer.
//!
//! A [`ResourceConfig`] is built once at startup, either from a JSON document or with
//! [`ResourceConfigBuilder`], and shared read-only with every request afterwards.
//!
//! ```ignore
//! use resquery::config::ResourceConfig;
//!
//! let config = ResourceConfig::builder()
//!     .with_max_limit(500)
//!     .with_supported_locales(["de", "en"])
//!     .with_fallback_locale("de")
//!     .build();
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

/// Tunables of the query compiler and the sync machinery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    /// Page size used when the request carries no usable `limit`.
    pub default_limit: i64,
    /// Upper bound every requested `limit` is clamped to.
    pub max_limit: i64,
    /// Store-side name of the primary identifier, the target of the client-side `id`.
    pub primary_key: String,
    /// Timestamp field compared against `updatesSince` on sync requests.
    pub updated_field: String,
    /// Collection holding one journal entry per deleted document.
    pub journal_collection: String,
    /// Locale settings.
    pub i18n: LocaleConfig,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            primary_key: "_id".to_string(),
            updated_field: "updated".to_string(),
            journal_collection: "deletejournal".to_string(),
            i18n: LocaleConfig::default(),
        }
    }
}

impl ResourceConfig {
    /// Creates a new builder starting from the defaults.
    pub fn builder() -> ResourceConfigBuilder {
        ResourceConfigBuilder::new()
    }

    /// Parses a configuration from JSON. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Configuration`] if the document is malformed or
    /// describes an unusable configuration.
    pub fn from_json_str(json: &str) -> ResourceResult<Self> {
        let config: ResourceConfig = serde_json::from_str(json)
            .map_err(|e| ResourceError::Configuration(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> ResourceResult<()> {
        if self.default_limit <= 0 || self.max_limit <= 0 {
            return Err(ResourceError::Configuration(
                "default_limit and max_limit must be positive".to_string(),
            ));
        }
        if self.i18n.supported_locales.is_empty() {
            return Err(ResourceError::Configuration(
                "at least one supported locale is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Supported languages and the fallback used when a request asks for none of them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocaleConfig {
    pub supported_locales: Vec<String>,
    pub fallback_locale: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported_locales: ["en", "de", "fr", "it"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_locale: "en".to_string(),
        }
    }
}

/// Builder for constructing [`ResourceConfig`] instances.
pub struct ResourceConfigBuilder {
    config: ResourceConfig,
}

impl ResourceConfigBuilder {
    pub fn new() -> Self {
        Self { config: ResourceConfig::default() }
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub fn with_max_limit(mut self, limit: i64) -> Self {
        self.config.max_limit = limit;
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.config.primary_key = key.into();
        self
    }

    pub fn with_updated_field(mut self, field: impl Into<String>) -> Self {
        self.config.updated_field = field.into();
        self
    }

    pub fn with_journal_collection(mut self, collection: impl Into<String>) -> Self {
        self.config.journal_collection = collection.into();
        self
    }

    pub fn with_supported_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.i18n.supported_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.config.i18n.fallback_locale = locale.into();
        self
    }

    /// Builds and returns the final [`ResourceConfig`].
    pub fn build(self) -> ResourceConfig {
        self.config
    }
}

impl Default for ResourceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_defaults_for_missing_keys() {
        let config = ResourceConfig::from_json_str(r#"{"max_limit": 250, "i18n": {"fallback_locale": "de"}}"#)
            .unwrap();

        assert_eq!(config.max_limit, 250);
        assert_eq!(config.default_limit, DEFAULT_LIMIT);
        assert_eq!(config.i18n.fallback_locale, "de");
        assert_eq!(config.i18n.supported_locales.len(), 4);
        assert_eq!(config.journal_collection, "deletejournal");
    }

    #[test]
    fn json_rejects_unusable_limits() {
        let err = ResourceConfig::from_json_str(r#"{"max_limit": 0}"#).unwrap_err();
        assert!(matches!(err, ResourceError::Configuration(_)));

        let err = ResourceConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ResourceError::Configuration(_)));
    }

    #[test]
    fn builder_overrides() {
        let config = ResourceConfig::builder()
            .with_primary_key("uid")
            .with_supported_locales(["de"])
            .build();

        assert_eq!(config.primary_key, "uid");
        assert_eq!(config.i18n.supported_locales, vec!["de".to_string()]);
        assert_eq!(config.max_limit, MAX_LIMIT);
    }
}
