//! Application configuration.

use serde::Deserialize;

use crate::error::SetupError;

/// Options an application is built with.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use weft_core::AppConfig;
///
/// let config = AppConfig::from_json(r#"{ "prefix": "ui" }"#).unwrap();
/// assert_eq!(config.prefix.as_deref(), Some("ui"));
/// assert!(config.dev_warnings);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prepended to every derived tag name: `ui` turns `Button` into
    /// `ui-button`.
    pub prefix: Option<String>,
    /// Emit development warnings such as a template selector falling back
    /// to markup.
    pub dev_warnings: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            dev_warnings: true,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());

        let config = AppConfig::from_json(r#"{"dev_warnings": false}"#).unwrap();
        assert!(!config.dev_warnings);
        assert_eq!(config.prefix, None);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json(r#"{"prefix": 3}"#).unwrap_err();
        assert!(matches!(err, SetupError::InvalidConfig(_)));
    }
}
