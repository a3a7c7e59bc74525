//! Runtime configuration.

/// Global switches for the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    /// Suppress misuse warnings.
    pub silent: bool,
    /// Measure instance creation and mounting and log the durations.
    pub performance: bool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_performance(mut self, performance: bool) -> Self {
        self.performance = performance;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert!(!config.silent);
        assert!(!config.performance);
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new().with_silent(true).with_performance(true);
        assert!(config.silent);
        assert!(config.performance);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_partial() {
        let config = RuntimeConfig::from_json(r#"{ "performance": true }"#).unwrap();
        assert!(config.performance);
        assert!(!config.silent);
    }
}
